//! Typed operations against included-entity rows.
//!
//! Callers describe co-mutations as [`EntityOperation`]s attached to
//! events. When several operations in one write target the same row,
//! the change tracker folds each adjacent pair into a single legal
//! operation, or rejects the sequence; the fold table lives in
//! `OperationKind::merge`.

use std::sync::Arc;

use parse_display::Display;

use crate::{
    engine::{BatchAction, ETAG_ANY},
    error::{Result, StreamError},
    properties::PropertyMap,
};

/// A row targeted by an included operation.
///
/// The library keys change tracking on the entity *handle*: reuse the
/// same `Arc` when issuing several operations against one row within a
/// write, so each follows the e-tag the previous one produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub row_key: String,
    pub etag: String,
    pub properties: PropertyMap,
}

impl Entity {
    pub fn new(row_key: impl Into<String>) -> Self {
        Self {
            row_key: row_key.into(),
            etag: String::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn etag(mut self, value: impl Into<String>) -> Self {
        self.etag = value.into();

        self
    }

    pub fn properties(mut self, value: PropertyMap) -> Self {
        self.properties = value;

        self
    }
}

/// The kind of an [`EntityOperation`].
///
/// `UpdateMerge` is produced internally for header updates; `Null`
/// marks a cancelled insert/delete pair and is never submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperationKind {
    Insert,
    Replace,
    Delete,
    InsertOrMerge,
    InsertOrReplace,
    UpdateMerge,
    Null,
}

impl OperationKind {
    /// Folds `self` followed by `other` into the single kind with the
    /// same effect, or rejects the sequence.
    fn merge(self, other: OperationKind, row_key: &str) -> Result<OperationKind> {
        use OperationKind::*;

        let followed = |first: OperationKind, second: OperationKind| {
            Err(StreamError::InvalidOperation(format!(
                "operation {first} cannot be followed by {second} for row `{row_key}`"
            )))
        };

        match (self, other) {
            (Insert, Replace) => Ok(Insert),
            (Insert, Delete) => Ok(Null),
            (Replace, Replace) => Ok(Replace),
            (Replace, Delete) => Ok(Delete),
            // the row is known to exist, so the insert lands as a replace
            (Delete, Insert) => Ok(Replace),
            (Null, Insert) => Ok(Insert),
            (Null, Replace) | (Null, Delete) => Err(StreamError::InvalidOperation(format!(
                "operation {other} cannot be applied to NULL for row `{row_key}`"
            ))),
            (Null, InsertOrMerge) => Ok(InsertOrMerge),
            (Null, InsertOrReplace) => Ok(InsertOrReplace),
            (InsertOrMerge, InsertOrMerge) => Ok(InsertOrMerge),
            (InsertOrReplace, InsertOrReplace) => Ok(InsertOrReplace),
            (first, second) => followed(first, second),
        }
    }
}

/// A single operation against an included-entity row.
#[derive(Debug, Clone)]
pub struct EntityOperation {
    kind: OperationKind,
    entity: Arc<Entity>,
}

impl EntityOperation {
    /// Insert the row, failing the write if it already exists.
    pub fn insert(entity: Arc<Entity>) -> Self {
        Self {
            kind: OperationKind::Insert,
            entity,
        }
    }

    /// Replace the row, guarded by the entity's e-tag.
    pub fn replace(entity: Arc<Entity>) -> Self {
        Self {
            kind: OperationKind::Replace,
            entity,
        }
    }

    /// Delete the row, guarded by the entity's e-tag when present.
    pub fn delete(entity: Arc<Entity>) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity,
        }
    }

    /// Insert the row or merge into it when it exists.
    pub fn insert_or_merge(entity: Arc<Entity>) -> Self {
        Self {
            kind: OperationKind::InsertOrMerge,
            entity,
        }
    }

    /// Insert the row or fully replace it when it exists.
    pub fn insert_or_replace(entity: Arc<Entity>) -> Self {
        Self {
            kind: OperationKind::InsertOrReplace,
            entity,
        }
    }

    // header updates merge when the stored properties must survive
    pub(crate) fn update_merge(entity: Arc<Entity>) -> Self {
        Self {
            kind: OperationKind::UpdateMerge,
            entity,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// Folds `self` followed by `other` against the same row.
    pub(crate) fn merge(&self, other: &EntityOperation) -> Result<EntityOperation> {
        let kind = self
            .kind
            .merge(other.kind, &other.entity.row_key)?;

        Ok(EntityOperation {
            kind,
            entity: other.entity.clone(),
        })
    }

    pub(crate) fn is_null(&self) -> bool {
        self.kind == OperationKind::Null
    }

    /// Maps the operation to the backend action it submits as.
    pub(crate) fn to_batch_action(&self) -> Result<BatchAction> {
        let entity = self.entity.as_ref();
        let row_key = entity.row_key.clone();

        match self.kind {
            OperationKind::Insert => Ok(BatchAction::Add {
                row_key,
                properties: entity.properties.clone(),
            }),
            OperationKind::Replace | OperationKind::UpdateMerge => {
                if entity.etag.is_empty() {
                    return Err(StreamError::InvalidOperation(format!(
                        "operation {} for row `{row_key}` requires an e-tag, or `{ETAG_ANY}` to match any",
                        self.kind
                    )));
                }

                if self.kind == OperationKind::Replace {
                    Ok(BatchAction::UpdateReplace {
                        row_key,
                        etag: entity.etag.clone(),
                        properties: entity.properties.clone(),
                    })
                } else {
                    Ok(BatchAction::UpdateMerge {
                        row_key,
                        etag: entity.etag.clone(),
                        properties: entity.properties.clone(),
                    })
                }
            }
            OperationKind::Delete => Ok(BatchAction::Delete {
                row_key,
                etag: if entity.etag.is_empty() {
                    ETAG_ANY.to_owned()
                } else {
                    entity.etag.clone()
                },
            }),
            OperationKind::InsertOrMerge => Ok(BatchAction::UpsertMerge {
                row_key,
                properties: entity.properties.clone(),
            }),
            OperationKind::InsertOrReplace => Ok(BatchAction::UpsertReplace {
                row_key,
                properties: entity.properties.clone(),
            }),
            OperationKind::Null => Err(StreamError::InvalidOperation(format!(
                "cancelled operation for row `{row_key}` cannot be submitted"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OperationKind::{self, *};
    use super::*;

    fn merged(first: OperationKind, second: OperationKind) -> Result<OperationKind> {
        first.merge(second, "row")
    }

    #[test]
    fn insert_row_of_the_table() {
        assert!(merged(Insert, Insert).is_err());
        assert_eq!(merged(Insert, Replace).unwrap(), Insert);
        assert_eq!(merged(Insert, Delete).unwrap(), Null);
        assert!(merged(Insert, InsertOrMerge).is_err());
        assert!(merged(Insert, InsertOrReplace).is_err());
    }

    #[test]
    fn replace_row_of_the_table() {
        assert!(merged(Replace, Insert).is_err());
        assert_eq!(merged(Replace, Replace).unwrap(), Replace);
        assert_eq!(merged(Replace, Delete).unwrap(), Delete);
        assert!(merged(Replace, InsertOrMerge).is_err());
        assert!(merged(Replace, InsertOrReplace).is_err());
    }

    #[test]
    fn delete_row_of_the_table() {
        assert_eq!(merged(Delete, Insert).unwrap(), Replace);
        assert!(merged(Delete, Replace).is_err());
        assert!(merged(Delete, Delete).is_err());
        assert!(merged(Delete, InsertOrMerge).is_err());
        assert!(merged(Delete, InsertOrReplace).is_err());
    }

    #[test]
    fn null_row_of_the_table() {
        assert_eq!(merged(Null, Insert).unwrap(), Insert);
        assert!(merged(Null, Replace).is_err());
        assert!(merged(Null, Delete).is_err());
        assert_eq!(merged(Null, InsertOrMerge).unwrap(), InsertOrMerge);
        assert_eq!(merged(Null, InsertOrReplace).unwrap(), InsertOrReplace);
    }

    #[test]
    fn upsert_rows_of_the_table() {
        assert!(merged(InsertOrMerge, Insert).is_err());
        assert!(merged(InsertOrMerge, Replace).is_err());
        assert!(merged(InsertOrMerge, Delete).is_err());
        assert_eq!(merged(InsertOrMerge, InsertOrMerge).unwrap(), InsertOrMerge);
        assert!(merged(InsertOrMerge, InsertOrReplace).is_err());

        assert!(merged(InsertOrReplace, Insert).is_err());
        assert!(merged(InsertOrReplace, Replace).is_err());
        assert!(merged(InsertOrReplace, Delete).is_err());
        assert!(merged(InsertOrReplace, InsertOrMerge).is_err());
        assert_eq!(
            merged(InsertOrReplace, InsertOrReplace).unwrap(),
            InsertOrReplace
        );
    }

    #[test]
    fn error_messages_name_the_sequence() {
        let err = merged(Insert, Insert).unwrap_err();
        assert!(err
            .to_string()
            .contains("Insert cannot be followed by Insert"));

        let err = merged(Null, Replace).unwrap_err();
        assert!(err.to_string().contains("cannot be applied to NULL"));
    }

    #[test]
    fn replace_without_etag_is_rejected() {
        let entity = Arc::new(Entity::new("row-1"));
        let err = EntityOperation::replace(entity).to_batch_action().unwrap_err();

        assert!(err.to_string().contains("requires an e-tag"));
    }

    #[test]
    fn replace_with_any_etag_is_accepted() {
        let entity = Arc::new(Entity::new("row-1").etag(ETAG_ANY));
        let action = EntityOperation::replace(entity).to_batch_action().unwrap();

        assert!(matches!(action, BatchAction::UpdateReplace { .. }));
    }
}
