//! Folds the included operations of a write into one operation per row.
//!
//! Grouping is keyed by row key but guarded by entity *identity*: all
//! operations against a row must share the same `Arc<Entity>` handle,
//! because each step needs the e-tag produced by the previous one.

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{Result, StreamError},
    operation::{Entity, EntityOperation},
};

pub(crate) struct ChangeTracker {
    groups: Vec<Group>,
    by_row_key: HashMap<String, usize>,
}

struct Group {
    entity: Arc<Entity>,
    operation: EntityOperation,
}

impl ChangeTracker {
    pub(crate) fn new() -> Self {
        Self {
            groups: Vec::new(),
            by_row_key: HashMap::new(),
        }
    }

    pub(crate) fn record(&mut self, operation: &EntityOperation) -> Result<()> {
        let row_key = operation.entity().row_key.clone();

        match self.by_row_key.get(&row_key) {
            None => {
                self.by_row_key.insert(row_key, self.groups.len());
                self.groups.push(Group {
                    entity: operation.entity().clone(),
                    operation: operation.clone(),
                });
            }
            Some(&index) => {
                let group = &mut self.groups[index];

                if !Arc::ptr_eq(&group.entity, operation.entity()) {
                    return Err(StreamError::InvalidOperation(format!(
                        "different entity instances for the same row key `{row_key}`"
                    )));
                }

                group.operation = group.operation.merge(operation)?;
            }
        }

        Ok(())
    }

    /// The folded operation set, in first-appearance order, with
    /// cancelled pairs dropped.
    pub(crate) fn compute(self) -> Vec<EntityOperation> {
        self.groups
            .into_iter()
            .map(|group| group.operation)
            .filter(|operation| !operation.is_null())
            .collect()
    }
}
