//! Backend seam for the underlying partition/table client.
//!
//! An [`Engine`] exposes the three primitives the library needs from a
//! wide-column row store: an atomic partition-scoped batch submission,
//! a bounded row-key range query, and a point read. Authentication,
//! transport retries and connection pooling belong to the engine, not
//! to this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dyn_clone::DynClone;
use parse_display::Display;

use crate::properties::PropertyMap;

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "memory")]
pub use memory::*;

/// Hard cap on actions per batch transaction imposed by the backend.
pub const MAX_BATCH_ACTIONS: usize = 100;

/// E-tag sentinel matching any stored row version.
pub const ETAG_ANY: &str = "*";

/// A row returned from a query or point read.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub row_key: String,
    pub etag: String,
    pub timestamp: DateTime<Utc>,
    pub properties: PropertyMap,
}

/// A single mutation inside a batch transaction.
///
/// Guarded variants carry the e-tag the row must still hold;
/// [`ETAG_ANY`] disables the check.
#[derive(Debug, Clone)]
pub enum BatchAction {
    /// Insert a new row, failing if it exists.
    Add {
        row_key: String,
        properties: PropertyMap,
    },
    /// Replace an existing row, guarded by e-tag.
    UpdateReplace {
        row_key: String,
        etag: String,
        properties: PropertyMap,
    },
    /// Merge into an existing row, guarded by e-tag.
    UpdateMerge {
        row_key: String,
        etag: String,
        properties: PropertyMap,
    },
    /// Delete an existing row, guarded by e-tag.
    Delete { row_key: String, etag: String },
    /// Insert or fully replace a row.
    UpsertReplace {
        row_key: String,
        properties: PropertyMap,
    },
    /// Insert or merge into a row.
    UpsertMerge {
        row_key: String,
        properties: PropertyMap,
    },
}

impl BatchAction {
    pub fn row_key(&self) -> &str {
        match self {
            BatchAction::Add { row_key, .. }
            | BatchAction::UpdateReplace { row_key, .. }
            | BatchAction::UpdateMerge { row_key, .. }
            | BatchAction::Delete { row_key, .. }
            | BatchAction::UpsertReplace { row_key, .. }
            | BatchAction::UpsertMerge { row_key, .. } => row_key,
        }
    }
}

/// Per-action outcome of a successful batch, in submission order.
///
/// Deletes leave `etag` empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub etag: String,
}

/// Backend error codes the library classifies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorCode {
    EntityAlreadyExists,
    UpdateConditionNotSatisfied,
    EntityNotFound,
    EntityTooLarge,
    InvalidInput,
}

/// Failures surfaced by an [`Engine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A batch transaction was rejected; `index` is the 0-based
    /// position of the failing action within the submitted batch.
    #[error("transaction failed at action {index}: {code}")]
    Transaction { index: usize, code: ErrorCode },

    /// A non-batch request was rejected.
    #[error("request failed: {code}")]
    Request { code: ErrorCode },

    /// Transport-level failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The partition/table client abstraction.
#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    /// Atomically applies `actions` to rows of `partition`.
    ///
    /// Either every action is applied or none is. On success the
    /// returned results align with the submitted actions by index.
    async fn submit(
        &self,
        partition: &str,
        actions: Vec<BatchAction>,
    ) -> Result<Vec<ActionResult>, EngineError>;

    /// Returns rows of `partition` with `from <= row_key <= to`, in
    /// ascending row-key order.
    async fn query_range(
        &self,
        partition: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<TableRow>, EngineError>;

    /// Point-reads a single row.
    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<TableRow>, EngineError>;
}

dyn_clone::clone_trait_object!(Engine);
