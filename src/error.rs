use std::sync::Arc;

use parse_display::Display;

use crate::{
    engine::EngineError,
    operation::{Entity, OperationKind},
};

/// The flavor of a concurrency conflict, carried by
/// [`StreamError::ConcurrencyConflict`].
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Conflict {
    /// The stream header changed since it was read.
    #[display("stream header has changed")]
    StreamChanged,

    /// The stream header changed, or the stream already exists.
    #[display("stream header has changed or stream already exists")]
    StreamChangedOrExists,

    /// An event row at this version is already persisted.
    #[display("event version {0} already exists")]
    EventVersionExists(i64),
}

/// Errors raised by stream operations.
///
/// Transport-level failures from the underlying table client pass
/// through as [`StreamError::Engine`] unmapped.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream not found in partition `{partition}`")]
    NotFound { partition: String },

    #[error("concurrency conflict in partition `{partition}`: {conflict}")]
    ConcurrencyConflict { partition: String, conflict: Conflict },

    #[error("event with id `{id}` already exists in partition `{partition}`")]
    DuplicateEvent { partition: String, id: String },

    #[error("included {kind} operation conflict on row `{}` in partition `{partition}`", .entity.row_key)]
    IncludedOperationConflict {
        partition: String,
        entity: Arc<Entity>,
        kind: OperationKind,
    },

    #[error("{0}")]
    InvalidOperation(String),

    #[error("argument `{name}` out of range: {reason}")]
    ArgumentOutOfRange {
        name: &'static str,
        reason: &'static str,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, StreamError>;
