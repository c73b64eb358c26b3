//! Event streams on top of wide-column row stores.
//!
//! `rowstream` turns a single table partition into an append-only,
//! gap-free, version-numbered event stream. Every write is one atomic
//! partition-scoped batch, so read-model rows, idempotency markers and
//! other *included* entities can be mutated in the same transaction
//! that appends the events.
//!
//! # Data Model
//!
//! Three row families share the partition, distinguished by row-key
//! prefix:
//!
//! - `SS-HEAD` - the stream header: current version, e-tag, metadata
//! - `SS-SE-{version}` - one immutable row per event, zero-padded so
//!   lexicographic order matches version order
//! - `SS-UID-{id}` - uniqueness marker, present when an event carries
//!   a caller-supplied id
//!
//! Caller-owned includes live in the same partition under their own
//! row keys, which must not collide with the reserved prefixes.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowstream::{EventData, Memory, Partition, Stream};
//!
//! let partition = Partition::new(Memory::new(), "order-11");
//! let stream = Stream::provision(&partition).await?;
//!
//! let result = stream
//!     .write(vec![EventData::new().id("e1"), EventData::new().id("e2")])
//!     .await?;
//!
//! assert_eq!(result.stream.version(), 2);
//!
//! let slice = Stream::read(&partition, 1, 100).await?;
//! assert!(slice.is_end_of_stream);
//! ```

#![forbid(unsafe_code)]

mod chunk;
mod engine;
mod error;
mod operation;
mod partition;
mod properties;
mod read;
mod record;
pub mod shard;
mod stream;
mod tracker;
mod write;

pub use chunk::MAX_OPERATIONS_PER_CHUNK;
pub use engine::*;
pub use error::*;
pub use operation::*;
pub use partition::*;
pub use properties::*;
pub use read::*;
pub use record::*;
pub use stream::*;
pub use write::{StreamWriteOptions, WriteResult};
