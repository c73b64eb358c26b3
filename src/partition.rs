//! Partition addressing.
//!
//! Every stream lives in exactly one partition. Three reserved row-key
//! families share it: the header sentinel, event rows and event-id
//! rows. Event row keys zero-pad the version so lexicographic order
//! agrees with numeric order across the supported range.

use std::fmt;

use crate::engine::Engine;

/// Row key of the stream header.
pub const STREAM_ROW_KEY: &str = "SS-HEAD";

/// Row-key prefix of event rows.
pub const EVENT_ROW_KEY_PREFIX: &str = "SS-SE-";

/// Row-key prefix of event-id uniqueness rows.
pub const EVENT_ID_ROW_KEY_PREFIX: &str = "SS-UID-";

// ten digits keep lexicographic and numeric order aligned for any
// version up to 10^10 - 1
const VERSION_KEY_WIDTH: usize = 10;

/// A table partition: the engine handle paired with the partition key.
///
/// The atomicity and range-query unit of the store; all operations of
/// one stream address rows through its `Partition`.
#[derive(Clone)]
pub struct Partition {
    engine: Box<dyn Engine>,
    key: String,
}

impl Partition {
    pub fn new<E: Engine + 'static>(engine: E, key: impl Into<String>) -> Self {
        Self {
            engine: Box::new(engine),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn stream_row_key(&self) -> &'static str {
        STREAM_ROW_KEY
    }

    pub fn event_version_row_key(&self, version: i64) -> String {
        format!("{EVENT_ROW_KEY_PREFIX}{version:0width$}", width = VERSION_KEY_WIDTH)
    }

    pub fn event_id_row_key(&self, id: &str) -> String {
        format!("{EVENT_ID_ROW_KEY_PREFIX}{id}")
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition").field("key", &self.key).finish()
    }
}
