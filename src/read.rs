//! Slice-based stream reading.
//!
//! A read issues the event range query and the header point query in
//! parallel, then assembles a typed [`StreamSlice`] with end-of-stream
//! detection. The library never paginates on its own; callers continue
//! from `last version + 1`.

use futures_util::try_join;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    engine::TableRow,
    error::{Result, StreamError},
    partition::Partition,
    properties::PropertyMap,
    stream::Stream,
};

/// Slice size to reach for when a caller has no better bound.
pub const DEFAULT_SLICE_SIZE: usize = 1000;

/// A persisted event row, as returned from a read.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// Position in the stream.
    pub version: i64,
    /// User attributes of the event, reserved names excluded.
    pub properties: PropertyMap,
}

impl EventRow {
    /// Copies the event's attributes into a user type.
    pub fn to_data<T: DeserializeOwned>(&self) -> Result<T> {
        self.properties.to_object()
    }
}

/// A bounded contiguous window over a stream's events.
#[derive(Debug)]
pub struct StreamSlice<T> {
    /// Header snapshot taken in the same read.
    pub stream: Stream,
    /// At most `slice_size` events, ascending from `start_version`.
    pub events: Vec<T>,
    /// True iff the next version a caller would request exceeds the
    /// header's version.
    pub is_end_of_stream: bool,
    pub start_version: i64,
    pub slice_size: usize,
}

pub(crate) async fn read_with<T>(
    partition: &Partition,
    start_version: i64,
    slice_size: usize,
    transform: impl Fn(EventRow) -> Result<T>,
) -> Result<StreamSlice<T>> {
    if start_version < 1 {
        return Err(StreamError::ArgumentOutOfRange {
            name: "start_version",
            reason: "must be at least 1",
        });
    }

    if slice_size < 1 {
        return Err(StreamError::ArgumentOutOfRange {
            name: "slice_size",
            reason: "must be at least 1",
        });
    }

    let from = partition.event_version_row_key(start_version);
    let to = partition.event_version_row_key(start_version.saturating_add(slice_size as i64 - 1));

    let engine = partition.engine();
    let (rows, header) = try_join!(
        engine.query_range(partition.key(), &from, &to),
        engine.get(partition.key(), partition.stream_row_key()),
    )?;

    let Some(header) = header else {
        return Err(StreamError::NotFound {
            partition: partition.key().to_owned(),
        });
    };

    let stream = Stream::from_header_row(partition.clone(), header)?;

    let mut events = Vec::with_capacity(rows.len());

    for row in rows {
        events.push(transform(event_row(row)?)?);
    }

    let read = events.len();
    let is_end_of_stream =
        read < slice_size || start_version + read as i64 - 1 >= stream.version();

    debug!(
        partition = partition.key(),
        start_version,
        read,
        is_end_of_stream,
        "read stream slice"
    );

    Ok(StreamSlice {
        stream,
        events,
        is_end_of_stream,
        start_version,
        slice_size,
    })
}

fn event_row(row: TableRow) -> Result<EventRow> {
    let version = row.properties.version_attribute().ok_or_else(|| {
        StreamError::InvalidOperation(format!(
            "event row `{}` has no Version attribute",
            row.row_key
        ))
    })?;

    Ok(EventRow {
        version,
        properties: row.properties.user_view(),
    })
}
