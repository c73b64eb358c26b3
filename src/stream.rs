//! The stream header value and the public operation surface.

use std::fmt;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    engine::TableRow,
    error::{Result, StreamError},
    partition::Partition,
    properties::PropertyMap,
    read::{self, EventRow, StreamSlice},
    record::EventData,
    write::{self, StreamWriteOptions, WriteResult},
};

/// A stream header: the caller's handle on one event stream.
///
/// The header is a value, not a connection. Every successful operation
/// returns a *new* `Stream` carrying the fresh version and e-tag; pass
/// that value to the next operation. Writing through a stale header
/// fails with a concurrency conflict.
#[derive(Clone)]
pub struct Stream {
    partition: Partition,
    version: i64,
    etag: Option<String>,
    properties: Option<PropertyMap>,
}

impl Stream {
    /// A transient stream: nothing persisted yet. The first write
    /// creates the header.
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            version: 0,
            etag: None,
            properties: None,
        }
    }

    /// A transient stream whose first write will also persist the
    /// given header properties.
    pub fn with_properties(partition: Partition, properties: PropertyMap) -> Self {
        Self {
            partition,
            version: 0,
            etag: None,
            properties: Some(properties),
        }
    }

    /// Rebuilds a header from externally stored coordinates.
    ///
    /// The properties are unknown, so header updates issued through
    /// this value merge instead of replacing, preserving whatever is
    /// stored.
    pub fn from_parts(partition: Partition, version: i64, etag: impl Into<String>) -> Self {
        Self {
            partition,
            version,
            etag: Some(etag.into()),
            properties: None,
        }
    }

    pub(crate) fn persisted(
        partition: Partition,
        version: i64,
        etag: String,
        properties: PropertyMap,
    ) -> Self {
        Self {
            partition,
            version,
            etag: Some(etag),
            properties: Some(properties),
        }
    }

    pub(crate) fn from_header_row(partition: Partition, row: TableRow) -> Result<Self> {
        let version = row.properties.version_attribute().ok_or_else(|| {
            StreamError::InvalidOperation(
                "stream header row has no Version attribute".to_owned(),
            )
        })?;

        Ok(Self::persisted(
            partition,
            version,
            row.etag,
            row.properties.user_view(),
        ))
    }

    // the same header, moved forward by a committed chunk
    pub(crate) fn advanced(&self, version: i64, etag: String) -> Self {
        Self {
            partition: self.partition.clone(),
            version,
            etag: Some(etag),
            properties: self.properties.clone(),
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Count of events appended so far; 0 for an empty stream.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn properties(&self) -> Option<&PropertyMap> {
        self.properties.as_ref()
    }

    /// True until the stream has been provisioned or written.
    pub fn is_transient(&self) -> bool {
        self.etag.is_none()
    }

    /// Creates the stream header with no properties. Fails with a
    /// concurrency conflict if the stream already exists.
    pub async fn provision(partition: &Partition) -> Result<Stream> {
        write::provision(partition, PropertyMap::new()).await
    }

    /// Creates the stream header with the given properties.
    pub async fn provision_with(partition: &Partition, properties: PropertyMap) -> Result<Stream> {
        write::provision(partition, properties).await
    }

    /// Opens an existing stream, failing with [`StreamError::NotFound`]
    /// when the partition has no header.
    pub async fn open(partition: &Partition) -> Result<Stream> {
        match Self::try_open(partition).await? {
            Some(stream) => Ok(stream),
            None => Err(StreamError::NotFound {
                partition: partition.key().to_owned(),
            }),
        }
    }

    /// Opens an existing stream, or `None` when it does not exist.
    pub async fn try_open(partition: &Partition) -> Result<Option<Stream>> {
        let header = partition
            .engine()
            .get(partition.key(), partition.stream_row_key())
            .await?;

        debug!(
            partition = partition.key(),
            found = header.is_some(),
            "opened stream"
        );

        header
            .map(|row| Self::from_header_row(partition.clone(), row))
            .transpose()
    }

    /// Whether a stream exists in the partition.
    pub async fn exists(partition: &Partition) -> Result<bool> {
        Ok(Self::try_open(partition).await?.is_some())
    }

    /// Appends events to the stream, committing their includes in the
    /// same transaction(s). Returns the advanced header together with
    /// the recorded events.
    pub async fn write(&self, events: Vec<EventData>) -> Result<WriteResult> {
        write::write(self, &StreamWriteOptions::default(), events).await
    }

    /// [`Stream::write`] with explicit options.
    pub async fn write_with(
        &self,
        options: &StreamWriteOptions,
        events: Vec<EventData>,
    ) -> Result<WriteResult> {
        write::write(self, options, events).await
    }

    /// Appends events to the stream at `expected_version`, opening the
    /// header first. `expected_version == 0` writes to a stream that
    /// must not exist yet.
    pub async fn write_at(
        partition: &Partition,
        expected_version: i64,
        events: Vec<EventData>,
    ) -> Result<WriteResult> {
        write::write_at(
            partition,
            expected_version,
            &StreamWriteOptions::default(),
            events,
        )
        .await
    }

    /// [`Stream::write_at`] with explicit options.
    pub async fn write_at_with(
        partition: &Partition,
        expected_version: i64,
        options: &StreamWriteOptions,
        events: Vec<EventData>,
    ) -> Result<WriteResult> {
        write::write_at(partition, expected_version, options, events).await
    }

    /// Replaces the header's properties, guarded by this header's
    /// e-tag. Rejects transient streams.
    pub async fn set_properties(&self, properties: PropertyMap) -> Result<Stream> {
        write::set_properties(self, properties).await
    }

    /// Reads at most `slice_size` events starting at `start_version`,
    /// as raw [`EventRow`]s.
    pub async fn read(
        partition: &Partition,
        start_version: i64,
        slice_size: usize,
    ) -> Result<StreamSlice<EventRow>> {
        read::read_with(partition, start_version, slice_size, Ok).await
    }

    /// Reads events as bare property bags.
    pub async fn read_properties(
        partition: &Partition,
        start_version: i64,
        slice_size: usize,
    ) -> Result<StreamSlice<PropertyMap>> {
        read::read_with(partition, start_version, slice_size, |row| {
            Ok(row.properties)
        })
        .await
    }

    /// Reads events copied into a user type via its deserialize impl.
    pub async fn read_as<T: DeserializeOwned>(
        partition: &Partition,
        start_version: i64,
        slice_size: usize,
    ) -> Result<StreamSlice<T>> {
        read::read_with(partition, start_version, slice_size, |row| row.to_data()).await
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("partition", &self.partition.key())
            .field("version", &self.version)
            .field("etag", &self.etag)
            .finish()
    }
}
