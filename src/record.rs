//! Event input and its recorded form.
//!
//! Callers hand a [`Stream::write`](crate::Stream::write) a list of
//! [`EventData`]; the write assigns each one the next version and turns
//! it into a [`RecordedEvent`] carrying the rows it will insert.

use crate::{
    engine::BatchAction,
    operation::EntityOperation,
    partition::Partition,
    properties::{PropertyMap, Value},
};

/// A single event to append, as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct EventData {
    /// Optional caller id; when present the write reserves an event-id
    /// row and enforces uniqueness across the stream.
    pub id: Option<String>,
    /// User-defined attributes of the event row.
    pub properties: PropertyMap,
    /// Operations against unrelated rows of the same partition,
    /// committed in the same transaction as the event.
    pub includes: Vec<EntityOperation>,
}

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, value: impl Into<String>) -> Self {
        self.id = Some(value.into());

        self
    }

    pub fn properties(mut self, value: PropertyMap) -> Self {
        self.properties = value;

        self
    }

    pub fn property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name, value);

        self
    }

    pub fn include(mut self, operation: EntityOperation) -> Self {
        self.includes.push(operation);

        self
    }
}

/// An event with its assigned stream version.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// Position in the stream, starting at 1, gap-free.
    pub version: i64,
    pub id: Option<String>,
    pub properties: PropertyMap,
    includes: Vec<EntityOperation>,
}

impl RecordedEvent {
    pub(crate) fn record(event: EventData, version: i64) -> Self {
        Self {
            version,
            id: event.id,
            properties: event.properties,
            includes: event.includes,
        }
    }

    pub fn includes(&self) -> &[EntityOperation] {
        &self.includes
    }

    /// Total batch actions this event contributes: its row, the
    /// event-id row when an id is present, and its includes.
    pub fn operations(&self) -> usize {
        1 + usize::from(self.id.is_some()) + self.includes.len()
    }

    /// The event row insert plus the event-id row insert when an id is
    /// present.
    pub(crate) fn event_actions(&self, partition: &Partition) -> (BatchAction, Option<BatchAction>) {
        let mut properties = self.properties.clone();
        properties.insert_raw("Version", Value::I64(self.version));

        let event_row = BatchAction::Add {
            row_key: partition.event_version_row_key(self.version),
            properties,
        };

        let id_row = self.id.as_ref().map(|id| {
            let mut properties = PropertyMap::new();
            properties.insert_raw("Version", Value::I64(self.version));

            BatchAction::Add {
                row_key: partition.event_id_row_key(id),
                properties,
            }
        });

        (event_row, id_row)
    }
}
