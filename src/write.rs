//! Stream write, provision and set-properties operations.
//!
//! A write packs the header update, the event and event-id rows and the
//! folded include operations into one or more partition-scoped batches.
//! The position of every action within a batch is remembered so a
//! backend rejection can be classified by its failing-action index.

use std::sync::Arc;

use tracing::debug;

use crate::{
    chunk::{self, Chunk},
    engine::{BatchAction, EngineError, ErrorCode},
    error::{Conflict, Result, StreamError},
    operation::{Entity, EntityOperation},
    partition::Partition,
    properties::{PropertyMap, Value},
    record::{EventData, RecordedEvent},
    stream::Stream,
    tracker::ChangeTracker,
};

/// Options of a single write.
#[derive(Debug, Clone)]
pub struct StreamWriteOptions {
    /// Fold multiple include operations against one row into a single
    /// action (the default). When disabled, includes pass through in
    /// caller order and conflicting operations against the same row
    /// are the caller's responsibility.
    pub track_changes: bool,
}

impl Default for StreamWriteOptions {
    fn default() -> Self {
        Self {
            track_changes: true,
        }
    }
}

/// Outcome of a successful write.
#[derive(Debug)]
pub struct WriteResult {
    /// The stream header after the write; use it for the next
    /// operation on this stream.
    pub stream: Stream,
    /// The written events with their assigned versions.
    pub events: Vec<RecordedEvent>,
}

// what each submitted action stood for, by batch position
enum Origin {
    Header,
    Event { version: i64 },
    EventId { id: String },
    Include { operation: EntityOperation },
}

pub(crate) async fn write(
    stream: &Stream,
    options: &StreamWriteOptions,
    events: Vec<EventData>,
) -> Result<WriteResult> {
    if events.is_empty() {
        return Err(StreamError::InvalidOperation(
            "no events supplied for write".to_owned(),
        ));
    }

    let mut version = stream.version();
    let recorded: Vec<RecordedEvent> = events
        .into_iter()
        .map(|event| {
            version += 1;
            RecordedEvent::record(event, version)
        })
        .collect();

    let chunks = chunk::split(recorded)?;

    debug!(
        partition = stream.partition().key(),
        events = version - stream.version(),
        chunks = chunks.len(),
        "writing events"
    );

    let mut current = stream.clone();
    let mut written = Vec::new();

    for chunk in chunks {
        let (next, mut events) = write_chunk(&current, options, chunk).await?;

        current = next;
        written.append(&mut events);
    }

    Ok(WriteResult {
        stream: current,
        events: written,
    })
}

async fn write_chunk(
    stream: &Stream,
    options: &StreamWriteOptions,
    chunk: Chunk,
) -> Result<(Stream, Vec<RecordedEvent>)> {
    let partition = stream.partition();
    let new_version = stream.version() + chunk.events.len() as i64;

    let mut actions = vec![header_action(stream, new_version)?];
    let mut origins = vec![Origin::Header];

    for event in &chunk.events {
        let (event_row, id_row) = event.event_actions(partition);

        actions.push(event_row);
        origins.push(Origin::Event {
            version: event.version,
        });

        if let Some(id_row) = id_row {
            actions.push(id_row);
            origins.push(Origin::EventId {
                id: event.id.clone().unwrap_or_default(),
            });
        }
    }

    let includes: Vec<EntityOperation> = if options.track_changes {
        let mut tracker = ChangeTracker::new();

        for event in &chunk.events {
            for operation in event.includes() {
                tracker.record(operation)?;
            }
        }

        tracker.compute()
    } else {
        chunk
            .events
            .iter()
            .flat_map(|event| event.includes().iter().cloned())
            .collect()
    };

    for operation in includes {
        actions.push(operation.to_batch_action()?);
        origins.push(Origin::Include { operation });
    }

    match partition.engine().submit(partition.key(), actions).await {
        Ok(results) => {
            // the header is always action 0, so its result leads
            let etag = results
                .first()
                .map(|result| result.etag.clone())
                .unwrap_or_default();

            Ok((stream.advanced(new_version, etag), chunk.events))
        }
        Err(error) => Err(classify(partition, &origins, error)),
    }
}

fn header_action(stream: &Stream, new_version: i64) -> Result<BatchAction> {
    let mut properties = stream.properties().cloned().unwrap_or_default();
    properties.insert_raw("Version", Value::I64(new_version));

    let header = Arc::new(
        Entity::new(stream.partition().stream_row_key())
            .etag(stream.etag().unwrap_or_default())
            .properties(properties),
    );

    let operation = if stream.is_transient() {
        EntityOperation::insert(header)
    } else if stream.properties().is_none() {
        // without known properties, a merge keeps the stored ones
        EntityOperation::update_merge(header)
    } else {
        EntityOperation::replace(header)
    };

    operation.to_batch_action()
}

fn classify(partition: &Partition, origins: &[Origin], error: EngineError) -> StreamError {
    let partition_key = partition.key().to_owned();

    match error {
        EngineError::Transaction { index, code } => match (code, origins.get(index)) {
            (ErrorCode::UpdateConditionNotSatisfied, _) => StreamError::ConcurrencyConflict {
                partition: partition_key,
                conflict: Conflict::StreamChanged,
            },
            (ErrorCode::EntityAlreadyExists, Some(Origin::Header)) => {
                StreamError::ConcurrencyConflict {
                    partition: partition_key,
                    conflict: Conflict::StreamChangedOrExists,
                }
            }
            (ErrorCode::EntityAlreadyExists, Some(Origin::EventId { id })) => {
                StreamError::DuplicateEvent {
                    partition: partition_key,
                    id: id.clone(),
                }
            }
            (ErrorCode::EntityAlreadyExists, Some(Origin::Event { version })) => {
                StreamError::ConcurrencyConflict {
                    partition: partition_key,
                    conflict: Conflict::EventVersionExists(*version),
                }
            }
            (ErrorCode::EntityAlreadyExists, Some(Origin::Include { operation })) => {
                StreamError::IncludedOperationConflict {
                    partition: partition_key,
                    entity: operation.entity().clone(),
                    kind: operation.kind(),
                }
            }
            _ => StreamError::Engine(EngineError::Transaction { index, code }),
        },
        EngineError::Request {
            code: ErrorCode::UpdateConditionNotSatisfied,
        } => StreamError::ConcurrencyConflict {
            partition: partition_key,
            conflict: Conflict::StreamChanged,
        },
        EngineError::Request {
            code: ErrorCode::EntityAlreadyExists,
        } => StreamError::ConcurrencyConflict {
            partition: partition_key,
            conflict: Conflict::StreamChangedOrExists,
        },
        other => StreamError::Engine(other),
    }
}

pub(crate) async fn write_at(
    partition: &Partition,
    expected_version: i64,
    options: &StreamWriteOptions,
    events: Vec<EventData>,
) -> Result<WriteResult> {
    if expected_version < 0 {
        return Err(StreamError::ArgumentOutOfRange {
            name: "expected_version",
            reason: "must be at least 0",
        });
    }

    let stream = if expected_version > 0 {
        let stream = Stream::open(partition).await?;

        if stream.version() != expected_version {
            return Err(StreamError::ConcurrencyConflict {
                partition: partition.key().to_owned(),
                conflict: Conflict::StreamChanged,
            });
        }

        stream
    } else {
        Stream::new(partition.clone())
    };

    write(&stream, options, events).await
}

pub(crate) async fn provision(
    partition: &Partition,
    properties: PropertyMap,
) -> Result<Stream> {
    let mut header = properties.clone();
    header.insert_raw("Version", Value::I64(0));

    debug!(partition = partition.key(), "provisioning stream");

    let submit = partition.engine().submit(
        partition.key(),
        vec![BatchAction::Add {
            row_key: partition.stream_row_key().to_owned(),
            properties: header,
        }],
    );

    match submit.await {
        Ok(results) => {
            let etag = results
                .first()
                .map(|result| result.etag.clone())
                .unwrap_or_default();

            Ok(Stream::persisted(partition.clone(), 0, etag, properties))
        }
        Err(
            EngineError::Transaction {
                code: ErrorCode::EntityAlreadyExists,
                ..
            }
            | EngineError::Request {
                code: ErrorCode::EntityAlreadyExists,
            },
        ) => Err(StreamError::ConcurrencyConflict {
            partition: partition.key().to_owned(),
            conflict: Conflict::StreamChangedOrExists,
        }),
        Err(other) => Err(other.into()),
    }
}

pub(crate) async fn set_properties(stream: &Stream, properties: PropertyMap) -> Result<Stream> {
    let Some(etag) = stream.etag() else {
        return Err(StreamError::InvalidOperation(
            "cannot set properties of a transient stream".to_owned(),
        ));
    };

    let partition = stream.partition();

    let mut header = properties.clone();
    header.insert_raw("Version", Value::I64(stream.version()));

    let submit = partition.engine().submit(
        partition.key(),
        vec![BatchAction::UpdateReplace {
            row_key: partition.stream_row_key().to_owned(),
            etag: etag.to_owned(),
            properties: header,
        }],
    );

    match submit.await {
        Ok(results) => {
            let etag = results
                .first()
                .map(|result| result.etag.clone())
                .unwrap_or_default();

            Ok(Stream::persisted(
                partition.clone(),
                stream.version(),
                etag,
                properties,
            ))
        }
        Err(
            EngineError::Transaction {
                code: ErrorCode::UpdateConditionNotSatisfied,
                ..
            }
            | EngineError::Request {
                code: ErrorCode::UpdateConditionNotSatisfied,
            },
        ) => Err(StreamError::ConcurrencyConflict {
            partition: partition.key().to_owned(),
            conflict: Conflict::StreamChanged,
        }),
        Err(other) => Err(other.into()),
    }
}
