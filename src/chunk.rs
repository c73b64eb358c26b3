//! Splits a write into batches that fit one transaction.

use crate::{
    error::{Result, StreamError},
    record::RecordedEvent,
};

/// Cap on event-contributed actions per transaction: one less than the
/// backend's hard limit, leaving room for the stream header operation.
pub const MAX_OPERATIONS_PER_CHUNK: usize = 99;

#[derive(Debug)]
pub(crate) struct Chunk {
    pub events: Vec<RecordedEvent>,
    pub operations: usize,
}

/// Greedily packs events, in order, into chunks of at most
/// [`MAX_OPERATIONS_PER_CHUNK`] actions each.
pub(crate) fn split(events: Vec<RecordedEvent>) -> Result<Vec<Chunk>> {
    let mut chunks: Vec<Chunk> = Vec::new();

    for event in events {
        let operations = event.operations();

        if operations > MAX_OPERATIONS_PER_CHUNK {
            return Err(StreamError::InvalidOperation(format!(
                "event at version {} carries {operations} operations, exceeding the transaction cap of {MAX_OPERATIONS_PER_CHUNK}",
                event.version
            )));
        }

        match chunks.last_mut() {
            Some(chunk) if chunk.operations + operations <= MAX_OPERATIONS_PER_CHUNK => {
                chunk.operations += operations;
                chunk.events.push(event);
            }
            _ => chunks.push(Chunk {
                operations,
                events: vec![event],
            }),
        }
    }

    Ok(chunks)
}
