//! In-memory [`Engine`] with full batch transaction semantics.
//!
//! Backs the test suites and local development. Batches are atomic:
//! actions are applied to a scratch copy of the partition and the copy
//! only replaces the live one once every action has been accepted, so
//! a failed batch leaves no trace. Per-row e-tags come from a global
//! monotonic counter.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    engine::{
        ActionResult, BatchAction, Engine, EngineError, ErrorCode, TableRow, ETAG_ANY,
        MAX_BATCH_ACTIONS,
    },
    properties::PropertyMap,
};

#[derive(Debug, Clone)]
struct StoredRow {
    etag: String,
    timestamp: DateTime<Utc>,
    properties: PropertyMap,
}

#[derive(Default)]
struct State {
    partitions: HashMap<String, BTreeMap<String, StoredRow>>,
    etag_seq: u64,
}

/// In-memory table engine.
#[derive(Clone, Default)]
pub struct Memory(Arc<RwLock<State>>);

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in `partition`.
    pub fn row_count(&self, partition: &str) -> usize {
        self.0
            .read()
            .partitions
            .get(partition)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

fn next_etag(seq: &mut u64) -> String {
    *seq += 1;
    format!("\"{seq}\"")
}

fn guarded<'a>(
    rows: &'a mut BTreeMap<String, StoredRow>,
    row_key: &str,
    etag: &str,
) -> Result<&'a mut StoredRow, ErrorCode> {
    let row = rows.get_mut(row_key).ok_or(ErrorCode::EntityNotFound)?;

    if etag != ETAG_ANY && etag != row.etag {
        return Err(ErrorCode::UpdateConditionNotSatisfied);
    }

    Ok(row)
}

fn apply(
    rows: &mut BTreeMap<String, StoredRow>,
    action: &BatchAction,
    seq: &mut u64,
    now: DateTime<Utc>,
) -> Result<ActionResult, ErrorCode> {
    match action {
        BatchAction::Add {
            row_key,
            properties,
        } => {
            if rows.contains_key(row_key) {
                return Err(ErrorCode::EntityAlreadyExists);
            }

            let etag = next_etag(seq);
            rows.insert(
                row_key.clone(),
                StoredRow {
                    etag: etag.clone(),
                    timestamp: now,
                    properties: properties.clone(),
                },
            );

            Ok(ActionResult { etag })
        }
        BatchAction::UpdateReplace {
            row_key,
            etag,
            properties,
        } => {
            let row = guarded(rows, row_key, etag)?;

            row.etag = next_etag(seq);
            row.timestamp = now;
            row.properties = properties.clone();

            Ok(ActionResult {
                etag: row.etag.clone(),
            })
        }
        BatchAction::UpdateMerge {
            row_key,
            etag,
            properties,
        } => {
            let row = guarded(rows, row_key, etag)?;

            row.etag = next_etag(seq);
            row.timestamp = now;
            for (name, value) in properties.iter() {
                row.properties.insert_raw(name.clone(), value.clone());
            }

            Ok(ActionResult {
                etag: row.etag.clone(),
            })
        }
        BatchAction::Delete { row_key, etag } => {
            guarded(rows, row_key, etag)?;
            rows.remove(row_key);

            Ok(ActionResult {
                etag: String::new(),
            })
        }
        BatchAction::UpsertReplace {
            row_key,
            properties,
        } => {
            let etag = next_etag(seq);
            rows.insert(
                row_key.clone(),
                StoredRow {
                    etag: etag.clone(),
                    timestamp: now,
                    properties: properties.clone(),
                },
            );

            Ok(ActionResult { etag })
        }
        BatchAction::UpsertMerge {
            row_key,
            properties,
        } => {
            let etag = next_etag(seq);

            match rows.get_mut(row_key) {
                Some(row) => {
                    row.etag = etag.clone();
                    row.timestamp = now;
                    for (name, value) in properties.iter() {
                        row.properties.insert_raw(name.clone(), value.clone());
                    }
                }
                None => {
                    rows.insert(
                        row_key.clone(),
                        StoredRow {
                            etag: etag.clone(),
                            timestamp: now,
                            properties: properties.clone(),
                        },
                    );
                }
            }

            Ok(ActionResult { etag })
        }
    }
}

fn to_table_row(row_key: &str, row: &StoredRow) -> TableRow {
    TableRow {
        row_key: row_key.to_owned(),
        etag: row.etag.clone(),
        timestamp: row.timestamp,
        properties: row.properties.clone(),
    }
}

#[async_trait]
impl Engine for Memory {
    async fn submit(
        &self,
        partition: &str,
        actions: Vec<BatchAction>,
    ) -> Result<Vec<ActionResult>, EngineError> {
        if actions.is_empty() || actions.len() > MAX_BATCH_ACTIONS {
            return Err(EngineError::Request {
                code: ErrorCode::InvalidInput,
            });
        }

        let mut state = self.0.write();
        let mut rows = state
            .partitions
            .get(partition)
            .cloned()
            .unwrap_or_default();
        let mut seq = state.etag_seq;
        let now = Utc::now();

        let mut results = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            match apply(&mut rows, action, &mut seq, now) {
                Ok(result) => results.push(result),
                Err(code) => return Err(EngineError::Transaction { index, code }),
            }
        }

        state.etag_seq = seq;
        state.partitions.insert(partition.to_owned(), rows);

        Ok(results)
    }

    async fn query_range(
        &self,
        partition: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<TableRow>, EngineError> {
        let state = self.0.read();

        let Some(rows) = state.partitions.get(partition) else {
            return Ok(vec![]);
        };

        Ok(rows
            .range(from.to_owned()..=to.to_owned())
            .map(|(row_key, row)| to_table_row(row_key, row))
            .collect())
    }

    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<TableRow>, EngineError> {
        let state = self.0.read();

        Ok(state
            .partitions
            .get(partition)
            .and_then(|rows| rows.get(row_key))
            .map(|row| to_table_row(row_key, row)))
    }
}
