//! In-memory record store.
//!
//! Backs the offline CLI mode and the test suite. Mirrors the hosted
//! store's semantics, including the batch cap, and additionally records the
//! size of every write batch so tests can assert chunking behavior.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Fields, Record, RecordStore, RecordUpdate, StoreError, MAX_BATCH_RECORDS};

#[derive(Default)]
struct Table {
    // Insertion-ordered so `list` is deterministic.
    records: Vec<Record>,
    batch_sizes: Vec<usize>,
}

/// Record store held entirely in memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of the write batches issued against a table, in order.
    pub fn batch_sizes(&self, kind: &str) -> Vec<usize> {
        self.tables
            .lock()
            .expect("store lock")
            .get(kind)
            .map(|table| table.batch_sizes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(
        &self,
        kind: &str,
        max_records: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.lock().expect("store lock");
        let records = tables
            .get(kind)
            .map(|table| table.records.clone())
            .unwrap_or_default();
        Ok(match max_records {
            Some(max) => records.into_iter().take(max).collect(),
            None => records,
        })
    }

    async fn find(&self, kind: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.lock().expect("store lock");
        Ok(tables
            .get(kind)
            .and_then(|table| table.records.iter().find(|record| record.id == id))
            .cloned())
    }

    async fn create(&self, kind: &str, batch: Vec<Fields>) -> Result<Vec<Record>, StoreError> {
        if batch.len() > MAX_BATCH_RECORDS {
            return Err(StoreError::BatchTooLarge(batch.len()));
        }
        let mut tables = self.tables.lock().expect("store lock");
        let table = tables.entry(kind.to_string()).or_default();
        table.batch_sizes.push(batch.len());

        let mut created = Vec::with_capacity(batch.len());
        for fields in batch {
            let record = Record {
                id: format!("rec{}", Uuid::new_v4().simple()),
                fields,
            };
            table.records.push(record.clone());
            created.push(record);
        }
        Ok(created)
    }

    async fn update(
        &self,
        kind: &str,
        batch: Vec<RecordUpdate>,
    ) -> Result<Vec<Record>, StoreError> {
        if batch.len() > MAX_BATCH_RECORDS {
            return Err(StoreError::BatchTooLarge(batch.len()));
        }
        let mut tables = self.tables.lock().expect("store lock");
        let table = tables.entry(kind.to_string()).or_default();
        table.batch_sizes.push(batch.len());

        let mut updated = Vec::with_capacity(batch.len());
        for update in batch {
            let record = table
                .records
                .iter_mut()
                .find(|record| record.id == update.id)
                .ok_or_else(|| StoreError::NotFound {
                    kind: kind.to_string(),
                    id: update.id.clone(),
                })?;
            for (name, value) in update.fields {
                record.fields.insert(name, value);
            }
            updated.push(record.clone());
        }
        Ok(updated)
    }
}
