//! Record store abstraction.
//!
//! Recipes, shopping items, meals, and locally registered thread stubs all
//! live in a spreadsheet-like backing store of typed record tables. Tool
//! handlers and the thread registry talk to it through the [`RecordStore`]
//! trait; implementations cover the hosted HTTP store and an in-memory
//! store for tests and offline use.
//!
//! The backing service rejects batched writes larger than
//! [`MAX_BATCH_RECORDS`]; callers with bigger batches go through
//! [`create_chunked`] / [`update_chunked`].

mod http;
mod memory;

pub use http::HttpRecordStore;
pub use memory::MemoryRecordStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum records the backing service accepts per create/update call.
pub const MAX_BATCH_RECORDS: usize = 10;

/// Table names used by souschef.
pub mod kinds {
    pub const RECIPES: &str = "Recipes";
    pub const SHOPPING: &str = "Shopping";
    pub const MEALS: &str = "Meals";
    pub const THREADS: &str = "Threads";
}

/// Field map for one record.
pub type Fields = Map<String, Value>;

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    /// Convenience accessor for a string field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// A partial update to an existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub id: String,
    pub fields: Fields,
}

/// Errors from record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch of {0} exceeds the {MAX_BATCH_RECORDS}-record limit")]
    BatchTooLarge(usize),

    #[error("record not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned malformed data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store rejected the request: {0}")]
    Rejected(String),
}

/// Create/read/update access to one backing store.
///
/// `create` and `update` enforce the service's batch cap; use the chunked
/// helpers to write arbitrarily many records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List records of a kind, up to `max_records` if given.
    async fn list(&self, kind: &str, max_records: Option<usize>)
        -> Result<Vec<Record>, StoreError>;

    /// Fetch one record by id.
    async fn find(&self, kind: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Create a batch of records (at most [`MAX_BATCH_RECORDS`]).
    async fn create(&self, kind: &str, batch: Vec<Fields>) -> Result<Vec<Record>, StoreError>;

    /// Update a batch of records (at most [`MAX_BATCH_RECORDS`]).
    async fn update(&self, kind: &str, batch: Vec<RecordUpdate>)
        -> Result<Vec<Record>, StoreError>;
}

/// Create any number of records, splitting into service-sized batches.
pub async fn create_chunked(
    store: &dyn RecordStore,
    kind: &str,
    all: Vec<Fields>,
) -> Result<Vec<Record>, StoreError> {
    let mut created = Vec::with_capacity(all.len());
    let mut batch = Vec::with_capacity(MAX_BATCH_RECORDS);
    let mut rest = all.into_iter();
    loop {
        batch.extend(rest.by_ref().take(MAX_BATCH_RECORDS));
        if batch.is_empty() {
            break;
        }
        created.extend(store.create(kind, std::mem::take(&mut batch)).await?);
    }
    Ok(created)
}

/// Update any number of records, splitting into service-sized batches.
pub async fn update_chunked(
    store: &dyn RecordStore,
    kind: &str,
    all: Vec<RecordUpdate>,
) -> Result<Vec<Record>, StoreError> {
    let mut updated = Vec::with_capacity(all.len());
    let mut batch = Vec::with_capacity(MAX_BATCH_RECORDS);
    let mut rest = all.into_iter();
    loop {
        batch.extend(rest.by_ref().take(MAX_BATCH_RECORDS));
        if batch.is_empty() {
            break;
        }
        updated.extend(store.update(kind, std::mem::take(&mut batch)).await?);
    }
    Ok(updated)
}

/// Build a [`Fields`] map from `(name, value)` pairs.
pub fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
