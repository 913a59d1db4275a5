//! The thread registry.
//!
//! Remote threads are canonical for identity and creation time; the record
//! store carries a lightweight stub per thread holding the locally-owned
//! fields (topic, last-touched time). [`ThreadRegistry`] joins the two
//! views, with the remote side winning every field it owns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::runs::{RemoteThread, RunService, StreamError};
use crate::store::{kinds, Fields, Record, RecordStore, RecordUpdate, StoreError};

/// Registry-level errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The locally-stored side of a thread, as read from the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStub {
    /// Record id in the store, not the remote thread id.
    pub record_id: String,
    pub thread_id: String,
    pub topic: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ThreadStub {
    /// Read a stub out of a store record. Returns `None` when the record
    /// has no thread id, which means it was written by hand or corrupted.
    pub fn from_record(record: &Record) -> Option<Self> {
        let thread_id = record.str_field("threadId")?.to_string();
        Some(Self {
            record_id: record.id.clone(),
            thread_id,
            topic: record.str_field("topic").map(str::to_string),
            updated_at: record
                .str_field("updatedAt")
                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        })
    }
}

/// A thread as the rest of the crate sees it: remote identity joined with
/// the locally-owned fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub topic: Option<String>,
    /// From the remote service; the stub never overrides it.
    pub created_at: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of creating a thread. The remote thread always exists once this
/// returns; the stub write may have failed independently.
#[derive(Debug)]
pub struct NewThread {
    pub thread: Thread,
    /// Set when the remote thread was created but its stub was not. The
    /// thread is an orphan: reachable by id, absent from listings.
    pub stub_write_failed: Option<StoreError>,
}

/// Join one remote thread with its stub. Remote fields win wherever both
/// sides carry a value; topic and updated-at are stub-owned.
pub fn merge_thread(remote: &RemoteThread, stub: &ThreadStub) -> Thread {
    Thread {
        id: remote.id.clone(),
        topic: stub.topic.clone(),
        created_at: remote.created_at,
        updated_at: stub.updated_at,
    }
}

/// Lists and creates threads across the remote service and the store.
pub struct ThreadRegistry {
    service: Arc<dyn RunService>,
    store: Arc<dyn RecordStore>,
}

impl ThreadRegistry {
    pub fn new(service: Arc<dyn RunService>, store: Arc<dyn RecordStore>) -> Self {
        Self { service, store }
    }

    /// All known threads: every stub in the store, joined with its remote
    /// thread. A stub whose remote thread no longer resolves is skipped
    /// with a warning rather than failing the whole listing.
    pub async fn list_threads(&self) -> Result<Vec<Thread>, RegistryError> {
        let records = self.store.list(kinds::THREADS, None).await?;
        let mut threads = Vec::with_capacity(records.len());
        for record in &records {
            let Some(stub) = ThreadStub::from_record(record) else {
                warn!(record_id = %record.id, "Thread record has no thread id, skipping");
                continue;
            };
            match self.service.retrieve_thread(&stub.thread_id).await {
                Ok(remote) => threads.push(merge_thread(&remote, &stub)),
                Err(e) => {
                    warn!(thread_id = %stub.thread_id, error = %e, "Dangling thread stub, skipping");
                }
            }
        }
        debug!(count = threads.len(), "Listed threads");
        Ok(threads)
    }

    /// Create a remote thread, then write its stub. A stub write failure
    /// does not roll the remote thread back; the caller gets the thread
    /// plus the error and decides what to surface.
    pub async fn create_thread(&self, topic: Option<&str>) -> Result<NewThread, RegistryError> {
        let remote = self.service.create_thread().await?;
        let now = Utc::now();

        let mut fields = serde_json::Map::new();
        fields.insert("threadId".to_string(), json!(remote.id));
        if let Some(topic) = topic {
            fields.insert("topic".to_string(), json!(topic));
        }
        fields.insert("updatedAt".to_string(), json!(now.to_rfc3339()));

        let stub_write_failed = match self.store.create(kinds::THREADS, vec![fields]).await {
            Ok(_) => None,
            Err(e) => {
                warn!(thread_id = %remote.id, error = %e, "Thread created but stub write failed; thread is orphaned");
                Some(e)
            }
        };

        Ok(NewThread {
            thread: Thread {
                id: remote.id,
                topic: topic.map(str::to_string),
                created_at: remote.created_at,
                updated_at: Some(now),
            },
            stub_write_failed,
        })
    }

    /// Stamp a thread's stub with a fresh last-touched time.
    pub async fn touch(&self, thread_id: &str) -> Result<(), RegistryError> {
        let records = self.store.list(kinds::THREADS, None).await?;
        let Some(record) = records
            .iter()
            .find(|r| r.str_field("threadId") == Some(thread_id))
        else {
            warn!(thread_id, "No stub to touch");
            return Ok(());
        };
        let update = RecordUpdate {
            id: record.id.clone(),
            fields: crate::store::fields(&[("updatedAt", json!(Utc::now().to_rfc3339()))]),
        };
        self.store.update(kinds::THREADS, vec![update]).await?;
        Ok(())
    }
}
