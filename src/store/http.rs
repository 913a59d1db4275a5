//! HTTP record store client.
//!
//! Talks to an Airtable-style REST API: one URL path segment per table,
//! bearer-token auth, and `{"records": [{"id", "fields"}]}` envelopes on
//! both sides of create/update calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{Fields, Record, RecordStore, RecordUpdate, StoreError, MAX_BATCH_RECORDS};

/// Record store backed by a hosted REST API.
pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    fields: Fields,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordsEnvelope {
    records: Vec<RecordWire>,
}

impl HttpRecordStore {
    /// `base_url` addresses one base, e.g. `https://api.example.com/v0/appX`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, kind: &str) -> String {
        format!("{}/{}", self.base_url, kind)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected(format!("{status}: {body}")))
    }

    fn into_records(envelope: RecordsEnvelope) -> Vec<Record> {
        envelope
            .records
            .into_iter()
            .map(|wire| Record {
                id: wire.id.unwrap_or_default(),
                fields: wire.fields,
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn list(
        &self,
        kind: &str,
        max_records: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        debug!(kind, ?max_records, "Listing records");
        let mut request = self
            .client
            .get(self.table_url(kind))
            .bearer_auth(&self.api_key);
        if let Some(max) = max_records {
            request = request.query(&[("maxRecords", max.to_string())]);
        }
        let response = Self::check(request.send().await?).await?;
        let envelope: RecordsEnvelope = response.json().await?;
        Ok(Self::into_records(envelope))
    }

    async fn find(&self, kind: &str, id: &str) -> Result<Option<Record>, StoreError> {
        debug!(kind, id, "Fetching record");
        let response = self
            .client
            .get(format!("{}/{}", self.table_url(kind), id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let wire: RecordWire = response.json().await?;
        Ok(Some(Record {
            id: wire.id.unwrap_or_else(|| id.to_string()),
            fields: wire.fields,
        }))
    }

    async fn create(&self, kind: &str, batch: Vec<Fields>) -> Result<Vec<Record>, StoreError> {
        if batch.len() > MAX_BATCH_RECORDS {
            return Err(StoreError::BatchTooLarge(batch.len()));
        }
        debug!(kind, count = batch.len(), "Creating records");
        let body = json!({
            "records": batch
                .into_iter()
                .map(|fields| json!({ "fields": fields }))
                .collect::<Vec<_>>()
        });
        let response = self
            .client
            .post(self.table_url(kind))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let envelope: RecordsEnvelope = response.json().await?;
        Ok(Self::into_records(envelope))
    }

    async fn update(
        &self,
        kind: &str,
        batch: Vec<RecordUpdate>,
    ) -> Result<Vec<Record>, StoreError> {
        if batch.len() > MAX_BATCH_RECORDS {
            return Err(StoreError::BatchTooLarge(batch.len()));
        }
        debug!(kind, count = batch.len(), "Updating records");
        let body = json!({
            "records": batch
                .into_iter()
                .map(|update| json!({ "id": update.id, "fields": update.fields }))
                .collect::<Vec<_>>()
        });
        let response = self
            .client
            .patch(self.table_url(kind))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let envelope: RecordsEnvelope = response.json().await?;
        Ok(Self::into_records(envelope))
    }
}
