//! HTTP run service client.
//!
//! Speaks the assistant service's REST + SSE protocol: thread and message
//! CRUD over JSON, and streaming runs as `event:`/`data:` server-sent
//! event frames. Each streaming response is consumed by a spawned task
//! that decodes frames and forwards [`RunEvent`]s through a channel in
//! arrival order; dropping the receiver stops the task.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::protocol::{RunEvent, ToolOutput};
use crate::transcript::{Message, Role};

use super::service::EventReceiver;
use super::{RemoteThread, RunConfig, RunService, StreamError};

/// Run service backed by the hosted assistant API.
pub struct HttpRunService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadWire {
    id: String,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
struct MessageListWire {
    data: Vec<MessageWire>,
}

#[derive(Debug, Deserialize)]
struct MessageWire {
    role: String,
    content: Vec<ContentWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
enum ContentWire {
    Text { text: TextValueWire },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValueWire {
    value: String,
}

impl HttpRunService {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StreamError::Stream(format!("{status}: {body}")))
    }

    /// Consume a streaming response on a spawned task, forwarding decoded
    /// events until the stream or the receiver goes away.
    fn spawn_forwarder(response: reqwest::Response) -> EventReceiver {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseFrameDecoder::new();
            'stream: while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        error!(error = %e, "Run stream transport error");
                        let _ = tx.send(Err(StreamError::Transport(e))).await;
                        break;
                    }
                };
                for (event, data) in decoder.push(&String::from_utf8_lossy(&chunk)) {
                    if data == "[DONE]" {
                        break 'stream;
                    }
                    let message = RunEvent::decode(&event, &data).map_err(StreamError::Decode);
                    let failed = message.is_err();
                    if tx.send(message).await.is_err() {
                        warn!("Event receiver dropped, stopping stream");
                        break 'stream;
                    }
                    if failed {
                        break 'stream;
                    }
                }
            }
            debug!("Run stream task exiting");
        });
        rx
    }
}

/// Incremental SSE frame parser. Feed it raw chunks; it yields complete
/// `(event, data)` frames at blank-line boundaries.
struct SseFrameDecoder {
    buffer: String,
    event: Option<String>,
    data: String,
}

impl SseFrameDecoder {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            event: None,
            data: String::new(),
        }
    }

    fn push(&mut self, chunk: &str) -> Vec<(String, String)> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=pos);
            if line.is_empty() {
                if let Some(event) = self.event.take() {
                    frames.push((event, std::mem::take(&mut self.data)));
                } else {
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("event:") {
                self.event = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                // Multi-line data fields join with a newline per the SSE spec.
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
            // Comment lines and unknown fields are ignored.
        }
        frames
    }
}

fn role_from_wire(role: &str) -> Role {
    match role {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => {
            warn!(role = other, "Unknown message role, treating as assistant");
            Role::Assistant
        }
    }
}

#[async_trait]
impl RunService for HttpRunService {
    async fn create_thread(&self) -> Result<RemoteThread, StreamError> {
        debug!("Creating remote thread");
        let response = self
            .client
            .post(self.url("threads"))
            .bearer_auth(&self.api_key)
            .json(&json!({}))
            .send()
            .await?;
        let wire: ThreadWire = Self::check(response).await?.json().await?;
        Ok(RemoteThread {
            id: wire.id,
            created_at: wire.created_at,
        })
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<RemoteThread, StreamError> {
        let response = self
            .client
            .get(self.url(&format!("threads/{thread_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let wire: ThreadWire = Self::check(response).await?.json().await?;
        Ok(RemoteThread {
            id: wire.id,
            created_at: wire.created_at,
        })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, StreamError> {
        let response = self
            .client
            .get(self.url(&format!("threads/{thread_id}/messages")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let wire: MessageListWire = Self::check(response).await?.json().await?;

        // The service returns newest first; the transcript wants oldest first.
        let mut messages: Vec<Message> = wire
            .data
            .into_iter()
            .map(|message| {
                let text = message
                    .content
                    .iter()
                    .find_map(|content| match content {
                        ContentWire::Text { text } => Some(text.value.clone()),
                        ContentWire::Other => None,
                    })
                    .unwrap_or_default();
                Message::with_text(role_from_wire(&message.role), &text)
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), StreamError> {
        debug!(thread_id, "Posting user message");
        let response = self
            .client
            .post(self.url(&format!("threads/{thread_id}/messages")))
            .bearer_auth(&self.api_key)
            .json(&json!({ "role": "user", "content": text }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        config: &RunConfig,
    ) -> Result<EventReceiver, StreamError> {
        debug!(thread_id, assistant_id = %config.assistant_id, "Starting streamed run");
        let response = self
            .client
            .post(self.url(&format!("threads/{thread_id}/runs")))
            .bearer_auth(&self.api_key)
            .json(&json!({ "assistantId": config.assistant_id, "stream": true }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(Self::spawn_forwarder(response))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventReceiver, StreamError> {
        debug!(thread_id, run_id, count = outputs.len(), "Submitting tool outputs");
        let response = self
            .client
            .post(self.url(&format!(
                "threads/{thread_id}/runs/{run_id}/submit_tool_outputs"
            )))
            .bearer_auth(&self.api_key)
            .json(&json!({ "toolOutputs": outputs, "stream": true }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(Self::spawn_forwarder(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_yields_complete_frames() {
        let mut decoder = SseFrameDecoder::new();
        let frames =
            decoder.push("event: textDelta\ndata: {\"value\":\"hi\"}\n\nevent: thread.run.completed\ndata: {}\n\n");
        assert_eq!(
            frames,
            vec![
                ("textDelta".to_string(), "{\"value\":\"hi\"}".to_string()),
                ("thread.run.completed".to_string(), "{}".to_string()),
            ]
        );
    }

    #[test]
    fn decoder_handles_frames_split_across_chunks() {
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.push("event: textD").is_empty());
        assert!(decoder.push("elta\ndata: {\"val").is_empty());
        let frames = decoder.push("ue\":\"hi\"}\n\n");
        assert_eq!(
            frames,
            vec![("textDelta".to_string(), "{\"value\":\"hi\"}".to_string())]
        );
    }

    #[test]
    fn decoder_joins_multi_line_data() {
        let mut decoder = SseFrameDecoder::new();
        let frames = decoder.push("event: textDelta\ndata: {\ndata: }\n\n");
        assert_eq!(frames, vec![("textDelta".to_string(), "{\n}".to_string())]);
    }

    #[test]
    fn decoder_tolerates_crlf() {
        let mut decoder = SseFrameDecoder::new();
        let frames = decoder.push("event: textCreated\r\ndata: {}\r\n\r\n");
        assert_eq!(frames, vec![("textCreated".to_string(), "{}".to_string())]);
    }

    #[test]
    fn decoder_skips_data_without_event_name() {
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.push("data: {}\n\n").is_empty());
    }

    #[test]
    fn message_list_maps_oldest_first() {
        let json = r#"{
            "data": [
                {"role": "assistant", "content": [{"type": "text", "text": {"value": "Added milk."}}]},
                {"role": "user", "content": [{"type": "text", "text": {"value": "add milk"}}]}
            ]
        }"#;
        let wire: MessageListWire = serde_json::from_str(json).unwrap();
        assert_eq!(wire.data.len(), 2);
        // Mapping and reversal are exercised through list_messages; here we
        // pin the wire shape and role conversion.
        assert_eq!(role_from_wire(&wire.data[0].role), Role::Assistant);
        assert_eq!(role_from_wire(&wire.data[1].role), Role::User);
    }

    #[test]
    fn unknown_content_types_are_tolerated() {
        let json = r#"{"role": "assistant", "content": [{"type": "image_file"}]}"#;
        let wire: MessageWire = serde_json::from_str(json).unwrap();
        assert!(matches!(wire.content[0], ContentWire::Other));
    }
}
