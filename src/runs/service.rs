//! The remote assistant service seam.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::{RunEvent, ToolOutput};
use crate::transcript::Message;

use super::{RunConfig, StreamError};

/// Receiver for the raw event channel behind an
/// [`EventSequence`](super::EventSequence).
pub type EventReceiver = mpsc::Receiver<Result<RunEvent, StreamError>>;

/// The canonical remote thread object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteThread {
    pub id: String,
    /// Unix timestamp assigned by the remote service at creation.
    pub created_at: i64,
}

/// Remote operations on threads and runs.
///
/// Implementations forward stream events through a channel in arrival
/// order; the channel closing marks the end of that sequence.
#[async_trait]
pub trait RunService: Send + Sync {
    /// Create a new remote thread.
    async fn create_thread(&self) -> Result<RemoteThread, StreamError>;

    /// Fetch the canonical thread object.
    async fn retrieve_thread(&self, thread_id: &str) -> Result<RemoteThread, StreamError>;

    /// Fetch a thread's persisted messages, oldest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, StreamError>;

    /// Append a user message to the thread.
    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), StreamError>;

    /// Start a new run on the thread and stream its events.
    async fn stream_run(
        &self,
        thread_id: &str,
        config: &RunConfig,
    ) -> Result<EventReceiver, StreamError>;

    /// Submit tool outputs for a paused run and stream the continuation.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventReceiver, StreamError>;
}
