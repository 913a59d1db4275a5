//! Scripted run service.
//!
//! Replays pre-built event sequences instead of talking to the network.
//! Each `stream_run`/`submit_tool_outputs` call consumes the next script in
//! order, and every outbound call is recorded so tests can assert exactly
//! what was posted. This is the deterministic event iterator the engine's
//! ordering guarantees are tested against.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::{RunEvent, ToolOutput};
use crate::transcript::Message;

use super::service::EventReceiver;
use super::{RemoteThread, RunConfig, RunService, StreamError};

/// One scripted stream element.
#[derive(Debug, Clone)]
pub enum ScriptItem {
    Event(RunEvent),
    /// Mid-stream failure surfaced as `StreamError::Stream`.
    Error(String),
}

/// A recorded `submit_tool_outputs` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOutputs {
    pub thread_id: String,
    pub run_id: String,
    pub outputs: Vec<ToolOutput>,
}

/// Run service that replays scripted sequences.
pub struct ScriptedRunService {
    scripts: Mutex<VecDeque<Vec<ScriptItem>>>,
    user_messages: Mutex<Vec<(String, String)>>,
    submitted: Mutex<Vec<SubmittedOutputs>>,
    threads: Mutex<Vec<RemoteThread>>,
    next_thread: Mutex<u64>,
}

impl ScriptedRunService {
    /// One script per expected open/resume, consumed in order.
    pub fn new(scripts: Vec<Vec<ScriptItem>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            user_messages: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            next_thread: Mutex::new(1),
        }
    }

    /// Register a remote thread `retrieve_thread` should know about.
    pub fn seed_thread(&self, thread: RemoteThread) {
        self.threads.lock().expect("threads lock").push(thread);
    }

    /// User messages posted so far, as `(thread_id, text)`.
    pub fn user_messages(&self) -> Vec<(String, String)> {
        self.user_messages.lock().expect("messages lock").clone()
    }

    /// Tool output batches submitted so far.
    pub fn submitted(&self) -> Vec<SubmittedOutputs> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    fn next_sequence(&self) -> Result<EventReceiver, StreamError> {
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .pop_front()
            .ok_or_else(|| StreamError::Stream("no scripted sequence left".to_string()))?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for item in script {
                let message = match item {
                    ScriptItem::Event(event) => Ok(event),
                    ScriptItem::Error(reason) => Err(StreamError::Stream(reason)),
                };
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl RunService for ScriptedRunService {
    async fn create_thread(&self) -> Result<RemoteThread, StreamError> {
        let mut next = self.next_thread.lock().expect("thread counter lock");
        let thread = RemoteThread {
            id: format!("thread_{}", *next),
            created_at: 1_700_000_000 + *next as i64,
        };
        *next += 1;
        self.threads.lock().expect("threads lock").push(thread.clone());
        Ok(thread)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<RemoteThread, StreamError> {
        self.threads
            .lock()
            .expect("threads lock")
            .iter()
            .find(|thread| thread.id == thread_id)
            .cloned()
            .ok_or_else(|| StreamError::Stream(format!("unknown thread: {thread_id}")))
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<Message>, StreamError> {
        Ok(Vec::new())
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), StreamError> {
        self.user_messages
            .lock()
            .expect("messages lock")
            .push((thread_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn stream_run(
        &self,
        _thread_id: &str,
        _config: &RunConfig,
    ) -> Result<EventReceiver, StreamError> {
        self.next_sequence()
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventReceiver, StreamError> {
        self.submitted.lock().expect("submitted lock").push(SubmittedOutputs {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            outputs: outputs.to_vec(),
        });
        self.next_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripts_are_consumed_in_order() {
        let service = ScriptedRunService::new(vec![
            vec![ScriptItem::Event(RunEvent::TextCreated)],
            vec![ScriptItem::Event(RunEvent::Completed)],
        ]);
        let config = RunConfig {
            assistant_id: "asst".to_string(),
        };

        let mut first = service.stream_run("t", &config).await.unwrap();
        assert_eq!(first.recv().await.unwrap().unwrap(), RunEvent::TextCreated);

        let mut second = service.stream_run("t", &config).await.unwrap();
        assert_eq!(second.recv().await.unwrap().unwrap(), RunEvent::Completed);

        assert!(service.stream_run("t", &config).await.is_err());
    }

    #[tokio::test]
    async fn error_items_surface_as_stream_failures() {
        let service = ScriptedRunService::new(vec![vec![
            ScriptItem::Event(RunEvent::TextCreated),
            ScriptItem::Error("boom".to_string()),
        ]]);
        let config = RunConfig {
            assistant_id: "asst".to_string(),
        };

        let mut rx = service.stream_run("t", &config).await.unwrap();
        assert!(rx.recv().await.unwrap().is_ok());
        let err = rx.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::Stream(reason) if reason == "boom"));
    }

    #[tokio::test]
    async fn created_threads_are_retrievable() {
        let service = ScriptedRunService::new(vec![]);
        let created = service.create_thread().await.unwrap();
        let fetched = service.retrieve_thread(&created.id).await.unwrap();
        assert_eq!(created, fetched);
    }
}
