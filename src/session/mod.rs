//! Thread sessions and the run lifecycle state machine.
//!
//! A [`ThreadSession`] owns one selected thread, its transcript, and the
//! single [`RunLifecycle`] value for that thread. `send_message` drives a
//! whole round trip: open the stream, apply events in arrival order, run
//! any requested tool batch, resume, and repeat until the run completes.
//! While a run is anywhere between `Streaming` and `SubmittingOutputs`,
//! new messages are rejected with [`SessionError::RunInProgress`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::{dispatch_event, DispatchOutcome};
use crate::runs::{EventSequence, RunConfig, RunStreamClient, RunService, StreamError};
use crate::tools::ToolCallCoordinator;
use crate::transcript::MessageAccumulator;

/// Where the session's current (or last) run stands.
///
/// Exactly one lifecycle value exists per session; transitions happen only
/// inside `send_message`, which is the single writer for both the
/// lifecycle and the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunLifecycle {
    /// No run active; input is open.
    #[default]
    Idle,
    /// Consuming a live event sequence.
    Streaming,
    /// Executing a requires-action tool batch; input is disabled.
    RequiresAction,
    /// Posting the tool output batch back to the run.
    SubmittingOutputs,
    /// The run finished; equivalent to `Idle` for accepting input.
    Completed,
    /// The run died. The session stays here until the next message or
    /// thread switch; like `Idle`, input is open so the user can retry.
    Failed,
}

impl RunLifecycle {
    /// Whether a new `send_message` may start.
    pub fn accepts_input(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Failed)
    }
}

/// Session-level errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a run is already in progress")]
    RunInProgress,

    #[error("no thread selected")]
    UndefinedThread,

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// One conversation: a thread id, its transcript, and its run lifecycle.
pub struct ThreadSession {
    service: Arc<dyn RunService>,
    client: RunStreamClient,
    coordinator: ToolCallCoordinator,
    config: RunConfig,
    thread_id: Option<String>,
    lifecycle: RunLifecycle,
    transcript: MessageAccumulator,
}

impl ThreadSession {
    pub fn new(
        service: Arc<dyn RunService>,
        coordinator: ToolCallCoordinator,
        config: RunConfig,
    ) -> Self {
        Self {
            client: RunStreamClient::new(service.clone()),
            service,
            coordinator,
            config,
            thread_id: None,
            lifecycle: RunLifecycle::Idle,
            transcript: MessageAccumulator::new(),
        }
    }

    pub fn lifecycle(&self) -> RunLifecycle {
        self.lifecycle
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn transcript(&self) -> &MessageAccumulator {
        &self.transcript
    }

    /// Select the thread this session talks to and load its persisted
    /// messages into the transcript.
    pub async fn select_thread(&mut self, thread_id: &str) -> Result<(), SessionError> {
        if !self.lifecycle.accepts_input() {
            return Err(SessionError::RunInProgress);
        }
        let messages = self.service.list_messages(thread_id).await?;
        debug!(thread_id, messages = messages.len(), "Selected thread");
        self.thread_id = Some(thread_id.to_string());
        self.transcript.load(messages);
        self.lifecycle = RunLifecycle::Idle;
        Ok(())
    }

    /// Send a user message and drive the resulting run to completion.
    ///
    /// Note: the protocol models no cancellation or timeout. A remote run
    /// that stalls without ever completing keeps the session out of `Idle`
    /// and input disabled for as long as it stalls.
    pub async fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        if !self.lifecycle.accepts_input() {
            warn!(lifecycle = ?self.lifecycle, "Rejecting message while a run is active");
            return Err(SessionError::RunInProgress);
        }
        let thread_id = self
            .thread_id
            .clone()
            .ok_or(SessionError::UndefinedThread)?;

        self.transcript.push_user(text);
        self.lifecycle = RunLifecycle::Streaming;
        info!(thread_id = %thread_id, "Starting run");

        let sequence = match self.client.open(&thread_id, text, &self.config).await {
            Ok(sequence) => sequence,
            Err(e) => return Err(self.fail(e)),
        };

        match self.drive(&thread_id, sequence).await {
            Ok(()) => {
                self.lifecycle = RunLifecycle::Idle;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Consume event sequences until the run completes, resuming across
    /// requires-action pauses.
    async fn drive(
        &mut self,
        thread_id: &str,
        mut sequence: EventSequence,
    ) -> Result<(), StreamError> {
        loop {
            let mut pending_action: Option<(String, Vec<crate::protocol::ToolCallRequest>)> = None;

            while let Some(event) = sequence.next().await {
                match dispatch_event(event?, &mut self.transcript) {
                    DispatchOutcome::Continue => {}
                    DispatchOutcome::RequiresAction { run_id, tool_calls } => {
                        pending_action = Some((run_id, tool_calls));
                        break;
                    }
                    DispatchOutcome::Completed => {
                        self.lifecycle = RunLifecycle::Completed;
                    }
                }
            }

            let Some((run_id, tool_calls)) = pending_action else {
                return match self.lifecycle {
                    RunLifecycle::Completed => {
                        info!(thread_id, "Run completed");
                        Ok(())
                    }
                    _ => Err(StreamError::Stream(
                        "run stream ended before completion".to_string(),
                    )),
                };
            };

            // The paused stream is spent; drop it before resuming so the
            // thread's stream slot is free for the continuation.
            drop(sequence);

            self.lifecycle = RunLifecycle::RequiresAction;
            info!(thread_id, run_id = %run_id, calls = tool_calls.len(), "Run requires action");
            let outputs = self.coordinator.execute_batch(&tool_calls).await;

            self.lifecycle = RunLifecycle::SubmittingOutputs;
            sequence = self.client.resume(thread_id, &run_id, &outputs).await?;
            self.lifecycle = RunLifecycle::Streaming;
        }
    }

    /// Record a failed run: surface the error, rest in `Failed`.
    fn fail(&mut self, error: StreamError) -> SessionError {
        error!(error = %error, "Run failed");
        self.lifecycle = RunLifecycle::Failed;
        SessionError::Stream(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RunEvent;
    use crate::runs::{ScriptItem, ScriptedRunService};
    use crate::tools::ToolRegistry;

    fn session_with(scripts: Vec<Vec<ScriptItem>>) -> (ThreadSession, Arc<ScriptedRunService>) {
        let service = Arc::new(ScriptedRunService::new(scripts));
        let session = ThreadSession::new(
            service.clone(),
            ToolCallCoordinator::new(Arc::new(ToolRegistry::new())),
            RunConfig {
                assistant_id: "asst_test".to_string(),
            },
        );
        (session, service)
    }

    fn text_events(text: &str) -> Vec<ScriptItem> {
        vec![
            ScriptItem::Event(RunEvent::TextCreated),
            ScriptItem::Event(RunEvent::TextDelta {
                value: text.to_string(),
                annotations: vec![],
            }),
            ScriptItem::Event(RunEvent::Completed),
        ]
    }

    #[tokio::test]
    async fn send_message_without_thread_is_undefined_thread() {
        let (mut session, _service) = session_with(vec![]);
        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::UndefinedThread));
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn send_message_appends_user_and_assistant_turns() {
        let (mut session, service) = session_with(vec![text_events("Added milk.")]);
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();

        session.send_message("add milk to my list").await.unwrap();

        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text(), "add milk to my list");
        assert_eq!(messages[1].text(), "Added milk.");
        assert_eq!(session.lifecycle(), RunLifecycle::Idle);
        assert_eq!(
            service.user_messages(),
            vec![(thread.id.clone(), "add milk to my list".to_string())]
        );
    }

    #[tokio::test]
    async fn lifecycle_guard_rejects_message_mid_run() {
        let (mut session, service) = session_with(vec![]);
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();
        let before = session.transcript().len();

        for state in [
            RunLifecycle::Streaming,
            RunLifecycle::RequiresAction,
            RunLifecycle::SubmittingOutputs,
        ] {
            session.lifecycle = state;
            let err = session.send_message("too soon").await.unwrap_err();
            assert!(matches!(err, SessionError::RunInProgress));
            // The rejected message neither touches the transcript nor
            // opens a stream.
            assert_eq!(session.transcript().len(), before);
            assert!(service.user_messages().is_empty());
        }
    }

    #[tokio::test]
    async fn completed_state_accepts_new_message() {
        let (mut session, service) = session_with(vec![text_events("ok")]);
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();
        session.lifecycle = RunLifecycle::Completed;

        session.send_message("again").await.unwrap();
        assert_eq!(session.lifecycle(), RunLifecycle::Idle);
    }

    #[tokio::test]
    async fn stream_error_rests_in_failed_and_accepts_retry() {
        let (mut session, service) = session_with(vec![
            vec![
                ScriptItem::Event(RunEvent::TextCreated),
                ScriptItem::Error("connection reset".to_string()),
            ],
            text_events("second time lucky"),
        ]);
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Stream(StreamError::Stream(_))));
        // The failure is visible until the next attempt.
        assert_eq!(session.lifecycle(), RunLifecycle::Failed);

        session.send_message("retry").await.unwrap();
        assert_eq!(session.lifecycle(), RunLifecycle::Idle);
    }

    #[tokio::test]
    async fn stream_ending_without_completed_is_a_failure() {
        let (mut session, service) = session_with(vec![vec![
            ScriptItem::Event(RunEvent::TextCreated),
            ScriptItem::Event(RunEvent::TextDelta {
                value: "half a rep".to_string(),
                annotations: vec![],
            }),
        ]]);
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Stream(StreamError::Stream(_))));
        assert_eq!(session.lifecycle(), RunLifecycle::Failed);
    }

    // ============================================================
    // Requires-action round trip
    // ============================================================

    struct RecipeStub;

    #[async_trait::async_trait]
    impl crate::tools::KitchenTool for RecipeStub {
        fn name(&self) -> &'static str {
            "create_recipe"
        }
        async fn call(&self, args: serde_json::Value) -> Result<String, crate::tools::ToolError> {
            assert_eq!(args["prompt"], "pancakes");
            Ok("recipe-42".to_string())
        }
    }

    #[tokio::test]
    async fn requires_action_runs_tools_and_resumes() {
        let service = Arc::new(ScriptedRunService::new(vec![
            vec![
                ScriptItem::Event(RunEvent::TextCreated),
                ScriptItem::Event(RunEvent::TextDelta {
                    value: "Let me save that.".to_string(),
                    annotations: vec![],
                }),
                ScriptItem::Event(RunEvent::RequiresAction {
                    run_id: "run_1".to_string(),
                    tool_calls: vec![crate::protocol::ToolCallRequest {
                        id: "c1".to_string(),
                        function_name: "create_recipe".to_string(),
                        arguments: r#"{"prompt": "pancakes"}"#.to_string(),
                    }],
                }),
            ],
            vec![
                ScriptItem::Event(RunEvent::TextCreated),
                ScriptItem::Event(RunEvent::TextDelta {
                    value: "Saved your pancake recipe.".to_string(),
                    annotations: vec![],
                }),
                ScriptItem::Event(RunEvent::Completed),
            ],
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(RecipeStub));
        let mut session = ThreadSession::new(
            service.clone(),
            ToolCallCoordinator::new(Arc::new(registry)),
            RunConfig {
                assistant_id: "asst_test".to_string(),
            },
        );
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();

        session.send_message("save a pancake recipe").await.unwrap();

        // The complete output batch went back to the paused run.
        let submitted = service.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].thread_id, thread.id);
        assert_eq!(submitted[0].run_id, "run_1");
        assert_eq!(
            submitted[0].outputs,
            vec![crate::protocol::ToolOutput {
                tool_call_id: "c1".to_string(),
                output: "recipe-42".to_string(),
            }]
        );

        // Both assistant turns landed, in order, around the pause.
        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text(), "Let me save that.");
        assert_eq!(messages[2].text(), "Saved your pancake recipe.");
        assert_eq!(session.lifecycle(), RunLifecycle::Idle);
    }

    #[tokio::test]
    async fn select_thread_loads_and_resets() {
        let (mut session, service) = session_with(vec![]);
        let thread = service.create_thread().await.unwrap();
        session.select_thread(&thread.id).await.unwrap();
        assert_eq!(session.thread_id(), Some(thread.id.as_str()));
        assert_eq!(session.lifecycle(), RunLifecycle::Idle);
        assert!(session.transcript().is_empty());
    }
}
