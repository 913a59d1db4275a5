//! Event dispatch for a streaming run.
//!
//! One event goes in, exactly one handler runs, and the caller gets back a
//! control-flow outcome. Dispatch is synchronous: the session does not pull
//! the next event until the current one's transcript mutation is done, which
//! is what keeps message updates totally ordered.

use tracing::debug;

use crate::protocol::{RunEvent, ToolCallKind, ToolCallRequest};
use crate::transcript::MessageAccumulator;

/// What the session should do after an event has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Keep pulling events.
    Continue,
    /// The run is paused on tool calls; execute them and resume with one
    /// output per call id.
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// The run finished.
    Completed,
}

/// Apply one run event to the transcript and report the resulting
/// control-flow outcome.
///
/// Unrecognized event kinds are a deliberate no-op so newer servers can add
/// event types without breaking older clients.
pub fn dispatch_event(event: RunEvent, transcript: &mut MessageAccumulator) -> DispatchOutcome {
    match event {
        RunEvent::TextCreated => {
            transcript.on_text_created();
            DispatchOutcome::Continue
        }
        RunEvent::TextDelta { value, annotations } => {
            transcript.on_text_delta(&value, &annotations);
            DispatchOutcome::Continue
        }
        RunEvent::ImageFileDone { file_id } => {
            transcript.on_image_file_done(&file_id);
            DispatchOutcome::Continue
        }
        RunEvent::ToolCallCreated { kind } => {
            // Only code-interpreter calls render as transcript turns;
            // function calls surface later under requires_action.
            if kind == ToolCallKind::CodeInterpreter {
                transcript.on_tool_call_created();
            }
            DispatchOutcome::Continue
        }
        RunEvent::ToolCallDelta { kind, code_input } => {
            if kind == ToolCallKind::CodeInterpreter {
                if let Some(input) = code_input {
                    transcript.on_tool_call_delta(&input);
                }
            }
            DispatchOutcome::Continue
        }
        RunEvent::RequiresAction { run_id, tool_calls } => {
            debug!(run_id = %run_id, calls = tool_calls.len(), "Run requires action");
            DispatchOutcome::RequiresAction { run_id, tool_calls }
        }
        RunEvent::Completed => DispatchOutcome::Completed,
        RunEvent::Other { kind } => {
            debug!(kind = %kind, "Ignoring unrecognized run event");
            DispatchOutcome::Continue
        }
    }
}
