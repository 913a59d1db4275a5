//! Wire protocol for streaming assistant runs.
//!
//! A run produces an ordered stream of events. This module models each event
//! as one variant of [`RunEvent`] and decodes the `event:`/`data:` frames the
//! remote service emits. Event variants carry exactly the fields the engine
//! consumes; anything else on the wire is preserved as [`RunEvent::Other`]
//! so that new server-side event kinds are a forward-compatible no-op.

use serde::Deserialize;
use tracing::debug;

/// Per-frame event names the engine understands.
pub const EVENT_TEXT_CREATED: &str = "textCreated";
pub const EVENT_TEXT_DELTA: &str = "textDelta";
pub const EVENT_IMAGE_FILE_DONE: &str = "imageFileDone";
pub const EVENT_TOOL_CALL_CREATED: &str = "toolCallCreated";
pub const EVENT_TOOL_CALL_DELTA: &str = "toolCallDelta";
pub const EVENT_RUN_REQUIRES_ACTION: &str = "thread.run.requires_action";
pub const EVENT_RUN_COMPLETED: &str = "thread.run.completed";

/// One event from a streaming run, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A new assistant message has started.
    TextCreated,
    /// An incremental text fragment for the open message, optionally carrying
    /// file annotations to substitute into the accumulated text.
    TextDelta {
        value: String,
        annotations: Vec<FileAnnotation>,
    },
    /// An image produced by the run is ready.
    ImageFileDone { file_id: String },
    /// The run started a tool call. Only `code_interpreter` calls open a new
    /// transcript message; other kinds are resolved out-of-band via
    /// `requires_action`.
    ToolCallCreated { kind: ToolCallKind },
    /// Incremental tool-call content. Only code-interpreter input is
    /// renderable; deltas without input carry nothing for the transcript.
    ToolCallDelta {
        kind: ToolCallKind,
        code_input: Option<String>,
    },
    /// The run is paused until the client executes the carried tool calls
    /// and submits one output per call id.
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// The run finished.
    Completed,
    /// An event kind this client does not understand. Ignored by dispatch.
    Other { kind: String },
}

/// Tool call categories that appear inside a streaming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallKind {
    CodeInterpreter,
    Other,
}

impl ToolCallKind {
    fn from_wire(kind: &str) -> Self {
        match kind {
            "code_interpreter" => Self::CodeInterpreter,
            _ => Self::Other,
        }
    }
}

/// A citation placeholder in assistant text that must be replaced with a
/// resolvable file reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnnotation {
    /// The exact substring to replace, wherever it occurs in the message.
    pub match_text: String,
    pub file_path: FilePathRef,
}

/// Reference to a file produced by the run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePathRef {
    pub file_id: String,
}

impl FileAnnotation {
    /// The reference the placeholder resolves to once the file exists.
    pub fn resolved_path(&self) -> String {
        format!("/api/files/{}", self.file_path.file_id)
    }
}

/// A function invocation requested by the run under `requires_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    /// Raw JSON arguments as sent by the model. May be malformed; parsing is
    /// the coordinator's job so one bad call cannot poison its siblings.
    pub arguments: String,
}

/// One resolved tool call, paired 1:1 with a [`ToolCallRequest`] by id.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextDeltaWire {
    #[serde(default)]
    value: Option<String>,
    // Kept raw so an unusable annotation only drops itself, not the delta.
    #[serde(default)]
    annotations: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationWire {
    #[serde(rename = "type")]
    #[serde(default)]
    kind: Option<String>,
    match_text: String,
    file_path: FilePathRef,
}

/// Annotation kinds other than `file_path` carry nothing to substitute;
/// entries missing the fields needed for substitution are skipped too.
fn decode_annotations(raw: Vec<serde_json::Value>) -> Vec<FileAnnotation> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<AnnotationWire>(value) {
            Ok(wire) if wire.kind.as_deref().map_or(true, |kind| kind == "file_path") => {
                Some(FileAnnotation {
                    match_text: wire.match_text,
                    file_path: wire.file_path,
                })
            }
            Ok(wire) => {
                debug!(kind = ?wire.kind, "Skipping non-file annotation");
                None
            }
            Err(e) => {
                debug!(error = %e, "Skipping malformed annotation");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageFileDoneWire {
    file_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallCreatedWire {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallDeltaWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    code_interpreter: Option<CodeInterpreterWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeInterpreterWire {
    #[serde(default)]
    input: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequiresActionWire {
    data: RequiresActionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequiresActionData {
    id: String,
    required_action: RequiredActionWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequiredActionWire {
    tool_calls: Vec<ToolCallWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallWire {
    id: String,
    function: FunctionWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionWire {
    name: String,
    arguments: String,
}

impl RunEvent {
    /// Decode one wire frame into an event.
    ///
    /// Unknown event names decode to [`RunEvent::Other`]; only frames whose
    /// name is recognized but whose payload fails to parse are errors.
    pub fn decode(event: &str, data: &str) -> Result<Self, serde_json::Error> {
        match event {
            EVENT_TEXT_CREATED => Ok(Self::TextCreated),
            EVENT_TEXT_DELTA => {
                let wire: TextDeltaWire = serde_json::from_str(data)?;
                Ok(Self::TextDelta {
                    value: wire.value.unwrap_or_default(),
                    annotations: decode_annotations(wire.annotations),
                })
            }
            EVENT_IMAGE_FILE_DONE => {
                let wire: ImageFileDoneWire = serde_json::from_str(data)?;
                Ok(Self::ImageFileDone {
                    file_id: wire.file_id,
                })
            }
            EVENT_TOOL_CALL_CREATED => {
                let wire: ToolCallCreatedWire = serde_json::from_str(data)?;
                Ok(Self::ToolCallCreated {
                    kind: ToolCallKind::from_wire(&wire.kind),
                })
            }
            EVENT_TOOL_CALL_DELTA => {
                let wire: ToolCallDeltaWire = serde_json::from_str(data)?;
                Ok(Self::ToolCallDelta {
                    kind: ToolCallKind::from_wire(&wire.kind),
                    code_input: wire.code_interpreter.and_then(|ci| ci.input),
                })
            }
            EVENT_RUN_REQUIRES_ACTION => {
                let wire: RequiresActionWire = serde_json::from_str(data)?;
                Ok(Self::RequiresAction {
                    run_id: wire.data.id,
                    tool_calls: wire
                        .data
                        .required_action
                        .tool_calls
                        .into_iter()
                        .map(|tc| ToolCallRequest {
                            id: tc.id,
                            function_name: tc.function.name,
                            arguments: tc.function.arguments,
                        })
                        .collect(),
                })
            }
            EVENT_RUN_COMPLETED => Ok(Self::Completed),
            other => {
                debug!(event = other, "Unrecognized run event kind");
                Ok(Self::Other {
                    kind: other.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_text_created() {
        let event = RunEvent::decode(EVENT_TEXT_CREATED, "{}").unwrap();
        assert_eq!(event, RunEvent::TextCreated);
    }

    #[test]
    fn decode_text_delta_value_only() {
        let event = RunEvent::decode(EVENT_TEXT_DELTA, r#"{"value":"Added milk."}"#).unwrap();
        assert_eq!(
            event,
            RunEvent::TextDelta {
                value: "Added milk.".to_string(),
                annotations: vec![],
            }
        );
    }

    #[test]
    fn decode_text_delta_with_annotations() {
        let data = r#"{
            "value": " download it",
            "annotations": [
                {"matchText": "sandbox:/recipes.md", "filePath": {"fileId": "file-abc"}}
            ]
        }"#;
        let event = RunEvent::decode(EVENT_TEXT_DELTA, data).unwrap();
        match event {
            RunEvent::TextDelta { value, annotations } => {
                assert_eq!(value, " download it");
                assert_eq!(annotations.len(), 1);
                assert_eq!(annotations[0].match_text, "sandbox:/recipes.md");
                assert_eq!(annotations[0].resolved_path(), "/api/files/file-abc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decode_text_delta_skips_unusable_annotations() {
        let data = r#"{
            "value": "see recipes.md",
            "annotations": [
                {"matchText": "orphan"},
                {"type": "file_citation", "matchText": "cited", "filePath": {"fileId": "file-x"}},
                "garbage",
                {"type": "file_path", "matchText": "recipes.md", "filePath": {"fileId": "file-abc"}}
            ]
        }"#;
        let event = RunEvent::decode(EVENT_TEXT_DELTA, data).unwrap();
        match event {
            RunEvent::TextDelta { value, annotations } => {
                assert_eq!(value, "see recipes.md");
                assert_eq!(annotations.len(), 1);
                assert_eq!(annotations[0].match_text, "recipes.md");
                assert_eq!(annotations[0].resolved_path(), "/api/files/file-abc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decode_text_delta_null_value_is_empty() {
        let event = RunEvent::decode(EVENT_TEXT_DELTA, r#"{"value":null}"#).unwrap();
        assert_eq!(
            event,
            RunEvent::TextDelta {
                value: String::new(),
                annotations: vec![],
            }
        );
    }

    #[test]
    fn decode_image_file_done() {
        let event = RunEvent::decode(EVENT_IMAGE_FILE_DONE, r#"{"fileId":"file-9"}"#).unwrap();
        assert_eq!(
            event,
            RunEvent::ImageFileDone {
                file_id: "file-9".to_string(),
            }
        );
    }

    #[test]
    fn decode_tool_call_created_code_interpreter() {
        let event =
            RunEvent::decode(EVENT_TOOL_CALL_CREATED, r#"{"type":"code_interpreter"}"#).unwrap();
        assert_eq!(
            event,
            RunEvent::ToolCallCreated {
                kind: ToolCallKind::CodeInterpreter,
            }
        );
    }

    #[test]
    fn decode_tool_call_created_function_is_other_kind() {
        let event = RunEvent::decode(EVENT_TOOL_CALL_CREATED, r#"{"type":"function"}"#).unwrap();
        assert_eq!(
            event,
            RunEvent::ToolCallCreated {
                kind: ToolCallKind::Other,
            }
        );
    }

    #[test]
    fn decode_tool_call_delta_with_input() {
        let data = r#"{"type":"code_interpreter","codeInterpreter":{"input":"print(1)"}}"#;
        let event = RunEvent::decode(EVENT_TOOL_CALL_DELTA, data).unwrap();
        assert_eq!(
            event,
            RunEvent::ToolCallDelta {
                kind: ToolCallKind::CodeInterpreter,
                code_input: Some("print(1)".to_string()),
            }
        );
    }

    #[test]
    fn decode_tool_call_delta_without_input() {
        let data = r#"{"type":"code_interpreter","codeInterpreter":{}}"#;
        let event = RunEvent::decode(EVENT_TOOL_CALL_DELTA, data).unwrap();
        assert_eq!(
            event,
            RunEvent::ToolCallDelta {
                kind: ToolCallKind::CodeInterpreter,
                code_input: None,
            }
        );
    }

    #[test]
    fn decode_requires_action() {
        let data = r#"{
            "data": {
                "id": "run_1",
                "requiredAction": {
                    "toolCalls": [
                        {"id": "c1", "function": {"name": "create_recipe", "arguments": "{\"prompt\":\"pancakes\"}"}}
                    ]
                }
            }
        }"#;
        let event = RunEvent::decode(EVENT_RUN_REQUIRES_ACTION, data).unwrap();
        match event {
            RunEvent::RequiresAction { run_id, tool_calls } => {
                assert_eq!(run_id, "run_1");
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "c1");
                assert_eq!(tool_calls[0].function_name, "create_recipe");
                assert_eq!(tool_calls[0].arguments, "{\"prompt\":\"pancakes\"}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decode_completed() {
        let event = RunEvent::decode(EVENT_RUN_COMPLETED, "{}").unwrap();
        assert_eq!(event, RunEvent::Completed);
    }

    #[test]
    fn decode_unknown_event_is_other() {
        let event = RunEvent::decode("thread.run.step.created", r#"{"data":{}}"#).unwrap();
        assert_eq!(
            event,
            RunEvent::Other {
                kind: "thread.run.step.created".to_string(),
            }
        );
    }

    #[test]
    fn decode_known_event_with_bad_payload_is_error() {
        assert!(RunEvent::decode(EVENT_IMAGE_FILE_DONE, "not json").is_err());
        assert!(RunEvent::decode(EVENT_RUN_REQUIRES_ACTION, "{}").is_err());
    }

    #[test]
    fn tool_output_serializes_camel_case() {
        let output = ToolOutput {
            tool_call_id: "c1".to_string(),
            output: "recipe-42".to_string(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"toolCallId": "c1", "output": "recipe-42"})
        );
    }
}
