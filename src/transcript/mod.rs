//! Conversation transcript accumulation.
//!
//! The transcript is an append-only list of [`Message`]s. While a run is
//! streaming, only the tail message is ever mutated: deltas append to it,
//! annotations rewrite its accumulated text, and each `textCreated` /
//! code-interpreter `toolCallCreated` event starts a fresh tail. With that
//! tail-only discipline, a finished message's text is exactly the
//! concatenation of its deltas in arrival order.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::protocol::FileAnnotation;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Code-interpreter input, rendered as a separate turn so narration and
    /// code interleave as distinct messages.
    Code,
}

/// One ordered piece of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Segment {
    Text { value: String },
    Image { file_id: String },
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            segments: Vec::new(),
        }
    }

    pub fn with_text(role: Role, text: &str) -> Self {
        Self {
            role,
            segments: vec![Segment::Text {
                value: text.to_string(),
            }],
        }
    }

    /// All text content, in segment order. Image segments render as a
    /// markdown image reference, matching how the transcript is displayed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text { value } => out.push_str(value),
                Segment::Image { file_id } => {
                    out.push_str(&format!("\n![{file_id}](/api/files/{file_id})\n"));
                }
            }
        }
        out
    }
}

/// Accumulates streamed events into an ordered transcript.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    messages: Vec<Message>,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the transcript with previously persisted messages, oldest first.
    pub fn load(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the user's message before a run starts.
    pub fn push_user(&mut self, text: &str) {
        self.messages.push(Message::with_text(Role::User, text));
    }

    /// `textCreated`: a new empty assistant message becomes the tail.
    pub fn on_text_created(&mut self) {
        self.messages.push(Message::new(Role::Assistant));
    }

    /// `textDelta`: append the chunk to the tail's active text segment, then
    /// apply any annotations across the whole accumulated tail text. The
    /// annotated substring may have arrived split over earlier chunks, so
    /// replacement covers every occurrence, not just the newest delta.
    pub fn on_text_delta(&mut self, value: &str, annotations: &[FileAnnotation]) {
        let message = self.tail_for_delta(Role::Assistant);
        match message.segments.last_mut() {
            Some(Segment::Text { value: existing }) => existing.push_str(value),
            _ => message.segments.push(Segment::Text {
                value: value.to_string(),
            }),
        }

        if !annotations.is_empty() {
            Self::annotate(message, annotations);
        }
    }

    /// `imageFileDone`: append an image reference to the tail message.
    pub fn on_image_file_done(&mut self, file_id: &str) {
        let message = self.tail_for_delta(Role::Assistant);
        message.segments.push(Segment::Image {
            file_id: file_id.to_string(),
        });
    }

    /// Code-interpreter `toolCallCreated`: a new code message becomes the
    /// tail, keeping interpreter input out of the surrounding narration.
    pub fn on_tool_call_created(&mut self) {
        self.messages.push(Message::new(Role::Code));
    }

    /// Code-interpreter `toolCallDelta`: append interpreter input to the tail
    /// code message. Deltas without input carry nothing renderable.
    pub fn on_tool_call_delta(&mut self, code_input: &str) {
        let message = self.tail_for_delta(Role::Code);
        match message.segments.last_mut() {
            Some(Segment::Text { value: existing }) => existing.push_str(code_input),
            _ => message.segments.push(Segment::Text {
                value: code_input.to_string(),
            }),
        }
    }

    /// Replace each annotation's placeholder with its resolved file path,
    /// across every text segment of the tail message. Idempotent: the
    /// replacement contains no further occurrence of the placeholder.
    fn annotate(message: &mut Message, annotations: &[FileAnnotation]) {
        for annotation in annotations {
            let resolved = annotation.resolved_path();
            for segment in &mut message.segments {
                if let Segment::Text { value } = segment {
                    if value.contains(&annotation.match_text) {
                        *value = value.replace(&annotation.match_text, &resolved);
                    }
                }
            }
        }
    }

    /// The tail message a delta may mutate. A delta arriving with no open
    /// assistant/code tail means the stream skipped its `created` event;
    /// rather than corrupting the previous turn, open a fresh message.
    fn tail_for_delta(&mut self, role: Role) -> &mut Message {
        let needs_new = match self.messages.last() {
            Some(last) => last.role == Role::User,
            None => true,
        };
        if needs_new {
            warn!(?role, "Delta arrived before its created event; opening a new message");
            self.messages.push(Message::new(role));
        }
        self.messages.last_mut().expect("transcript has a tail")
    }
}
