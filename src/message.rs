
use std::collections::HashSet;

use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,           // System instruction
    User,             // User input
    Assistant,        // Model response, possibly requesting tools
    Tool,             // Tool execution result
}

/// One typed part of a multimodal user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Document {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Audio {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::Image { url: url.into(), mime_type: None }
    }

    pub fn document(url: impl Into<String>) -> Self {
        ContentPart::Document { url: url.into(), mime_type: None }
    }

    /// Text placeholder used when media is dropped from the prompt.
    pub fn placeholder(&self) -> &str {
        match self {
            ContentPart::Text { text } => text,
            ContentPart::Image { .. } => "[image]",
            ContentPart::Document { .. }
            | ContentPart::Audio { .. }
            | ContentPart::Video { .. } => "[file]",
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, ContentPart::Text { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text parts joined by newlines; media parts are skipped.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn has_media(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts.iter().any(ContentPart::is_media),
        }
    }

    /// Collapse to plain text, replacing media with `[image]` / `[file]`.
    pub fn degraded(&self) -> MessageContent {
        match self {
            MessageContent::Text(text) => MessageContent::Text(text.clone()),
            MessageContent::Parts(parts) => MessageContent::Text(
                parts
                    .iter()
                    .map(ContentPart::placeholder)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

/// A tool invocation requested by the model. `arguments` is the raw JSON text
/// exactly as the provider produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: MessageContent,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: MessageContent::Text(content.into()) }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Message::User { content: MessageContent::Parts(parts) }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant { content: content.into(), tool_calls: Vec::new() }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant { content: content.into(), tool_calls }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Message::System { .. } => MessageRole::System,
            Message::User { .. } => MessageRole::User,
            Message::Assistant { .. } => MessageRole::Assistant,
            Message::Tool { .. } => MessageRole::Tool,
        }
    }

    /// Flattened text view of the message.
    pub fn text(&self) -> String {
        match self {
            Message::System { content } => content.clone(),
            Message::User { content } => content.text(),
            Message::Assistant { content, .. } => content.clone(),
            Message::Tool { content, .. } => content.clone(),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Copy of this message with user media replaced by placeholders.
    /// Other roles are returned unchanged.
    pub fn degrade_media(&self) -> Message {
        match self {
            Message::User { content } if content.has_media() => {
                Message::User { content: content.degraded() }
            }
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("tool result at position {position} references unknown tool call id '{tool_call_id}'")]
    UncorrelatedToolResult { position: usize, tool_call_id: String },
}

/// Check that every tool result answers a tool call emitted earlier in the
/// same transcript.
pub fn validate_transcript(messages: &[Message]) -> Result<(), TranscriptError> {
    let mut emitted: HashSet<&str> = HashSet::new();
    for (position, message) in messages.iter().enumerate() {
        match message {
            Message::Assistant { tool_calls, .. } => {
                emitted.extend(tool_calls.iter().map(|call| call.id.as_str()));
            }
            Message::Tool { tool_call_id, .. } if !emitted.contains(tool_call_id.as_str()) => {
                return Err(TranscriptError::UncorrelatedToolResult {
                    position,
                    tool_call_id: tool_call_id.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrade_replaces_media_with_placeholders() {
        let msg = Message::user_parts(vec![
            ContentPart::text("what is in these?"),
            ContentPart::image("https://example.com/cat.png"),
            ContentPart::document("https://example.com/report.pdf"),
        ]);
        let degraded = msg.degrade_media();
        assert_eq!(
            degraded,
            Message::User {
                content: MessageContent::Text("what is in these?\n[image]\n[file]".into())
            }
        );
        // plain messages pass through untouched
        let plain = Message::assistant("ok");
        assert_eq!(plain.degrade_media(), plain);
    }

    #[test]
    fn text_view_skips_media() {
        let msg = Message::user_parts(vec![
            ContentPart::image("data:image/png;base64,AAAA"),
            ContentPart::text("describe"),
        ]);
        assert_eq!(msg.text(), "describe");
        assert_eq!(msg.role(), MessageRole::User);
    }

    #[test]
    fn serializes_with_role_tag() {
        let msg = Message::tool_result("call_1", "search", "found");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn transcript_validation_requires_prior_call() {
        let call = ToolCall { id: "a".into(), name: "search".into(), arguments: "{}".into() };
        let good = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![call]),
            Message::tool_result("a", "search", "r"),
        ];
        assert!(validate_transcript(&good).is_ok());

        let bad = vec![Message::user("q"), Message::tool_result("b", "search", "r")];
        assert_eq!(
            validate_transcript(&bad),
            Err(TranscriptError::UncorrelatedToolResult { position: 1, tool_call_id: "b".into() })
        );
    }
}
