//! Anthropic Messages API stream events.
//!
//! Tool calls are `tool_use` content blocks keyed by block index; their input
//! arrives as `input_json_delta` fragments and `content_block_stop` closes
//! them. Input and cache token counts come with `message_start`, the output
//! count with `message_delta`.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::llm::{CallKey, LLMResult, StreamChunk, ToolCallEvent};
use crate::llm::error::LLMError;
use crate::llm::tokens::TokenUsage;
use super::{ChunkDialect, finish_reason_from_str};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDelta,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageStart {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_creation_input_tokens: Option<u32>,
    pub cache_read_input_tokens: Option<u32>,
}

impl From<AnthropicUsage> for TokenUsage {
    fn from(usage: AnthropicUsage) -> Self {
        TokenUsage::new(usage.input_tokens, usage.output_tokens).with_cache(
            usage.cache_creation_input_tokens.unwrap_or(0),
            usage.cache_read_input_tokens.unwrap_or(0),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

/// Remembers the prompt-side usage from `message_start` and which block
/// indices are tool calls.
#[derive(Debug, Default)]
pub struct AnthropicDialect {
    usage: AnthropicUsage,
    tool_blocks: HashSet<usize>,
}

impl ChunkDialect for AnthropicDialect {
    type Native = AnthropicEvent;

    fn normalize(&mut self, native: AnthropicEvent) -> LLMResult<StreamChunk> {
        let mut chunk = StreamChunk::default();
        match native {
            AnthropicEvent::MessageStart { message } => {
                self.usage = message.usage;
            }
            AnthropicEvent::ContentBlockStart { index, content_block } => match content_block {
                ContentBlock::Text { text } if !text.is_empty() => chunk.text = Some(text),
                ContentBlock::ToolUse { id, name, input } => {
                    self.tool_blocks.insert(index);
                    let key = CallKey::Index(index);
                    chunk.tool_calls.push(ToolCallEvent::Start {
                        key: key.clone(),
                        id: Some(id),
                        name: Some(name),
                    });
                    // Streams open with `{}` and send the input as deltas.
                    if input.as_object().is_some_and(|o| !o.is_empty()) {
                        chunk.tool_calls.push(ToolCallEvent::Arguments {
                            key,
                            fragment: input.to_string(),
                        });
                    }
                }
                _ => {}
            },
            AnthropicEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => chunk.text = Some(text),
                BlockDelta::InputJsonDelta { partial_json } => {
                    chunk.tool_calls.push(ToolCallEvent::Arguments {
                        key: CallKey::Index(index),
                        fragment: partial_json,
                    });
                }
                BlockDelta::Other => {}
            },
            AnthropicEvent::ContentBlockStop { index } => {
                if self.tool_blocks.contains(&index) {
                    chunk.tool_calls.push(ToolCallEvent::End { key: CallKey::Index(index) });
                }
            }
            AnthropicEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.merge_usage(usage);
                }
                chunk.usage = Some(self.usage.into());
                chunk.finish_reason = delta.stop_reason.as_deref().map(finish_reason_from_str);
            }
            AnthropicEvent::Error { error } => {
                return Err(LLMError::StreamError(format!("{}: {}", error.error_type, error.message)));
            }
            AnthropicEvent::MessageStop | AnthropicEvent::Ping | AnthropicEvent::Unknown => {}
        }
        Ok(chunk)
    }
}

impl AnthropicDialect {
    /// `message_delta` usage is cumulative; output tokens always come from it
    /// and input-side counters only when the delta repeats them.
    fn merge_usage(&mut self, delta: AnthropicUsage) {
        self.usage.output_tokens = delta.output_tokens;
        if delta.input_tokens > 0 {
            self.usage.input_tokens = delta.input_tokens;
        }
        if delta.cache_creation_input_tokens.is_some() {
            self.usage.cache_creation_input_tokens = delta.cache_creation_input_tokens;
        }
        if delta.cache_read_input_tokens.is_some() {
            self.usage.cache_read_input_tokens = delta.cache_read_input_tokens;
        }
    }
}

/// Parse one SSE line. Returns `None` for non-data lines and keep-alives.
pub fn parse_sse_line(line: &str) -> LLMResult<Option<AnthropicEvent>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FinishReason;
    use crate::llm::accumulator::ToolCallAccumulator;
    use serde_json::json;

    const STREAM: &str = r#"event: message_start
data: {"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":100,"output_tokens":1,"cache_creation_input_tokens":40,"cache_read_input_tokens":0}}}

event: content_block_start
data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}

data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Checking"}}

data: {"type":"content_block_stop","index":0}

data: {"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"calc","input":{}}}

data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"a\":"}}

data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"1"}}

data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"}"}}

data: {"type":"content_block_stop","index":1}

event: ping
data: {"type":"ping"}

data: {"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":25}}

data: {"type":"message_stop"}
"#;

    #[test]
    fn full_stream_reassembles_tool_use() {
        let mut dialect = AnthropicDialect::default();
        let mut acc = ToolCallAccumulator::new();
        for line in STREAM.lines() {
            if let Some(event) = parse_sse_line(line).unwrap() {
                acc.ingest(dialect.normalize(event).unwrap());
            }
        }
        let result = acc.finish();

        assert_eq!(result.text, "Checking");
        assert_eq!(result.calls.len(), 1);
        assert_eq!(result.calls[0].id, "toolu_1");
        assert_eq!(result.calls[0].arguments.as_ref().unwrap(), &json!({"a": 1}));
        assert_eq!(result.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(result.usage, TokenUsage::new(100, 25).with_cache(40, 0));
    }

    #[test]
    fn text_block_stop_emits_no_end_event() {
        let mut dialect = AnthropicDialect::default();
        let chunk = dialect.normalize(AnthropicEvent::ContentBlockStop { index: 0 }).unwrap();
        assert!(chunk.is_empty());
    }

    #[test]
    fn error_event_fails_the_stream() {
        let event = parse_sse_line(
            r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap()
        .unwrap();
        let err = AnthropicDialect::default().normalize(event).unwrap_err();
        assert!(err.to_string().contains("overloaded_error"));
    }

    #[test]
    fn unknown_events_and_non_data_lines_are_ignored() {
        assert!(parse_sse_line("event: message_start").unwrap().is_none());
        assert!(parse_sse_line("").unwrap().is_none());
        let event = parse_sse_line(r#"data: {"type":"brand_new_event"}"#).unwrap().unwrap();
        assert!(matches!(event, AnthropicEvent::Unknown));
    }
}
