pub mod traits;
pub mod openai;
pub mod anthropic;
pub mod ollama;
pub mod scripted;
pub mod dialect;
pub mod accumulator;
pub mod tokens;
pub mod error;


use serde::{Serialize, Deserialize};
use futures::stream::BoxStream;

use crate::message::Message;
use crate::tools::schema::ToolSchema;
use tokens::TokenUsage;

/// Result of a non-streaming generation from an LLM.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GenerateResult {
    pub tokens: TokenUsage,
    pub generation: String,
    /// Complete tool calls the LLM requested during this generation.
    #[serde(default)]
    pub tool_calls: Vec<CallInfo>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Structured information about a single tool call requested by the LLM.
/// `arguments` is the raw JSON text, not yet parsed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CallInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

/// How a provider identifies an in-progress tool call across chunks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallKey {
    Index(usize),
    Id(String),
}

/// Provider-neutral tool-call event carried by a stream chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallEvent {
    /// A new call begins. Providers may repeat the start for the same key.
    Start {
        key: CallKey,
        id: Option<String>,
        name: Option<String>,
    },
    /// A fragment of the JSON arguments text.
    Arguments { key: CallKey, fragment: String },
    /// The provider closed the call explicitly.
    End { key: CallKey },
}

/// One normalized chunk of a streamed model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallEvent>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn tool_start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::default().with_event(ToolCallEvent::Start {
            key: CallKey::Index(index),
            id: Some(id.into()),
            name: Some(name.into()),
        })
    }

    pub fn tool_arguments(index: usize, fragment: impl Into<String>) -> Self {
        Self::default().with_event(ToolCallEvent::Arguments {
            key: CallKey::Index(index),
            fragment: fragment.into(),
        })
    }

    pub fn tool_end(index: usize) -> Self {
        Self::default().with_event(ToolCallEvent::End { key: CallKey::Index(index) })
    }

    pub fn finished(reason: FinishReason, usage: Option<TokenUsage>) -> Self {
        Self { finish_reason: Some(reason), usage, ..Self::default() }
    }

    pub fn with_event(mut self, event: ToolCallEvent) -> Self {
        self.tool_calls.push(event);
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
            && self.tool_calls.is_empty()
            && self.usage.is_none()
            && self.finish_reason.is_none()
    }
}

/// Everything a model invocation needs for one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    /// Tools offered this round. Empty forces a direct answer.
    pub tools: Vec<ToolSchema>,
    pub stop: Vec<String>,
    pub stream: bool,
}

/// A model response: either one complete result or a chunk stream.
pub enum ModelResponse<'a> {
    Complete(GenerateResult),
    Stream(BoxStream<'a, LLMResult<StreamChunk>>),
}

impl std::fmt::Debug for ModelResponse<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelResponse::Complete(result) => f.debug_tuple("Complete").field(result).finish(),
            ModelResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Result type for LLM operations.
pub type LLMResult<T> = std::result::Result<T, error::LLMError>;
