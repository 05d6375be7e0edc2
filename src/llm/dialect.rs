//! Provider chunk dialects.
//!
//! Every provider streams tool calls with its own field names. A dialect turns
//! one native chunk into a provider-neutral [`StreamChunk`], so there is a
//! single accumulation state machine in [`super::accumulator`].

pub mod openai;
pub mod anthropic;
pub mod gemini;

use futures::{Stream, StreamExt, stream::BoxStream};

use super::{FinishReason, LLMResult, StreamChunk};

pub use openai::OpenAIDialect;
pub use anthropic::AnthropicDialect;
pub use gemini::GeminiDialect;

/// Normalizes the native chunks of one model response. Dialects may keep
/// state across chunks of the same response; use a fresh value per response.
pub trait ChunkDialect: Send {
    type Native;

    fn normalize(&mut self, native: Self::Native) -> LLMResult<StreamChunk>;
}

/// Map a native chunk stream through a dialect.
pub fn normalize_stream<'a, D, S>(mut dialect: D, native: S) -> BoxStream<'a, LLMResult<StreamChunk>>
where
    D: ChunkDialect + 'a,
    S: Stream<Item = LLMResult<D::Native>> + Send + 'a,
{
    native
        .map(move |item| item.and_then(|chunk| dialect.normalize(chunk)))
        .boxed()
}

/// Finish reason strings shared by several providers.
pub(crate) fn finish_reason_from_str(reason: &str) -> FinishReason {
    match reason {
        "stop" | "end_turn" | "stop_sequence" | "STOP" => FinishReason::Stop,
        "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
        "length" | "max_tokens" | "MAX_TOKENS" => FinishReason::Length,
        "content_filter" | "SAFETY" | "RECITATION" | "refusal" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}
