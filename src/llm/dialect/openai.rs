//! OpenAI-compatible chat completion chunks (`choices[].delta.tool_calls[]`).
//! Also covers providers that expose an OpenAI-compatible endpoint.

use async_openai::types::{
    CompletionUsage, CreateChatCompletionStreamResponse, FinishReason as OpenAIFinishReason,
};

use crate::llm::{CallKey, FinishReason, LLMResult, StreamChunk, ToolCallEvent};
use crate::llm::tokens::TokenUsage;
use super::ChunkDialect;

/// Tool calls are keyed by their `index`; `id` and `name` arrive on the first
/// delta of a call, later deltas carry only argument text.
#[derive(Debug, Default)]
pub struct OpenAIDialect;

impl ChunkDialect for OpenAIDialect {
    type Native = CreateChatCompletionStreamResponse;

    fn normalize(&mut self, native: CreateChatCompletionStreamResponse) -> LLMResult<StreamChunk> {
        let mut chunk = StreamChunk::default();

        for choice in native.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                chunk.text.get_or_insert_with(String::new).push_str(&content);
            }

            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let key = CallKey::Index(delta.index as usize);
                let (name, arguments) = match delta.function {
                    Some(function) => (function.name, function.arguments),
                    None => (None, None),
                };
                if delta.id.is_some() || name.is_some() {
                    chunk.tool_calls.push(ToolCallEvent::Start {
                        key: key.clone(),
                        id: delta.id,
                        name,
                    });
                }
                if let Some(fragment) = arguments.filter(|a| !a.is_empty()) {
                    chunk.tool_calls.push(ToolCallEvent::Arguments { key, fragment });
                }
            }

            if let Some(reason) = choice.finish_reason {
                chunk.finish_reason = Some(finish_reason(reason));
            }
        }

        chunk.usage = native.usage.as_ref().map(usage_from);
        Ok(chunk)
    }
}

pub(crate) fn finish_reason(reason: OpenAIFinishReason) -> FinishReason {
    match reason {
        OpenAIFinishReason::Stop => FinishReason::Stop,
        OpenAIFinishReason::Length => FinishReason::Length,
        OpenAIFinishReason::ToolCalls | OpenAIFinishReason::FunctionCall => FinishReason::ToolCalls,
        OpenAIFinishReason::ContentFilter => FinishReason::ContentFilter,
    }
}

pub(crate) fn usage_from(usage: &CompletionUsage) -> TokenUsage {
    TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
}
