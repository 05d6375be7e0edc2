//! Gemini `streamGenerateContent` chunks. Function calls arrive whole inside
//! `candidates[].content.parts[]` and usually carry no id.

use serde::Deserialize;
use serde_json::Value;

use crate::llm::{CallKey, FinishReason, LLMResult, StreamChunk, ToolCallEvent};
use crate::llm::tokens::TokenUsage;
use super::{ChunkDialect, finish_reason_from_str};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: u32,
    pub candidates_token_count: u32,
    pub thoughts_token_count: u32,
}

/// Numbers calls across the whole response so synthesized ids stay unique.
#[derive(Debug, Default)]
pub struct GeminiDialect {
    calls: usize,
}

impl ChunkDialect for GeminiDialect {
    type Native = GeminiChunk;

    fn normalize(&mut self, native: GeminiChunk) -> LLMResult<StreamChunk> {
        let mut chunk = StreamChunk::default();

        for candidate in native.candidates {
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for part in parts {
                if let Some(call) = part.function_call {
                    self.push_call(&mut chunk, call);
                } else if let Some(text) = part.text.filter(|t| !t.is_empty() && !part.thought) {
                    chunk.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            if let Some(reason) = candidate.finish_reason {
                // Gemini reports STOP even when the turn ends in function calls.
                chunk.finish_reason = Some(match finish_reason_from_str(&reason) {
                    FinishReason::Stop if self.calls > 0 => FinishReason::ToolCalls,
                    other => other,
                });
            }
        }

        chunk.usage = native.usage_metadata.map(|usage| {
            TokenUsage::new(
                usage.prompt_token_count,
                usage.candidates_token_count + usage.thoughts_token_count,
            )
        });
        Ok(chunk)
    }
}

impl GeminiDialect {
    fn push_call(&mut self, chunk: &mut StreamChunk, call: FunctionCall) {
        let index = self.calls;
        self.calls += 1;
        let key = CallKey::Index(index);
        let id = call.id.unwrap_or_else(|| format!("call_{index}"));
        chunk.tool_calls.push(ToolCallEvent::Start {
            key: key.clone(),
            id: Some(id),
            name: Some(call.name),
        });
        if !call.args.is_null() {
            chunk.tool_calls.push(ToolCallEvent::Arguments {
                key: key.clone(),
                fragment: call.args.to_string(),
            });
        }
        chunk.tool_calls.push(ToolCallEvent::End { key });
    }
}
