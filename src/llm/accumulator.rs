//! Reassembly of tool calls from model responses.
//!
//! Streamed providers deliver a tool call as a start marker followed by
//! arbitrary fragments of its JSON arguments, possibly interleaved with other
//! calls. [`ToolCallAccumulator`] folds normalized [`StreamChunk`]s into
//! complete calls; [`ToolCallAccumulator::from_complete`] gives a one-shot
//! result the same shape, so callers never care which transport was used.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::message::ToolCall;
use super::{CallKey, FinishReason, GenerateResult, StreamChunk, ToolCallEvent};
use super::tokens::TokenUsage;

/// Why the arguments of a sealed call could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("arguments for '{name}' are not valid JSON: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("arguments for '{name}' must be a JSON object, got {found}")]
    NotAnObject { name: String, found: &'static str },
}

/// A complete tool call, closed for mutation.
#[derive(Debug)]
pub struct SealedToolCall {
    pub id: String,
    pub name: String,
    pub raw_arguments: String,
    pub arguments: Result<Value, ArgumentError>,
}

impl SealedToolCall {
    fn seal(id: String, name: String, raw_arguments: String) -> Self {
        let arguments = parse_arguments(&name, &raw_arguments);
        Self { id, name, raw_arguments, arguments }
    }

    /// Transcript form of the call.
    pub fn to_tool_call(&self) -> ToolCall {
        let arguments = if self.raw_arguments.trim().is_empty() {
            "{}".to_string()
        } else {
            self.raw_arguments.clone()
        };
        ToolCall { id: self.id.clone(), name: self.name.clone(), arguments }
    }
}

fn parse_arguments(name: &str, raw: &str) -> Result<Value, ArgumentError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_json::from_str(raw).map_err(|source| ArgumentError::Malformed {
        name: name.to_string(),
        source,
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(ArgumentError::NotAnObject {
            name: name.to_string(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Everything one model turn produced.
#[derive(Debug, Default)]
pub struct AccumulatedResponse {
    pub text: String,
    pub calls: Vec<SealedToolCall>,
    pub usage: TokenUsage,
    pub finish_reason: Option<FinishReason>,
}

impl AccumulatedResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    ended: bool,
}

/// In-progress state for one streamed model turn.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    text: String,
    calls: Vec<PendingCall>,
    slots: HashMap<CallKey, usize>,
    usage: Option<TokenUsage>,
    finish_reason: Option<FinishReason>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in. Returns the chunk's text delta, if any, so the
    /// caller can forward it as soon as it arrives.
    pub fn ingest(&mut self, chunk: StreamChunk) -> Option<String> {
        for event in chunk.tool_calls {
            self.apply(event);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        match chunk.text {
            Some(text) if !text.is_empty() => {
                self.text.push_str(&text);
                Some(text)
            }
            _ => None,
        }
    }

    fn slot(&mut self, key: CallKey) -> &mut PendingCall {
        let position = match self.slots.get(&key) {
            Some(position) => *position,
            None => {
                self.calls.push(PendingCall::default());
                let position = self.calls.len() - 1;
                self.slots.insert(key, position);
                position
            }
        };
        &mut self.calls[position]
    }

    fn apply(&mut self, event: ToolCallEvent) {
        match event {
            ToolCallEvent::Start { key, id, name } => {
                let call = self.slot(key);
                if call.id.is_none() {
                    call.id = id.filter(|id| !id.is_empty());
                }
                if call.name.is_none() {
                    call.name = name.filter(|name| !name.is_empty());
                }
            }
            ToolCallEvent::Arguments { key, fragment } => {
                let call = self.slot(key);
                if call.ended {
                    warn!(name = ?call.name, "dropping argument fragment received after tool call end");
                    return;
                }
                call.arguments.push_str(&fragment);
            }
            ToolCallEvent::End { key } => match self.slots.get(&key) {
                Some(position) => self.calls[*position].ended = true,
                None => debug!(?key, "end marker for unknown tool call"),
            },
        }
    }

    /// Number of calls seen so far, sealed or not.
    pub fn pending(&self) -> usize {
        self.calls.len()
    }

    /// Seal every call and return the turn's result.
    ///
    /// Calls are kept in first-seen order. A call without an explicit end
    /// marker is still sealed; one that never received a name is dropped.
    pub fn finish(self) -> AccumulatedResponse {
        let mut calls = Vec::with_capacity(self.calls.len());
        for (position, pending) in self.calls.into_iter().enumerate() {
            let Some(name) = pending.name else {
                warn!(
                    id = ?pending.id,
                    arguments = %pending.arguments,
                    "discarding tool call without a name"
                );
                continue;
            };
            let id = pending.id.unwrap_or_else(|| format!("call_{position}"));
            calls.push(SealedToolCall::seal(id, name, pending.arguments));
        }
        AccumulatedResponse {
            text: self.text,
            calls,
            usage: self.usage.unwrap_or_default(),
            finish_reason: self.finish_reason,
        }
    }

    /// Shape a non-streaming result like a finished stream.
    pub fn from_complete(result: GenerateResult) -> AccumulatedResponse {
        let calls = result
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(position, call)| {
                let id = if call.id.is_empty() { format!("call_{position}") } else { call.id };
                SealedToolCall::seal(id, call.name, call.arguments)
            })
            .collect();
        AccumulatedResponse {
            text: result.generation,
            calls,
            usage: result.tokens,
            finish_reason: result.finish_reason,
        }
    }
}
