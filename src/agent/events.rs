use futures::stream::BoxStream;
use serde::{Serialize, Deserialize};

use crate::llm::tokens::{TokenUsage, UsageReport};
use crate::message::Message;
use super::error::AgentError;

/// A tool result handed straight to the caller when the agent is limited to
/// a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectOutput {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
}

/// Observable progress of one agent run, in the order it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    RoundStart {
        round: usize,
        /// Number of tools offered to the model this round.
        tools_offered: usize,
    },
    /// Text produced by the model, forwarded as it arrives.
    Thought {
        round: usize,
        text: String,
    },
    ToolCallStart {
        round: usize,
        id: String,
        name: String,
        arguments: String,
    },
    ToolResult {
        round: usize,
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    RoundEnd {
        round: usize,
        tool_calls: usize,
        usage: TokenUsage,
        price: f64,
    },
    DirectOutput(DirectOutput),
    FinalAnswer {
        text: String,
    },
    /// Always the last event of a successful run.
    Finished {
        usage: UsageReport,
        transcript: Vec<Message>,
    },
}

/// Lazy event sequence of one run. Dropping it cancels the run.
pub type AgentEventStream<'a> = BoxStream<'a, Result<AgentEvent, AgentError>>;
