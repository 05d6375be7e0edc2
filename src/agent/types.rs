use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::config::AgentConfig;
use crate::llm::traits::LLM;
use crate::llm::tokens::UsageReport;
use crate::message::{Message, MessageContent};
use crate::tools::registry::ToolSet;
use super::error::AgentError;
use super::events::DirectOutput;
use super::observer::LoopObserver;

/// High-level agent that holds an LLM and a set of tools.
pub struct Agent {
    /// A short, human-friendly name for the agent instance.
    pub name: String,

    /// The LLM implementation used to generate responses/thoughts.
    pub llm: Arc<dyn LLM>,

    /// Registered tools the agent may call by name.
    pub tools: ToolSet,

    /// Optional system prompt describing the agent's role.
    pub system_prompt: Option<String>,

    pub config: AgentConfig,

    /// Receives round and tool-call records.
    pub observer: Arc<dyn LoopObserver>,
}

/// What one run starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInput {
    pub query: MessageContent,
    /// Earlier conversation, oldest first.
    pub history: Vec<Message>,
}

impl AgentInput {
    pub fn new(query: impl Into<MessageContent>) -> Self {
        Self { query: query.into(), history: Vec::new() }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

impl From<&str> for AgentInput {
    fn from(query: &str) -> Self {
        AgentInput::new(query)
    }
}

impl From<String> for AgentInput {
    fn from(query: String) -> Self {
        AgentInput::new(query)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AgentResult {
    pub generation: String,
    pub usage: UsageReport,
    pub transcript: Vec<Message>,
    /// Raw tool results of a single-round run.
    #[serde(default)]
    pub direct_outputs: Vec<DirectOutput>,
}

pub type AgentExecuteResult = Result<AgentResult, AgentError>;
