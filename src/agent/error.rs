use crate::llm::error::LLMError;
use crate::config::ConfigError;

/// Failures that end an agent run. Tool failures never appear here; they are
/// recorded as tool results in the transcript.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LLMExecutionError(#[from] LLMError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("agent event stream ended before the run finished")]
    Incomplete,
}
