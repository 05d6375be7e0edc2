use futures::StreamExt;

use super::events::{AgentEvent, AgentEventStream};
use super::error::AgentError;
use super::types::{AgentExecuteResult, AgentInput, AgentResult};

/// Trait describing runtime operations an agent can perform.
#[async_trait::async_trait]
pub trait AgentRunner: Send + Sync {
    /// Start a run. Nothing happens until the stream is polled.
    fn run(&self, input: AgentInput) -> AgentEventStream<'_>;

    /// Drive a run to completion and collect its result.
    async fn execute(&self, input: AgentInput) -> AgentExecuteResult {
        let mut events = self.run(input);
        let mut result = AgentResult::default();
        let mut finished = false;
        while let Some(event) = events.next().await {
            match event? {
                AgentEvent::DirectOutput(output) => result.direct_outputs.push(output),
                AgentEvent::FinalAnswer { text } => result.generation = text,
                AgentEvent::Finished { usage, transcript } => {
                    result.usage = usage;
                    result.transcript = transcript;
                    finished = true;
                }
                _ => {}
            }
        }
        if finished { Ok(result) } else { Err(AgentError::Incomplete) }
    }

    /// Call the LLM with a prompt and return the generation result.
    async fn call_llm(&self, prompt: &str) -> AgentExecuteResult {
        self.execute(AgentInput::new(prompt)).await
    }
}
