use crate::config::AgentConfig;
use crate::llm::tokens::UsageAccumulator;
use crate::message::{Message, MessageContent};
use super::events::DirectOutput;

/// Mutable state of one run, owned by the run's event generator.
#[derive(Debug)]
pub struct IterationState {
    /// 1-based index of the round about to run.
    pub round_index: usize,
    /// Messages produced during this run, starting with the user query.
    pub transcript: Vec<Message>,
    /// Whether the latest round asked for tools.
    pub continue_flag: bool,
    pub usage: UsageAccumulator,
    pub direct_outputs: Vec<DirectOutput>,
    answer: Vec<String>,
}

impl IterationState {
    pub fn new(query: MessageContent, config: &AgentConfig) -> Self {
        Self {
            round_index: 1,
            transcript: vec![Message::User { content: query }],
            continue_flag: true,
            usage: UsageAccumulator::new(config.cache_billing, config.pricing.clone()),
            direct_outputs: Vec::new(),
            answer: Vec::new(),
        }
    }

    pub fn should_run(&self, max_iterations: usize) -> bool {
        self.continue_flag && self.round_index <= max_iterations
    }

    /// The last round of a multi-round run is offered no tools so the model
    /// has to answer.
    pub fn offers_tools(&self, max_iterations: usize) -> bool {
        !(self.round_index == max_iterations && max_iterations > 1)
    }

    pub fn record_text(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.answer.push(text.to_string());
        }
    }

    pub fn final_answer(&self) -> String {
        self.answer.join("\n")
    }

    pub fn advance(&mut self) {
        self.round_index += 1;
    }
}
