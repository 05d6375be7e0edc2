//! Side channel for run telemetry. Observers see every round and tool call
//! with timing and cost, but cannot influence the run.

use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::llm::tokens::{TokenUsage, UsageReport};

/// Timing and cost of one model round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub agent: String,
    pub round: usize,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub elapsed: Duration,
    pub usage: TokenUsage,
    pub price: f64,
    pub currency: String,
    pub tool_calls: usize,
}

/// Timing and outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallLog {
    pub agent: String,
    pub round: usize,
    pub id: String,
    pub name: String,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub elapsed: Duration,
    pub is_error: bool,
}

pub trait LoopObserver: Send + Sync {
    fn round_started(&self, _agent: &str, _round: usize) {}

    fn round_finished(&self, _record: &RoundRecord) {}

    fn tool_call_started(&self, _agent: &str, _round: usize, _id: &str, _name: &str) {}

    fn tool_call_finished(&self, _log: &ToolCallLog) {}

    fn run_finished(&self, _agent: &str, _usage: &UsageReport) {}
}

/// Emits every record as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoopObserver for TracingObserver {
    fn round_started(&self, agent: &str, round: usize) {
        debug!(agent, round, "round started");
    }

    fn round_finished(&self, record: &RoundRecord) {
        info!(
            agent = %record.agent,
            round = record.round,
            elapsed_ms = record.elapsed.as_millis() as u64,
            prompt_tokens = record.usage.prompt_tokens,
            completion_tokens = record.usage.completion_tokens,
            cache_creation_tokens = record.usage.cache_creation_tokens,
            cache_read_tokens = record.usage.cache_read_tokens,
            price = record.price,
            currency = %record.currency,
            tool_calls = record.tool_calls,
            "round finished"
        );
    }

    fn tool_call_started(&self, agent: &str, round: usize, id: &str, name: &str) {
        debug!(agent, round, id, tool = name, "tool call started");
    }

    fn tool_call_finished(&self, log: &ToolCallLog) {
        if log.is_error {
            warn!(
                agent = %log.agent,
                round = log.round,
                id = %log.id,
                tool = %log.name,
                elapsed_ms = log.elapsed.as_millis() as u64,
                "tool call failed"
            );
        } else {
            info!(
                agent = %log.agent,
                round = log.round,
                id = %log.id,
                tool = %log.name,
                elapsed_ms = log.elapsed.as_millis() as u64,
                "tool call finished"
            );
        }
    }

    fn run_finished(&self, agent: &str, usage: &UsageReport) {
        info!(
            agent,
            invocations = usage.invocations,
            total_tokens = usage.total_tokens,
            total_price = usage.total_price,
            currency = %usage.currency,
            "agent run finished"
        );
    }
}
