use std::sync::Arc;
use std::time::{Instant, SystemTime};

use async_stream::try_stream;
use futures::{Stream, StreamExt, future::join_all};
use tracing::{debug, info_span, warn, Instrument};

use crate::config::{AgentConfig, DEFAULT_MAX_ITERATIONS};
use crate::llm::{
    accumulator::{SealedToolCall, ToolCallAccumulator},
    traits::LLM,
    ModelRequest,
    ModelResponse,
};
use crate::message::{validate_transcript, Message, ToolCall};
use crate::tools::{
    merge_parameters,
    render_outputs,
    registry::ToolSet,
    traits::Tool,
};

pub mod types;
pub mod error;
pub mod traits;
pub mod events;
pub mod state;
pub mod context;
pub mod observer;

use traits::AgentRunner;
use types::{Agent, AgentInput};
use error::AgentError;
use events::{AgentEvent, AgentEventStream, DirectOutput};
use state::IterationState;
use observer::{LoopObserver, RoundRecord, ToolCallLog, TracingObserver};

/// Text recorded in the transcript for one tool call.
struct ToolInvocation {
    content: String,
    is_error: bool,
}

impl Agent {
    /// Create a new Agent with the provided name and LLM. Tools start empty.
    /// `max_iterations` falls back to the default when `None` or zero.
    pub fn new(name: impl Into<String>, llm: Arc<dyn LLM>, max_iterations: Option<usize>) -> Self {
        let config = AgentConfig {
            max_iterations: max_iterations.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_ITERATIONS),
            ..AgentConfig::default()
        };
        Self {
            name: name.into(),
            llm,
            tools: ToolSet::new(),
            system_prompt: None,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Result<Self, AgentError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Register a tool under the given name. Replaces any existing tool with the same name. Returns &mut Self for chaining.
    pub fn register_tool(&mut self, name: Option<&str>, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.register(name, tool);
        self
    }

    /// Change the maximum iterations for the agent's decision process.
    pub fn change_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations.max(1);
    }

    /// Look up a tool by name.
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Set or replace the agent's system prompt.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    fn announce(&self, round: usize, call: &SealedToolCall) -> AgentEvent {
        self.observer.tool_call_started(&self.name, round, &call.id, &call.name);
        AgentEvent::ToolCallStart {
            round,
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.to_tool_call().arguments,
        }
    }

    /// Run one tool call. Never fails: every problem becomes the call's
    /// result text so the model sees it next round.
    async fn invoke_tool(&self, round: usize, call: &SealedToolCall) -> ToolInvocation {
        let started_at = SystemTime::now();
        let started = Instant::now();

        let invocation = match (&call.arguments, self.tools.get(&call.name)) {
            (Err(err), _) => ToolInvocation { content: format!("tool invoke error: {err}"), is_error: true },
            (Ok(_), None) => ToolInvocation { content: format!("there is no tool named {}", call.name), is_error: true },
            (Ok(args), Some(tool)) => {
                let input = merge_parameters(tool.runtime_parameters(), args.clone());
                match tool.run(input).await {
                    Ok(outputs) => ToolInvocation { content: render_outputs(&outputs), is_error: false },
                    Err(err) => ToolInvocation { content: format!("tool invoke error: {err}"), is_error: true },
                }
            }
        };
        if invocation.is_error {
            warn!(tool = %call.name, id = %call.id, reason = %invocation.content, "tool call failed");
        }

        self.observer.tool_call_finished(&ToolCallLog {
            agent: self.name.clone(),
            round,
            id: call.id.clone(),
            name: call.name.clone(),
            started_at,
            finished_at: SystemTime::now(),
            elapsed: started.elapsed(),
            is_error: invocation.is_error,
        });
        invocation
    }

    fn events(&self, input: AgentInput) -> impl Stream<Item = Result<AgentEvent, AgentError>> + Send + '_ {
        try_stream! {
            let max = self.config.max_iterations;
            let history = input.history;
            let provider = self.llm.provider();
            let mut state = IterationState::new(input.query, &self.config);

            while state.should_run(max) {
                let round = state.round_index;
                let span = info_span!("round", agent = %self.name, provider, round);
                let request = ModelRequest {
                    messages: context::build_prompt(self.system_prompt.as_deref(), &history, &state.transcript, round),
                    tools: if state.offers_tools(max) { self.tools.schemas() } else { Vec::new() },
                    stop: self.config.stop.clone(),
                    stream: self.config.stream,
                };
                debug!(parent: &span, messages = request.messages.len(), tools = request.tools.len(), "invoking model");
                self.observer.round_started(&self.name, round);
                yield AgentEvent::RoundStart { round, tools_offered: request.tools.len() };

                let started_at = SystemTime::now();
                let started = Instant::now();

                let response = self.llm.invoke(&request).instrument(span.clone()).await?;
                let turn = match response {
                    ModelResponse::Complete(result) => {
                        let turn = ToolCallAccumulator::from_complete(result);
                        if !turn.text.is_empty() {
                            yield AgentEvent::Thought { round, text: turn.text.clone() };
                        }
                        turn
                    }
                    ModelResponse::Stream(mut chunks) => {
                        let mut accumulator = ToolCallAccumulator::new();
                        while let Some(chunk) = chunks.next().instrument(span.clone()).await {
                            if let Some(text) = accumulator.ingest(chunk?) {
                                yield AgentEvent::Thought { round, text };
                            }
                        }
                        accumulator.finish()
                    }
                };

                let price = state.usage.add(&turn.usage);
                state.record_text(&turn.text);
                let tool_calls = turn.calls.len();

                if turn.has_tool_calls() {
                    state.continue_flag = true;
                    let calls: Vec<ToolCall> = turn.calls.iter().map(SealedToolCall::to_tool_call).collect();
                    state.transcript.push(Message::assistant_with_tools(turn.text.clone(), calls));

                    if self.config.parallel_tool_calls {
                        for call in &turn.calls {
                            yield self.announce(round, call);
                        }
                        let invocations = join_all(
                            turn.calls.iter().map(|call| self.invoke_tool(round, call).instrument(span.clone())),
                        )
                        .await;
                        for (call, invocation) in turn.calls.iter().zip(invocations) {
                            yield record_result(&mut state, round, max == 1, call, invocation);
                        }
                    } else {
                        for call in &turn.calls {
                            yield self.announce(round, call);
                            let invocation = self.invoke_tool(round, call).instrument(span.clone()).await;
                            yield record_result(&mut state, round, max == 1, call, invocation);
                        }
                    }
                } else {
                    state.continue_flag = false;
                    state.transcript.push(Message::assistant(turn.text.clone()));
                }

                self.observer.round_finished(&RoundRecord {
                    agent: self.name.clone(),
                    round,
                    started_at,
                    finished_at: SystemTime::now(),
                    elapsed: started.elapsed(),
                    usage: turn.usage,
                    price,
                    currency: state.usage.currency().to_string(),
                    tool_calls,
                });
                yield AgentEvent::RoundEnd { round, tool_calls, usage: turn.usage, price };
                state.advance();
            }

            if state.continue_flag && max > 1 {
                warn!(agent = %self.name, max_iterations = max, "iteration budget exhausted");
            }
            if let Err(err) = validate_transcript(&state.transcript) {
                warn!(agent = %self.name, error = %err, "transcript has an uncorrelated tool result");
            }

            for output in std::mem::take(&mut state.direct_outputs) {
                yield AgentEvent::DirectOutput(output);
            }
            yield AgentEvent::FinalAnswer { text: state.final_answer() };

            let usage = state.usage.report();
            self.observer.run_finished(&self.name, &usage);
            yield AgentEvent::Finished { usage, transcript: state.transcript };
        }
    }
}

/// Append a tool result to the transcript and build its event.
fn record_result(
    state: &mut IterationState,
    round: usize,
    single_round: bool,
    call: &SealedToolCall,
    invocation: ToolInvocation,
) -> AgentEvent {
    state.transcript.push(Message::tool_result(&call.id, &call.name, &invocation.content));
    if single_round {
        state.direct_outputs.push(DirectOutput {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: invocation.content.clone(),
        });
    }
    AgentEvent::ToolResult {
        round,
        id: call.id.clone(),
        name: call.name.clone(),
        content: invocation.content,
        is_error: invocation.is_error,
    }
}

impl AgentRunner for Agent {
    fn run(&self, input: AgentInput) -> AgentEventStream<'_> {
        Box::pin(self.events(input))
    }
}
