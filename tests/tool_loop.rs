use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Map, Value};

use mini_toolflow::agent::error::AgentError;
use mini_toolflow::llm::scripted::{ScriptedLLM, ScriptedReply};
use mini_toolflow::llm::{CallInfo, FinishReason, GenerateResult};
use mini_toolflow::message::validate_transcript;
use mini_toolflow::prelude::*;
use mini_toolflow::tools::ArgSchema;

/// Records every input it receives and echoes the query back.
#[derive(Default)]
struct Search {
    seen: Mutex<Vec<Value>>,
}

#[async_trait::async_trait]
impl Tool for Search {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn args(&self) -> Vec<ArgSchema> {
        vec![ArgSchema {
            name: "q".into(),
            arg_type: "string".into(),
            description: "query".into(),
            required: true,
        }]
    }

    fn runtime_parameters(&self) -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert("limit".into(), json!(3));
        defaults.insert("q".into(), json!("default query"));
        defaults
    }

    async fn run(&self, input: Value) -> Result<Vec<ToolOutput>, ToolError> {
        self.seen.lock().unwrap().push(input.clone());
        let q = input["q"].as_str().unwrap_or("?");
        Ok(vec![ToolOutput::text(format!("results for {q}"))])
    }
}

struct Flaky;

#[async_trait::async_trait]
impl Tool for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn args(&self) -> Vec<ArgSchema> {
        Vec::new()
    }

    async fn run(&self, _input: Value) -> Result<Vec<ToolOutput>, ToolError> {
        Err(ToolError::execution("flaky", "upstream timeout"))
    }
}

#[mini_toolflow::tool(
    description = "Sleep for a while, then report the label",
    params(label = "Returned label", ms = "Milliseconds to sleep")
)]
async fn sleepy(label: String, ms: u64) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    label
}

fn call(id: &str, name: &str, arguments: Value) -> CallInfo {
    CallInfo { id: id.into(), name: name.into(), arguments: arguments.to_string() }
}

fn tool_turn(calls: Vec<CallInfo>) -> ScriptedReply {
    ScriptedReply::Complete(GenerateResult {
        tokens: TokenUsage::new(10, 5),
        generation: String::new(),
        tool_calls: calls,
        finish_reason: Some(FinishReason::ToolCalls),
    })
}

fn answer(text: &str) -> ScriptedReply {
    ScriptedReply::Complete(GenerateResult {
        tokens: TokenUsage::new(20, 8),
        generation: text.into(),
        tool_calls: Vec::new(),
        finish_reason: Some(FinishReason::Stop),
    })
}

fn agent_with(llm: Arc<ScriptedLLM>, max_iterations: usize) -> (Agent, Arc<Search>) {
    let search = Arc::new(Search::default());
    let mut agent = Agent::new("tester", llm, Some(max_iterations));
    agent.register_tool(None, search.clone());
    (agent, search)
}

async fn collect(agent: &Agent, input: AgentInput) -> Vec<AgentEvent> {
    agent
        .run(input)
        .map(|event| event.expect("run failed"))
        .collect()
        .await
}

fn tool_messages(transcript: &[Message]) -> Vec<(String, String)> {
    transcript
        .iter()
        .filter_map(|m| match m {
            Message::Tool { tool_call_id, content, .. } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn streamed_tool_call_then_answer() {
    let llm = Arc::new(ScriptedLLM::new([
        ScriptedReply::Stream(vec![
            StreamChunk::tool_start(0, "call_1", "search"),
            StreamChunk::tool_arguments(0, "{\"q\":"),
            StreamChunk::tool_arguments(0, "\"rust\"}"),
            StreamChunk::tool_end(0),
            StreamChunk::finished(FinishReason::ToolCalls, Some(TokenUsage::new(12, 4))),
        ]),
        ScriptedReply::Stream(vec![
            StreamChunk::text("Rust is "),
            StreamChunk::text("a language."),
            StreamChunk::finished(FinishReason::Stop, Some(TokenUsage::new(30, 6))),
        ]),
    ]));
    let (agent, search) = agent_with(llm.clone(), 3);

    let events = collect(&agent, AgentInput::new("what is rust?")).await;
    assert_eq!(llm.remaining(), 0);

    assert!(matches!(events[0], AgentEvent::RoundStart { round: 1, tools_offered: 1 }));
    assert!(matches!(&events[1], AgentEvent::ToolCallStart { id, arguments, .. } if id == "call_1" && arguments == "{\"q\":\"rust\"}"));
    assert!(matches!(&events[2], AgentEvent::ToolResult { content, is_error: false, .. } if content == "results for rust"));
    assert!(matches!(events[3], AgentEvent::RoundEnd { round: 1, tool_calls: 1, .. }));
    assert!(matches!(events[4], AgentEvent::RoundStart { round: 2, .. }));
    assert!(matches!(&events[5], AgentEvent::Thought { text, .. } if text == "Rust is "));
    assert!(matches!(&events[6], AgentEvent::Thought { text, .. } if text == "a language."));
    assert!(matches!(events[7], AgentEvent::RoundEnd { round: 2, tool_calls: 0, .. }));
    assert!(matches!(&events[8], AgentEvent::FinalAnswer { text } if text == "Rust is a language."));

    let AgentEvent::Finished { usage, transcript } = &events[9] else {
        panic!("expected Finished, got {:?}", events[9]);
    };
    assert_eq!(events.len(), 10);
    assert_eq!(usage.invocations, 2);
    assert_eq!(usage.prompt_tokens, 42);
    assert_eq!(usage.completion_tokens, 10);
    assert_eq!(tool_messages(transcript), vec![("call_1".to_string(), "results for rust".to_string())]);
    validate_transcript(transcript).unwrap();

    // runtime parameters are merged under the model's arguments
    assert_eq!(search.seen.lock().unwrap()[0], json!({"limit": 3, "q": "rust"}));
}

#[tokio::test]
async fn single_round_surfaces_tool_results_directly() {
    let llm = Arc::new(ScriptedLLM::new([tool_turn(vec![
        call("a", "search", json!({"q": "one"})),
        call("b", "search", json!({"q": "two"})),
    ])]));
    let (agent, _) = agent_with(llm.clone(), 1);

    let result = agent.execute(AgentInput::new("look up both")).await.unwrap();

    assert_eq!(llm.requests().len(), 1);
    assert_eq!(llm.requests()[0].tools.len(), 1, "a single round still offers tools");
    let direct: Vec<_> = result.direct_outputs.iter().map(|o| (o.tool_call_id.as_str(), o.content.as_str())).collect();
    assert_eq!(direct, [("a", "results for one"), ("b", "results for two")]);
    assert_eq!(tool_messages(&result.transcript).len(), 2);
    assert_eq!(result.generation, "");
}

#[tokio::test]
async fn unknown_tool_gets_a_synthesized_result() {
    let llm = Arc::new(ScriptedLLM::new([
        tool_turn(vec![call("w1", "weather", json!({"city": "Oslo"}))]),
        answer("I cannot check the weather."),
    ]));
    let (agent, _) = agent_with(llm.clone(), 3);

    let result = agent.execute(AgentInput::new("weather in Oslo?")).await.unwrap();

    assert_eq!(tool_messages(&result.transcript), vec![("w1".to_string(), "there is no tool named weather".to_string())]);
    assert_eq!(result.generation, "I cannot check the weather.");
    assert_eq!(llm.requests().len(), 2);
}

#[tokio::test]
async fn tool_failures_and_bad_arguments_do_not_abort_the_round() {
    let llm = Arc::new(ScriptedLLM::new([
        ScriptedReply::Stream(vec![
            StreamChunk::tool_start(0, "bad", "search"),
            StreamChunk::tool_arguments(0, "{\"q\":"),
            StreamChunk::tool_start(1, "boom", "flaky"),
            StreamChunk::finished(FinishReason::ToolCalls, None),
        ]),
        answer("done"),
    ]));
    let (mut agent, search) = agent_with(llm, 3);
    agent.register_tool(None, Arc::new(Flaky));

    let result = agent.execute(AgentInput::new("go")).await.unwrap();

    let results = tool_messages(&result.transcript);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "bad");
    assert!(results[0].1.starts_with("tool invoke error: arguments for 'search' are not valid JSON"));
    assert_eq!(results[1].0, "boom");
    assert_eq!(results[1].1, "tool invoke error: Tool execution error in 'flaky': upstream timeout");
    assert!(search.seen.lock().unwrap().is_empty());
    assert_eq!(result.generation, "done");
}

#[tokio::test]
async fn last_round_is_offered_no_tools() {
    for max in 1..=4usize {
        let replies = (0..max).map(|i| tool_turn(vec![call(&format!("c{i}"), "search", json!({"q": "again"}))]));
        let llm = Arc::new(ScriptedLLM::new(replies));
        let (agent, _) = agent_with(llm.clone(), max);

        let events = collect(&agent, AgentInput::new("loop forever")).await;

        let rounds = events.iter().filter(|e| matches!(e, AgentEvent::RoundStart { .. })).count();
        assert_eq!(rounds, max);
        let requests = llm.requests();
        assert_eq!(requests.len(), max);
        for (i, request) in requests.iter().enumerate() {
            let last = i + 1 == max;
            assert_eq!(request.tools.is_empty(), last && max > 1, "round {} of {max}", i + 1);
        }
    }
}

#[tokio::test]
async fn results_follow_emission_order() {
    let llm = Arc::new(ScriptedLLM::new([
        tool_turn(vec![
            call("first", "search", json!({"q": "a"})),
            call("second", "flaky", json!({})),
            call("third", "search", json!({"q": "c"})),
        ]),
        answer("ok"),
    ]));
    let (mut agent, _) = agent_with(llm, 2);
    agent.register_tool(None, Arc::new(Flaky));

    let result = agent.execute(AgentInput::new("three things")).await.unwrap();

    validate_transcript(&result.transcript).unwrap();
    let ids: Vec<_> = tool_messages(&result.transcript).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, ["first", "second", "third"]);
    let Message::Assistant { tool_calls, .. } = &result.transcript[1] else {
        panic!("expected assistant message, got {:?}", result.transcript[1]);
    };
    assert_eq!(tool_calls.len(), 3);
}

#[tokio::test]
async fn parallel_dispatch_keeps_emission_order() {
    let llm = Arc::new(ScriptedLLM::new([
        tool_turn(vec![
            call("slow", "sleepy", json!({"label": "slow", "ms": 60})),
            call("fast", "sleepy", json!({"label": "fast", "ms": 1})),
        ]),
        answer("both done"),
    ]));
    let config = AgentConfig { parallel_tool_calls: true, ..AgentConfig::default() };
    let mut agent = Agent::new("parallel", llm, None).with_config(config).unwrap();
    agent.register_tool(None, Arc::new(SleepyTool));

    let events = collect(&agent, AgentInput::new("race")).await;

    let kinds: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCallStart { id, .. } => Some(format!("start:{id}")),
            AgentEvent::ToolResult { id, content, .. } => Some(format!("result:{id}:{content}")),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, ["start:slow", "start:fast", "result:slow:slow", "result:fast:fast"]);
}

#[tokio::test]
async fn model_failure_is_fatal() {
    let llm = Arc::new(ScriptedLLM::new([
        tool_turn(vec![call("c1", "search", json!({"q": "x"}))]),
        ScriptedReply::Fail("provider unavailable".into()),
    ]));
    let (agent, _) = agent_with(llm, 3);

    let err = agent.execute(AgentInput::new("hi")).await.unwrap_err();
    assert!(matches!(err, AgentError::LLMExecutionError(_)));
}

#[tokio::test]
async fn broken_stream_ends_the_run() {
    let llm = Arc::new(ScriptedLLM::new([ScriptedReply::BrokenStream(
        vec![StreamChunk::text("partial")],
        "connection reset".into(),
    )]));
    let (agent, _) = agent_with(llm, 3);

    let events: Vec<_> = agent.run(AgentInput::new("hi")).collect().await;
    assert!(matches!(&events[1], Ok(AgentEvent::Thought { text, .. }) if text == "partial"));
    assert!(matches!(events.last(), Some(Err(AgentError::LLMExecutionError(_)))));
    assert!(!events.iter().any(|e| matches!(e, Ok(AgentEvent::Finished { .. }))));
}

#[tokio::test]
async fn history_media_is_degraded_after_the_first_round() {
    let history = vec![
        Message::user_parts(vec![ContentPart::text("what is this"), ContentPart::image("https://example.com/cat.png")]),
        Message::assistant("a cat"),
    ];
    let query = MessageContent::Parts(vec![ContentPart::text("and this"), ContentPart::image("https://example.com/dog.png")]);
    let llm = Arc::new(ScriptedLLM::new([
        tool_turn(vec![call("c1", "search", json!({"q": "dog"}))]),
        answer("a dog"),
    ]));
    let (agent, _) = agent_with(llm.clone(), 3);
    let agent = agent.with_system_prompt("You describe pictures.");

    agent.execute(AgentInput::new(query.clone()).with_history(history.clone())).await.unwrap();

    let requests = llm.requests();
    assert_eq!(requests[0].messages[0], Message::system("You describe pictures."));
    assert_eq!(requests[0].messages[1], history[0]);
    assert_eq!(requests[1].messages[1], Message::user("what is this\n[image]"));
    assert_eq!(requests[1].messages[3], Message::User { content: query });
}

#[tokio::test]
async fn cache_usage_is_billed_with_multipliers() {
    let llm = Arc::new(ScriptedLLM::new([ScriptedReply::Complete(GenerateResult {
        tokens: TokenUsage::new(100, 10).with_cache(40, 1000),
        generation: "cached".into(),
        tool_calls: Vec::new(),
        finish_reason: Some(FinishReason::Stop),
    })]));
    let (agent, _) = agent_with(llm, 3);

    let result = agent.execute(AgentInput::new("hi")).await.unwrap();
    assert_eq!(result.usage.prompt_tokens, 100 + 50 + 100);
    assert_eq!(result.usage.completion_tokens, 10);
    assert_eq!(result.usage.currency, "USD");
}

#[derive(Default)]
struct Recorder {
    rounds: Mutex<Vec<(usize, usize)>>,
    tools: Mutex<Vec<(String, bool)>>,
}

impl LoopObserver for Recorder {
    fn round_finished(&self, record: &mini_toolflow::agent::observer::RoundRecord) {
        self.rounds.lock().unwrap().push((record.round, record.tool_calls));
    }

    fn tool_call_finished(&self, log: &mini_toolflow::agent::observer::ToolCallLog) {
        self.tools.lock().unwrap().push((log.name.clone(), log.is_error));
    }
}

#[tokio::test]
async fn observer_sees_rounds_and_tool_calls() {
    let llm = Arc::new(ScriptedLLM::new([
        tool_turn(vec![call("c1", "search", json!({"q": "x"})), call("c2", "missing", json!({}))]),
        answer("fine"),
    ]));
    let recorder = Arc::new(Recorder::default());
    let (agent, _) = agent_with(llm, 3);
    let agent = agent.with_observer(recorder.clone());

    agent.execute(AgentInput::new("hi")).await.unwrap();

    assert_eq!(*recorder.rounds.lock().unwrap(), [(1, 2), (2, 0)]);
    assert_eq!(
        *recorder.tools.lock().unwrap(),
        [("search".to_string(), false), ("missing".to_string(), true)]
    );
}
