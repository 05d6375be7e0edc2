//! Streams agent events from an OpenAI-compatible endpoint.
//!
//! ```sh
//! OPENAI_API_KEY=... cargo run --example agent_openai_stream
//! ```

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use mini_toolflow::llm::openai::OpenAI;
use mini_toolflow::prelude::*;

#[tool(description = "Add two integers", params(a = "left operand", b = "right operand"))]
fn add(a: i64, b: i64) -> serde_json::Value {
    serde_json::json!({ "sum": a + b })
}

#[tool(description = "Multiply two integers", params(a = "left operand", b = "right operand"))]
async fn multiply(a: i64, b: i64) -> serde_json::Value {
    serde_json::json!({ "product": a * b })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mini_toolflow::logging::init("warn");

    let llm = llm_to_arc_dyn(OpenAI::from_env()?.with_model("gpt-4o-mini"));
    let config = AgentConfig {
        max_iterations: 4,
        parallel_tool_calls: true,
        ..AgentConfig::default()
    };
    let mut agent = Agent::new("calculator", llm, None)
        .with_config(config)?
        .with_system_prompt("Use the tools for arithmetic. Show the final result.");
    agent
        .register_tool(None, Arc::new(AddTool))
        .register_tool(None, Arc::new(MultiplyTool));

    let mut events = agent.run(AgentInput::new("What is (17 + 25) * 3?"));
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event? {
            AgentEvent::RoundStart { round, tools_offered } => println!("\n-- round {round} ({tools_offered} tools)"),
            AgentEvent::Thought { text, .. } => {
                print!("{text}");
                stdout.flush()?;
            }
            AgentEvent::ToolCallStart { name, arguments, .. } => println!("\n> {name}({arguments})"),
            AgentEvent::ToolResult { name, content, .. } => println!("< {name}: {content}"),
            AgentEvent::Finished { usage, .. } => {
                println!("\n\n{} tokens, {:.6} {}", usage.total_tokens, usage.total_price, usage.currency);
            }
            _ => {}
        }
    }
    Ok(())
}
