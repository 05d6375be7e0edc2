use std::sync::Arc;

use mini_toolflow::llm::ollama::Ollama;
use mini_toolflow::prelude::*;

// Use the proc-macro attribute to generate the Tool implementation
#[tool(
    name = "get_weather",
    description = "Get weather for a given city",
    params(city = "City name, e.g. 'San Francisco'")
)]
fn get_weather(city: String) -> String {
    format!("It's always sunny in {}!", city)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mini_toolflow::logging::init("info");

    // Adjust model name to one available in your Ollama server.
    let llm = llm_to_arc_dyn(Ollama::default().with_model("qwen3:8b"));

    let mut agent = Agent::new("ollama_weather", llm, Some(3))
        .with_system_prompt("You are a weather assistant. Use the tools when they help, otherwise answer directly.");
    agent.register_tool(None, Arc::new(GetWeatherTool));

    let result = agent.call_llm("What's the weather in Beijing?").await?;
    println!("answer: {}", result.generation);
    println!(
        "usage: {} tokens over {} calls",
        result.usage.total_tokens, result.usage.invocations
    );
    Ok(())
}
