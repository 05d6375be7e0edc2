use mini_toolflow::llm::ollama::Ollama;
use mini_toolflow::llm::{ModelRequest, ModelResponse};
use mini_toolflow::message::Message;
use mini_toolflow::llm::traits::LLM;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mini_toolflow::logging::init("info");

    // Override the model with one available locally (see `ollama list`)
    let ollama = Ollama::default().with_model("qwen3:8b");

    let request = ModelRequest {
        messages: vec![Message::user("Why is the sky blue?")],
        ..ModelRequest::default()
    };

    match ollama.invoke(&request).await? {
        ModelResponse::Complete(res) => {
            println!("generation: {}", res.generation);
            let tokens = res.tokens;
            println!("tokens: prompt={} completion={} total={}", tokens.prompt_tokens, tokens.completion_tokens, tokens.total_tokens);
        }
        ModelResponse::Stream(_) => unreachable!("ollama answers in one piece"),
    }

    Ok(())
}
