use std::sync::Arc;
use futures::{
    FutureExt,
    future::BoxFuture,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::message::{Message, ToolCall};
use crate::tools::schema::ToolSchema;

use crate::llm::{
    traits::LLM,
    tokens::TokenUsage,
    CallInfo,
    FinishReason,
    GenerateResult,
    LLMResult,
    ModelRequest,
    ModelResponse,
};

/// Default model name used when no model is specified.
/// Adjust this to match the model name you have installed in your local Ollama.
/// Common names: "llama3.2", "llama3", "llama2", or custom names from `ollama list`.
pub const DEFAULT_MODEL: &str = "llama3.2";

pub use ollama_rs::{
    error::OllamaError,
    Ollama as OllamaClient,
    models::ModelOptions,
    generation::chat::{request::ChatMessageRequest, ChatMessage, MessageRole},
};

/// Local models through Ollama. Always answers in one piece; tools are
/// described in a system prompt and calls are read back from a JSON
/// `tool_calls` object in the reply.
#[derive(Debug, Clone)]
pub struct Ollama {
    pub(crate) client: Arc<OllamaClient>,
    pub(crate) model: String,
    pub(crate) options: Option<ModelOptions>,
    pub(crate) think: bool,
}

impl Ollama {
    /// Create an `Ollama` wrapper using the provided client and the default model.
    ///
    /// If your local Ollama uses a different default model name, change
    /// `DEFAULT_MODEL` or call `Ollama::with_model`.
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            options: None,
            think: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Ask reasoning models to keep their thinking out of the reply text.
    pub fn with_think(mut self, think: bool) -> Self {
        self.think = think;
        self
    }

    fn chat_request(&self, request: &ModelRequest) -> ChatMessageRequest {
        let mut messages: Vec<ChatMessage> = request.messages.iter().map(ChatMessage::from).collect();
        if !request.tools.is_empty() {
            // after the caller's system prompt, before the conversation
            let at = messages
                .iter()
                .take_while(|m| matches!(m.role, MessageRole::System))
                .count();
            messages.insert(at, ChatMessage::new(MessageRole::System, tools_prompt(&request.tools)));
        }

        let mut chat = ChatMessageRequest::new(self.model.clone(), messages);
        let mut options = self.options.clone();
        if !request.stop.is_empty() {
            options = Some(options.unwrap_or_default().stop(request.stop.clone()));
        }
        if let Some(options) = options {
            chat = chat.options(options);
        }
        if self.think {
            chat = chat.think(true);
        }
        chat
    }
}

impl Default for Ollama {
    fn default() -> Self {
        let client = Arc::new(OllamaClient::default());
        Ollama::new(client)
    }
}

fn tool_calls_json(calls: &[ToolCall]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|call| {
            let args = serde_json::from_str::<Value>(&call.arguments).unwrap_or_else(|_| json!({}));
            json!({ "name": call.name, "args": args })
        })
        .collect();
    json!({ "tool_calls": calls })
}

/// System prompt advertising the offered tools and the reply format.
fn tools_prompt(tools: &[ToolSchema]) -> String {
    let described: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters(),
            })
        })
        .collect();
    let example = json!({
        "tool_calls": [
            { "name": "tool_name", "args": { "param1": "value1", "param2": "value2" } }
        ]
    });
    format!(
        "You can call these tools: {}\n\
         To call tools, reply with JSON in this format: {}\n\
         IMPORTANT: once you have the information you need, answer WITHOUT any tool_calls.",
        Value::Array(described),
        example,
    )
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::System { content } => ChatMessage::new(MessageRole::System, content.clone()),
            // media is not forwarded, only its placeholder text
            Message::User { content } => ChatMessage::new(MessageRole::User, content.degraded().text()),
            Message::Assistant { content, tool_calls } if content.is_empty() && !tool_calls.is_empty() => {
                ChatMessage::new(MessageRole::Assistant, tool_calls_json(tool_calls).to_string())
            }
            Message::Assistant { content, .. } => ChatMessage::new(MessageRole::Assistant, content.clone()),
            Message::Tool { name, content, .. } => {
                ChatMessage::new(MessageRole::Tool, format!("Tool {} returned: {}", name, content))
            }
        }
    }
}

/// Extract `{"tool_calls": [{"name", "args"}]}` from a reply. The JSON may be
/// surrounded by prose, so the outermost braces are tried as a fallback.
pub fn parse_tool_calls(generation: &str) -> Vec<CallInfo> {
    let parsed = serde_json::from_str::<Value>(generation).ok().or_else(|| {
        let start = generation.find('{')?;
        let end = generation.rfind('}')?;
        if start > end {
            return None;
        }
        serde_json::from_str::<Value>(&generation[start..=end]).ok()
    });
    let Some(entries) = parsed
        .as_ref()
        .and_then(|v| v.get("tool_calls"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name").and_then(Value::as_str);
            if name.is_none() {
                warn!(entry = %entry, "ignoring tool call without a name");
            }
            name.map(|name| (name, entry.get("args").cloned().unwrap_or_else(|| json!({}))))
        })
        .enumerate()
        .map(|(i, (name, args))| CallInfo {
            id: format!("call_{i}"),
            name: name.to_string(),
            arguments: args.to_string(),
        })
        .collect()
}

impl LLM for Ollama {
    fn invoke<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, LLMResult<ModelResponse<'a>>> {
        async move {
            let chat = self.chat_request(request);
            debug!(model = %self.model, messages = request.messages.len(), tools = request.tools.len(), "sending ollama chat request");

            let response = self.client.send_chat_messages(chat).await?;
            let generation = response.message.content;

            let tokens = response
                .final_data
                .map(|data| TokenUsage::new(data.prompt_eval_count as u32, data.eval_count as u32))
                .unwrap_or_default();

            let tool_calls = if request.tools.is_empty() {
                Vec::new()
            } else {
                parse_tool_calls(&generation)
            };
            let finish_reason = Some(if tool_calls.is_empty() { FinishReason::Stop } else { FinishReason::ToolCalls });

            Ok(ModelResponse::Complete(GenerateResult { tokens, generation, tool_calls, finish_reason }))
        }
        .boxed()
    }

    fn provider(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentPart;

    #[test]
    fn parses_calls_embedded_in_prose() {
        let reply = r#"Sure, let me check. {"tool_calls": [{"name": "get_weather", "args": {"city": "Beijing"}}, {"args": {}}, {"name": "clock"}]} done"#;
        let calls = parse_tool_calls(reply);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, r#"{"city":"Beijing"}"#);
        assert_eq!(calls[1].name, "clock");
        assert_eq!(calls[1].arguments, "{}");
    }

    #[test]
    fn plain_answers_have_no_calls() {
        assert!(parse_tool_calls("The sky is blue because of Rayleigh scattering.").is_empty());
        assert!(parse_tool_calls(r#"{"answer": 42}"#).is_empty());
        assert!(parse_tool_calls("} odd {").is_empty());
    }

    #[test]
    fn maps_roles_and_tool_results() {
        let user = ChatMessage::from(&Message::user_parts(vec![
            ContentPart::text("what is in"),
            ContentPart::image("https://example.com/cat.png"),
        ]));
        assert!(matches!(user.role, MessageRole::User));
        assert!(user.content.contains("[image]"));

        let tool = ChatMessage::from(&Message::tool_result("call_0", "get_weather", "sunny"));
        assert!(matches!(tool.role, MessageRole::Tool));
        assert_eq!(tool.content, "Tool get_weather returned: sunny");

        let call = ToolCall { id: "call_0".into(), name: "get_weather".into(), arguments: r#"{"city":"Oslo"}"#.into() };
        let assistant = ChatMessage::from(&Message::assistant_with_tools("", vec![call]));
        assert!(assistant.content.contains("\"get_weather\""));
    }

    #[test]
    fn tools_prompt_follows_system_messages() {
        let llm = Ollama::default();
        let request = ModelRequest {
            messages: vec![Message::system("be brief"), Message::user("hi")],
            tools: vec![ToolSchema { name: "clock".into(), description: "Current time".into(), args: vec![] }],
            ..ModelRequest::default()
        };
        let chat = llm.chat_request(&request);
        assert_eq!(chat.messages.len(), 3);
        assert!(chat.messages[1].content.contains("\"clock\""));
        assert!(matches!(chat.messages[2].role, MessageRole::User));
    }
}
