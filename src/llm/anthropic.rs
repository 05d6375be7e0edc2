//! Anthropic Messages API over `reqwest`.
//!
//! Prompt caching is controlled per call through [`AnthropicOptions`]; the
//! client itself holds no per-request state and can be shared freely.

use futures::{
    FutureExt,
    Stream,
    StreamExt,
    future::BoxFuture,
};
use reqwest::{Client, StatusCode};
use serde::{Serialize, Deserialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::{env_var, ConfigError};
use crate::message::{ContentPart, Message, MessageContent};
use crate::llm::{
    traits::LLM,
    error::LLMError,
    dialect::{normalize_stream, AnthropicDialect, anthropic::{AnthropicEvent, AnthropicUsage, parse_sse_line}},
    dialect::finish_reason_from_str,
    CallInfo,
    GenerateResult,
    LLMResult,
    ModelRequest,
    ModelResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Settings applied to a single invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicOptions {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Mark the system prompt as a cache breakpoint.
    pub cache_system_prompt: bool,
    /// Mark the tool definitions as a cache breakpoint.
    pub cache_tools: bool,
}

impl Default for AnthropicOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            cache_system_prompt: false,
            cache_tools: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Anthropic {
    client: Client,
    api_key: String,
    base_url: String,
    options: AnthropicOptions,
}

impl Anthropic {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            options: AnthropicOptions::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(env_var("ANTHROPIC_API_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.options.model = model.into();
        self
    }

    /// Default options used by the [`LLM`] impl.
    pub fn with_options(mut self, options: AnthropicOptions) -> Self {
        self.options = options;
        self
    }

    /// Invoke with explicit per-call options.
    pub async fn invoke_with<'a>(
        &'a self,
        request: &'a ModelRequest,
        options: &AnthropicOptions,
    ) -> LLMResult<ModelResponse<'a>> {
        let body = build_body(request, options);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        debug!(model = %options.model, stream = request.stream, "sending anthropic messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        if request.stream {
            let events = sse_events(response.bytes_stream());
            Ok(ModelResponse::Stream(normalize_stream(AnthropicDialect::default(), events)))
        } else {
            let message: MessagesResponse = response.json().await?;
            Ok(ModelResponse::Complete(message.into()))
        }
    }
}

impl LLM for Anthropic {
    fn invoke<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, LLMResult<ModelResponse<'a>>> {
        async move { self.invoke_with(request, &self.options).await }.boxed()
    }

    fn provider(&self) -> &'static str {
        "anthropic"
    }
}

fn api_error(status: StatusCode, body: &str) -> LLMError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string());
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LLMError::RateLimitExceeded(message);
    }
    LLMError::ApiError { provider: "anthropic", status: status.as_u16(), message }
}

/// Split a byte stream into SSE lines and decode Anthropic events.
/// Lines may straddle network chunks, so bytes are buffered until a newline.
fn sse_events<S, B>(bytes: S) -> impl Stream<Item = LLMResult<AnthropicEvent>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(bytes);
        while let Some(piece) = bytes.next().await {
            let piece = piece.map_err(LLMError::from)?;
            buffer.extend_from_slice(piece.as_ref());
            while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line);
                if let Some(event) = parse_sse_line(line.trim_end())? {
                    yield event;
                }
            }
        }
        let rest = String::from_utf8_lossy(&buffer).to_string();
        if let Some(event) = parse_sse_line(rest.trim_end())? {
            yield event;
        }
    }
}

fn cache_control() -> Value {
    json!({ "type": "ephemeral" })
}

/// Request body for the Messages API.
pub fn build_body(request: &ModelRequest, options: &AnthropicOptions) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(options.model));
    body.insert("max_tokens".into(), json!(options.max_tokens));
    body.insert("stream".into(), json!(request.stream));
    if let Some(temperature) = options.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if !request.stop.is_empty() {
        body.insert("stop_sequences".into(), json!(request.stop));
    }

    let system = request
        .messages
        .iter()
        .filter_map(|m| match m {
            Message::System { content } => Some(content.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if !system.is_empty() {
        let system = if options.cache_system_prompt {
            json!([{ "type": "text", "text": system, "cache_control": cache_control() }])
        } else {
            json!(system)
        };
        body.insert("system".into(), system);
    }

    if !request.tools.is_empty() {
        let mut tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters(),
                })
            })
            .collect();
        if options.cache_tools {
            if let Some(Value::Object(last)) = tools.last_mut() {
                last.insert("cache_control".into(), cache_control());
            }
        }
        body.insert("tools".into(), Value::Array(tools));
    }

    body.insert("messages".into(), Value::Array(convert_messages(&request.messages)));
    Value::Object(body)
}

/// Convert the transcript. Consecutive tool results are folded into one user
/// turn since the API requires user and assistant turns to alternate.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut converted: Vec<Value> = Vec::new();
    for message in messages {
        match message {
            Message::System { .. } => {}
            Message::User { content } => {
                converted.push(json!({ "role": "user", "content": user_content(content) }));
            }
            Message::Assistant { content, tool_calls } => {
                let mut blocks = Vec::new();
                if !content.is_empty() {
                    blocks.push(json!({ "type": "text", "text": content }));
                }
                for call in tool_calls {
                    let input: Value = serde_json::from_str(&call.arguments).unwrap_or_else(|err| {
                        warn!(tool = %call.name, error = %err, "sending unparsable tool arguments as empty input");
                        json!({})
                    });
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                converted.push(json!({ "role": "assistant", "content": blocks }));
            }
            Message::Tool { tool_call_id, content, .. } => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": content,
                });
                let previous_is_tool_turn = converted.last().is_some_and(|last| {
                    last["role"] == "user"
                        && last["content"]
                            .as_array()
                            .and_then(|blocks| blocks.first())
                            .is_some_and(|b| b["type"] == "tool_result")
                });
                if previous_is_tool_turn {
                    if let Some(blocks) = converted.last_mut().and_then(|last| last["content"].as_array_mut()) {
                        blocks.push(block);
                        continue;
                    }
                }
                converted.push(json!({ "role": "user", "content": [block] }));
            }
        }
    }
    converted
}

fn user_content(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => Value::Array(parts.iter().map(user_block).collect()),
    }
}

fn user_block(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
        ContentPart::Image { url, mime_type } => json!({ "type": "image", "source": media_source(url, mime_type.as_deref()) }),
        ContentPart::Document { url, mime_type } => json!({ "type": "document", "source": media_source(url, mime_type.as_deref()) }),
        other => json!({ "type": "text", "text": other.placeholder() }),
    }
}

/// `data:` URIs are sent inline as base64, anything else by URL.
fn media_source(url: &str, mime_type: Option<&str>) -> Value {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((meta, data)) = rest.split_once(',') {
            let media_type = meta.trim_end_matches(";base64");
            return json!({
                "type": "base64",
                "media_type": mime_type.unwrap_or(media_type),
                "data": data,
            });
        }
    }
    json!({ "type": "url", "url": url })
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, #[serde(default)] input: Value },
    #[serde(other)]
    Other,
}

impl From<MessagesResponse> for GenerateResult {
    fn from(response: MessagesResponse) -> Self {
        let mut generation = String::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ResponseBlock::Text { text } => generation.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => tool_calls.push(CallInfo {
                    id,
                    name,
                    arguments: input.to_string(),
                }),
                ResponseBlock::Other => {}
            }
        }
        GenerateResult {
            tokens: response.usage.into(),
            generation,
            tool_calls,
            finish_reason: response.stop_reason.as_deref().map(finish_reason_from_str),
        }
    }
}
