// 参考：https://github.com/64bit/async-openai/blob/main/examples/tool-call-stream/src/main.rs
pub use async_openai::{
    Client, config::{Config, OpenAIConfig}
};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    ChatCompletionStreamOptions, ChatCompletionTool, ChatCompletionToolArgs,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse, FunctionCall, FunctionObjectArgs, ImageUrl, Stop,
};
use serde::{Serialize, Deserialize};
use futures::{
    FutureExt,
    StreamExt,
    future::BoxFuture,
};
use tracing::debug;

use crate::config::{env_var, ConfigError};
use crate::message::{ContentPart, Message, MessageContent};
use crate::tools::schema::ToolSchema;
use crate::llm::{
    traits::LLM,
    error::LLMError,
    dialect::{normalize_stream, openai as dialect, OpenAIDialect},
    CallInfo,
    GenerateResult,
    LLMResult,
    ModelRequest,
    ModelResponse,
};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// A unique identifier representing your end-user, which will help OpenAI to monitor and detect abuse. [Learn more](https://platform.openai.com/docs/usage-policies/end-user-ids).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            user: None,
        }
    }
}

/// Chat completions over any OpenAI-compatible endpoint.
pub struct OpenAI {
    pub client: Client<OpenAIConfig>,
    pub options: CompletionOptions,
}

impl OpenAI {
    /// Client configured from `OPENAI_API_KEY` / `OPENAI_BASE_URL` by async-openai.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            options: CompletionOptions::default(),
        }
    }

    /// Like [`OpenAI::new`] but fails early when no key is configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_var("OPENAI_API_KEY")?;
        Ok(Self::with_api_key(api_key))
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            options: CompletionOptions::default(),
        }
    }

    /// Point the client at another OpenAI-compatible base URL.
    pub fn with_api_base(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.options.model = model.into();
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn build_request(&self, request: &ModelRequest) -> LLMResult<CreateChatCompletionRequest> {
        let messages = request
            .messages
            .iter()
            .map(to_request_message)
            .collect::<LLMResult<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.options.model.clone()).messages(messages);

        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(to_tool)
                .collect::<LLMResult<Vec<_>>>()?;
            args.tools(tools);
        }
        if !request.stop.is_empty() {
            args.stop(Stop::StringArray(request.stop.clone()));
        }
        if let Some(max_tokens) = self.options.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        if let Some(temperature) = self.options.temperature {
            args.temperature(temperature);
        }
        if let Some(user) = &self.options.user {
            args.user(user.clone());
        }
        if request.stream {
            args.stream(true)
                .stream_options(ChatCompletionStreamOptions { include_usage: true });
        }

        Ok(args.build()?)
    }
}

impl Default for OpenAI {
    fn default() -> Self {
        Self::new()
    }
}

fn to_request_message(message: &Message) -> LLMResult<ChatCompletionRequestMessage> {
    let converted: ChatCompletionRequestMessage = match message {
        Message::System { content } => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()?
            .into(),
        Message::User { content: MessageContent::Text(text) } => {
            ChatCompletionRequestUserMessageArgs::default()
                .content(text.clone())
                .build()?
                .into()
        }
        Message::User { content: MessageContent::Parts(parts) } => {
            let parts = parts.iter().map(to_user_part).collect();
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(parts))
                .build()?
                .into()
        }
        Message::Assistant { content, tool_calls } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !content.is_empty() {
                args.content(content.clone());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build()?.into()
        }
        Message::Tool { tool_call_id, content, .. } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(tool_call_id.clone())
            .content(content.clone())
            .build()?
            .into(),
    };
    Ok(converted)
}

fn to_user_part(part: &ContentPart) -> ChatCompletionRequestUserMessageContentPart {
    match part {
        ContentPart::Text { text } => ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text: text.clone() },
        ),
        ContentPart::Image { url, .. } => ChatCompletionRequestUserMessageContentPart::ImageUrl(
            ChatCompletionRequestMessageContentPartImage {
                image_url: ImageUrl { url: url.clone(), detail: None },
            },
        ),
        other => ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text: other.placeholder().to_string() },
        ),
    }
}

fn to_tool(schema: &ToolSchema) -> LLMResult<ChatCompletionTool> {
    let function = FunctionObjectArgs::default()
        .name(schema.name.clone())
        .description(schema.description.clone())
        .parameters(schema.parameters())
        .build()?;
    Ok(ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(function)
        .build()?)
}

fn generate_result(response: CreateChatCompletionResponse) -> GenerateResult {
    let tokens = response.usage.as_ref().map(dialect::usage_from).unwrap_or_default();
    let Some(choice) = response.choices.into_iter().next() else {
        return GenerateResult { tokens, ..GenerateResult::default() };
    };
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| CallInfo {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();
    GenerateResult {
        tokens,
        generation: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason: choice.finish_reason.map(dialect::finish_reason),
    }
}

impl LLM for OpenAI {
    fn invoke<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, LLMResult<ModelResponse<'a>>> {
        async move {
            let body = self.build_request(request)?;
            debug!(
                model = %self.options.model,
                messages = request.messages.len(),
                tools = request.tools.len(),
                stream = request.stream,
                "sending chat completion request"
            );

            if request.stream {
                let upstream = self.client.chat().create_stream(body).await?;
                let native = upstream.map(|item| item.map_err(LLMError::from));
                Ok(ModelResponse::Stream(normalize_stream(OpenAIDialect, native)))
            } else {
                let response = self.client.chat().create(body).await?;
                Ok(ModelResponse::Complete(generate_result(response)))
            }
        }
        .boxed()
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}
