//! HTTP completion clients.
//!
//! `openai` and `ollama` share the OpenAI-compatible chat completions wire
//! format. `anthropic` uses the messages API. Structured invocations are sent
//! as a single forced tool call in both formats.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use quotesmith_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, RawModelOutput, TokenUsage,
};

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_DEFAULT_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WireFormat {
    ChatCompletions,
    Messages,
}

pub struct HttpLlmClient {
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    http: reqwest::Client,
}

impl fmt::Debug for HttpLlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLlmClient")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(format!("failed to build http client: {error}")))?;

        Ok(Self {
            provider: config.provider,
            endpoint: endpoint_for(config.provider, config.base_url.as_deref()),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn wire_format(&self) -> WireFormat {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Ollama => WireFormat::ChatCompletions,
            LlmProvider::Anthropic => WireFormat::Messages,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn name(&self) -> &str {
        match self.provider {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let format = self.wire_format();
        let body = match format {
            WireFormat::ChatCompletions => chat_completions_body(request),
            WireFormat::Messages => messages_body(request),
        };

        let mut builder = self.http.post(&self.endpoint).timeout(request.timeout).json(&body);
        if let Some(key) = &self.api_key {
            builder = match format {
                WireFormat::ChatCompletions => builder.bearer_auth(key.expose_secret()),
                WireFormat::Messages => builder
                    .header("x-api-key", key.expose_secret())
                    .header("anthropic-version", ANTHROPIC_VERSION),
            };
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let payload = response.json::<Value>().await.map_err(transport_error)?;
        match format {
            WireFormat::ChatCompletions => parse_chat_completions(payload),
            WireFormat::Messages => parse_messages(payload),
        }
    }
}

fn transport_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout
    } else if error.is_decode() {
        LlmError::MalformedResponse(error.to_string())
    } else {
        LlmError::Transport(error.to_string())
    }
}

pub fn endpoint_for(provider: LlmProvider, base_url: Option<&str>) -> String {
    let base = |default: &str| base_url.unwrap_or(default).trim_end_matches('/').to_string();
    match provider {
        LlmProvider::OpenAi => format!("{}/chat/completions", base(OPENAI_DEFAULT_BASE)),
        LlmProvider::Ollama => format!("{}/v1/chat/completions", base("http://localhost:11434")),
        LlmProvider::Anthropic => format!("{}/v1/messages", base(ANTHROPIC_DEFAULT_BASE)),
    }
}

pub fn chat_completions_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.task_prompt},
        ],
    });

    if let Some(schema) = &request.schema {
        body["tools"] = json!([{
            "type": "function",
            "function": {
                "name": schema.name,
                "description": schema.description,
                "parameters": schema.parameters,
            }
        }]);
        body["tool_choice"] = json!({"type": "function", "function": {"name": schema.name}});
    }

    body
}

pub fn messages_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "system": request.system_prompt,
        "messages": [{"role": "user", "content": request.task_prompt}],
    });

    if let Some(schema) = &request.schema {
        body["tools"] = json!([{
            "name": schema.name,
            "description": schema.description,
            "input_schema": schema.parameters,
        }]);
        body["tool_choice"] = json!({"type": "tool", "name": schema.name});
    }

    body
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub fn parse_chat_completions(payload: Value) -> Result<CompletionResponse, LlmError> {
    let completion: ChatCompletion = serde_json::from_value(payload)
        .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
    let usage = completion
        .usage
        .map(|usage| TokenUsage::new(usage.prompt_tokens, usage.completion_tokens))
        .unwrap_or_default();

    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| LlmError::MalformedResponse("response carried no choices".to_string()))?;

    // Arguments arrive as a JSON-encoded string; the decoder handles both forms.
    let output = match message.tool_calls.into_iter().next() {
        Some(call) => RawModelOutput::ToolCall(call.function.arguments),
        None => RawModelOutput::Text(message.content.unwrap_or_default()),
    };

    Ok(CompletionResponse { output, usage })
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { input: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub fn parse_messages(payload: Value) -> Result<CompletionResponse, LlmError> {
    let response: MessagesResponse = serde_json::from_value(payload)
        .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
    let usage = response
        .usage
        .map(|usage| TokenUsage::new(usage.input_tokens, usage.output_tokens))
        .unwrap_or_default();

    let mut text = String::new();
    for block in response.content {
        match block {
            ContentBlock::ToolUse { input } => {
                return Ok(CompletionResponse { output: RawModelOutput::ToolCall(input), usage });
            }
            ContentBlock::Text { text: chunk } => text.push_str(&chunk),
            ContentBlock::Other => {}
        }
    }

    Ok(CompletionResponse { output: RawModelOutput::Text(text), usage })
}
