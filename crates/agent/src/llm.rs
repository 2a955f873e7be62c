use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use quotesmith_core::Role;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Schema the completion service is asked to fill through a tool call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub role: Role,
    pub model: String,
    pub system_prompt: String,
    pub task_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub schema: Option<ToolSchema>,
}

impl CompletionRequest {
    pub fn is_structured(&self) -> bool {
        self.schema.is_some()
    }
}

/// Undecoded model answer: prose, or the arguments of a tool call.
#[derive(Clone, Debug, PartialEq)]
pub enum RawModelOutput {
    Text(String),
    ToolCall(Value),
}

impl RawModelOutput {
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::ToolCall(Value::String(text)) => text.chars().count(),
            Self::ToolCall(value) => value.to_string().chars().count(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self { input_tokens, output_tokens }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionResponse {
    pub output: RawModelOutput,
    pub usage: TokenUsage,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    /// Issues exactly one request. Retrying is left to the caller.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[derive(Clone, Debug)]
pub enum ScriptedReply {
    Text(String),
    ToolCall(Value),
    Fail(LlmError),
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn delayed(delay: Duration, reply: ScriptedReply) -> Self {
        Self::Delay(delay, Box::new(reply))
    }
}

/// In-memory client that serves queued replies in order and records requests.
///
/// Once the queue is drained the fallback reply is served, or a transport
/// error when none was configured.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmClient {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(reply: ScriptedReply) -> Self {
        Self { fallback: Some(reply), ..Self::default() }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        match self.requests.lock() {
            Ok(requests) => requests.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let queued = match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        queued.or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let mut reply = self
            .next_reply()
            .ok_or_else(|| LlmError::Transport("no scripted reply queued".to_string()))?;

        loop {
            match reply {
                ScriptedReply::Delay(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                ScriptedReply::Text(text) => {
                    let usage = TokenUsage::new(
                        estimated_tokens(&request.task_prompt),
                        estimated_tokens(&text),
                    );
                    return Ok(CompletionResponse { output: RawModelOutput::Text(text), usage });
                }
                ScriptedReply::ToolCall(value) => {
                    let usage = TokenUsage::new(
                        estimated_tokens(&request.task_prompt),
                        estimated_tokens(&value.to_string()),
                    );
                    let output = RawModelOutput::ToolCall(value);
                    return Ok(CompletionResponse { output, usage });
                }
                ScriptedReply::Fail(error) => return Err(error),
            }
        }
    }
}

fn estimated_tokens(text: &str) -> u64 {
    u64::try_from(text.chars().count().div_ceil(4)).unwrap_or(u64::MAX)
}
