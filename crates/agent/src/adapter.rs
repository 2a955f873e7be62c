use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use quotesmith_core::{AgentError, Role, RoleConfig};
use serde::Serialize;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, RawModelOutput, ToolSchema};
use crate::prompts::RenderedPrompt;

const CHARS_PER_TOKEN: usize = 4;
/// Share of the prompt size added to the generator's output budget.
const GENERATOR_PROMPT_SHARE: u32 = 4;

/// Cumulative counters across every call made through one adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub failed_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Single-shot gateway to the completion service with a per-role deadline.
pub struct CompletionAdapter {
    client: Arc<dyn LlmClient>,
    max_output_tokens: u32,
    calls: AtomicU64,
    failed_calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl CompletionAdapter {
    pub fn new(client: Arc<dyn LlmClient>, max_output_tokens: u32) -> Self {
        Self {
            client,
            max_output_tokens,
            calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Issues exactly one request. A missed deadline is an `InvocationTimeout`;
    /// every other failure is an `InvocationFailure`.
    pub async fn invoke(
        &self,
        config: &RoleConfig,
        prompt: &RenderedPrompt,
        schema: Option<ToolSchema>,
    ) -> Result<RawModelOutput, AgentError> {
        let request = CompletionRequest {
            role: config.role,
            model: config.model.clone(),
            system_prompt: prompt.system.clone(),
            task_prompt: prompt.task.clone(),
            temperature: config.temperature,
            max_tokens: token_budget(config, prompt.char_len(), self.max_output_tokens),
            timeout: config.timeout,
            schema,
        };

        self.calls.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = tokio::time::timeout(config.timeout, self.client.complete(&request)).await;

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                return Err(map_llm_error(config, error));
            }
            Err(_) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_name = "agent.llm.timeout",
                    role = %config.role,
                    timeout_secs = config.timeout.as_secs_f64(),
                    "completion request exceeded its deadline"
                );
                return Err(AgentError::InvocationTimeout {
                    role: config.role,
                    timeout: config.timeout,
                });
            }
        };

        self.input_tokens.fetch_add(response.usage.input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(response.usage.output_tokens, Ordering::Relaxed);
        debug!(
            event_name = "agent.llm.completed",
            role = %config.role,
            provider = self.client.name(),
            model = %request.model,
            max_tokens = request.max_tokens,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion request finished"
        );

        Ok(response.output)
    }

    pub fn usage(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }
}

fn map_llm_error(config: &RoleConfig, error: LlmError) -> AgentError {
    warn!(
        event_name = "agent.llm.failed",
        role = %config.role,
        error = %error,
        "completion request failed"
    );
    match error {
        LlmError::Timeout => {
            AgentError::InvocationTimeout { role: config.role, timeout: config.timeout }
        }
        other => AgentError::InvocationFailure { role: config.role, message: other.to_string() },
    }
}

pub fn estimate_tokens(chars: usize) -> u32 {
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Output budget for one call: the role budget, raised for the generator by a
/// share of the prompt, never above `ceiling`.
pub fn token_budget(config: &RoleConfig, prompt_chars: usize, ceiling: u32) -> u32 {
    let need = match config.role {
        Role::Generator => {
            config.max_tokens.saturating_add(estimate_tokens(prompt_chars) / GENERATOR_PROMPT_SHARE)
        }
        Role::Orchestrator | Role::Analyst => config.max_tokens,
    };
    need.min(ceiling).max(1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use quotesmith_core::{AgentError, Role, RoleConfig};

    use super::{estimate_tokens, token_budget, CompletionAdapter};
    use crate::llm::{LlmError, RawModelOutput, ScriptedLlmClient, ScriptedReply};
    use crate::prompts::RenderedPrompt;

    fn config(role: Role, max_tokens: u32, timeout: Duration) -> RoleConfig {
        RoleConfig {
            role,
            template: role.as_str(),
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens,
            timeout,
            required_keys: role.required_keys(),
        }
    }

    fn prompt() -> RenderedPrompt {
        RenderedPrompt { system: "system".to_string(), task: "task".to_string() }
    }

    #[test]
    fn budget_grows_for_generator_and_respects_ceiling() {
        let generator = config(Role::Generator, 1000, Duration::from_secs(1));
        let analyst = config(Role::Analyst, 1000, Duration::from_secs(1));

        assert_eq!(estimate_tokens(8000), 2000);
        assert_eq!(token_budget(&analyst, 8000, 4096), 1000);
        assert_eq!(token_budget(&generator, 8000, 4096), 1500);
        assert_eq!(token_budget(&generator, 80_000, 4096), 4096);
    }

    #[tokio::test]
    async fn successful_call_accumulates_usage() {
        let client = Arc::new(ScriptedLlmClient::new([ScriptedReply::text("{\"a\": 1}")]));
        let adapter = CompletionAdapter::new(client.clone(), 8192);

        let output = adapter
            .invoke(&config(Role::Orchestrator, 256, Duration::from_secs(5)), &prompt(), None)
            .await;

        assert_eq!(output, Ok(RawModelOutput::Text("{\"a\": 1}".to_string())));
        let usage = adapter.usage();
        assert_eq!(usage.calls, 1);
        assert_eq!(usage.failed_calls, 0);
        assert!(usage.output_tokens > 0);
        assert_eq!(client.requests()[0].max_tokens, 256);
    }

    #[tokio::test]
    async fn slow_reply_becomes_invocation_timeout() {
        let client = Arc::new(ScriptedLlmClient::new([ScriptedReply::delayed(
            Duration::from_millis(500),
            ScriptedReply::text("{}"),
        )]));
        let adapter = CompletionAdapter::new(client, 8192);
        let role = config(Role::Analyst, 256, Duration::from_millis(20));

        let result = adapter.invoke(&role, &prompt(), None).await;

        assert!(matches!(result, Err(AgentError::InvocationTimeout { role: Role::Analyst, .. })));
        assert_eq!(adapter.usage().failed_calls, 1);
    }

    #[tokio::test]
    async fn provider_errors_map_by_kind() {
        let client = Arc::new(ScriptedLlmClient::new([
            ScriptedReply::Fail(LlmError::Api { status: 401, body: "bad key".to_string() }),
            ScriptedReply::Fail(LlmError::Timeout),
        ]));
        let adapter = CompletionAdapter::new(client, 8192);
        let role = config(Role::Generator, 256, Duration::from_secs(5));

        let first = adapter.invoke(&role, &prompt(), None).await;
        assert!(matches!(first, Err(AgentError::InvocationFailure { .. })));

        let second = adapter.invoke(&role, &prompt(), None).await;
        assert!(matches!(second, Err(AgentError::InvocationTimeout { .. })));
        assert_eq!(adapter.usage().calls, 2);
    }
}
