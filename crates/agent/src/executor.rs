use std::time::{Duration, Instant};

use quotesmith_core::{
    AgentError, InteractionLog, InteractionLogEntry, InvocationStrategy, OutputKeys, Role,
};
use tracing::{info, warn};

use crate::adapter::CompletionAdapter;
use crate::decoder::{self, DecodedResponse};
use crate::input::RoleInput;
use crate::llm::RawModelOutput;
use crate::prompts::{self, PromptLibrary};
use crate::registry::RoleRegistry;
use crate::strategy::select_strategy;

/// Result of one role execution that reached the completion service.
///
/// `decoded` may be a decode-failure mapping; only transport problems and
/// timeouts are returned as errors.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleOutcome {
    pub role: Role,
    pub decoded: DecodedResponse,
    pub strategy: InvocationStrategy,
    pub fallback_used: bool,
    pub elapsed: Duration,
}

pub struct RoleExecutor {
    registry: RoleRegistry,
    prompts: PromptLibrary,
    adapter: CompletionAdapter,
}

impl RoleExecutor {
    pub fn new(registry: RoleRegistry, prompts: PromptLibrary, adapter: CompletionAdapter) -> Self {
        Self { registry, prompts, adapter }
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn adapter(&self) -> &CompletionAdapter {
        &self.adapter
    }

    /// Runs `role` once and appends exactly one entry to `log`, whether the
    /// call succeeds, degrades or fails.
    ///
    /// A failed structured invocation is retried once in freeform before the
    /// error propagates.
    pub async fn execute_role(
        &self,
        role: Role,
        input: &RoleInput,
        log: &mut InteractionLog,
    ) -> Result<RoleOutcome, AgentError> {
        let config = self.registry.get(role);
        let strategy = select_strategy(role, input);
        let started = Instant::now();
        let mut entry = InteractionLogEntry::new(role, strategy, input.keys(), input.char_len());

        let attempt = match self.invoke(role, input, strategy).await {
            Err(error) if strategy == InvocationStrategy::Structured => {
                warn!(
                    event_name = "agent.role.structured_fallback",
                    role = %role,
                    error_class = error.error_class(),
                    error = %error,
                    "structured invocation failed, retrying freeform"
                );
                entry = entry.with_fallback(InvocationStrategy::Freeform);
                self.invoke(role, input, InvocationStrategy::Freeform).await
            }
            other => other,
        };

        let raw = match attempt {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "agent.role.failed",
                    role = %role,
                    error_class = error.error_class(),
                    error = %error,
                    "role invocation failed"
                );
                log.record(entry);
                return Err(error);
            }
        };

        let decoded = decoder::decode(config, &raw);
        if decoded.is_failure() {
            warn!(
                event_name = "agent.decode.failed",
                role = %role,
                output_chars = raw.char_len(),
                "model output could not be decoded"
            );
        } else if !decoded.missing_keys.is_empty() {
            warn!(
                event_name = "agent.decode.schema_drift",
                role = %role,
                missing_keys = ?decoded.missing_keys,
                "decoded output is missing required keys"
            );
        }

        let output_keys = if decoded.is_failure() {
            OutputKeys::Raw
        } else {
            OutputKeys::Decoded(decoded.fields.keys().cloned().collect())
        };
        let strategy = entry.strategy;
        let fallback_used = entry.fallback_used;
        log.record(entry.with_output(output_keys, raw.char_len(), !decoded.is_failure()));

        let elapsed = started.elapsed();
        info!(
            event_name = "agent.role.completed",
            role = %role,
            strategy = %strategy,
            fallback_used,
            decode_stage = decoded.stage.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "role execution completed"
        );

        Ok(RoleOutcome { role, decoded, strategy, fallback_used, elapsed })
    }

    async fn invoke(
        &self,
        role: Role,
        input: &RoleInput,
        strategy: InvocationStrategy,
    ) -> Result<RawModelOutput, AgentError> {
        let config = self.registry.get(role);
        let prompt = self.prompts.render(config, input, strategy)?;
        let schema = match strategy {
            InvocationStrategy::Structured => Some(prompts::tool_schema(role)),
            InvocationStrategy::Freeform => None,
        };
        self.adapter.invoke(config, &prompt, schema).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use quotesmith_core::config::AppConfig;
    use quotesmith_core::{AgentError, InteractionLog, InvocationStrategy, OutputKeys, Role};
    use serde_json::json;

    use super::RoleExecutor;
    use crate::adapter::CompletionAdapter;
    use crate::input::RoleInput;
    use crate::llm::{LlmError, ScriptedLlmClient, ScriptedReply};
    use crate::prompts::PromptLibrary;
    use crate::registry::RoleRegistry;

    fn executor(client: Arc<ScriptedLlmClient>, registry: RoleRegistry) -> RoleExecutor {
        let adapter = CompletionAdapter::new(client, registry.max_output_tokens());
        RoleExecutor::new(registry, PromptLibrary::new().expect("templates"), adapter)
    }

    fn default_registry() -> RoleRegistry {
        RoleRegistry::from_config(&AppConfig::default())
    }

    #[tokio::test]
    async fn malformed_output_is_a_value_not_an_error() {
        let client = Arc::new(ScriptedLlmClient::new([ScriptedReply::text("no json here")]));
        let executor = executor(client, default_registry());
        let mut log = InteractionLog::default();

        let outcome = executor
            .execute_role(Role::Orchestrator, &RoleInput::new().with("document", "hi"), &mut log)
            .await
            .expect("decode failures are not errors");

        assert!(outcome.decoded.is_failure());
        assert!(outcome.decoded.fields.contains_key("error"));
        let entry = log.last().expect("entry");
        assert!(!entry.success);
        assert_eq!(entry.output_keys, OutputKeys::Raw);
    }

    #[tokio::test]
    async fn structured_failure_falls_back_to_freeform_once() {
        let client = Arc::new(ScriptedLlmClient::new([
            ScriptedReply::Fail(LlmError::Api {
                status: 400,
                body: "tools unsupported".to_string(),
            }),
            ScriptedReply::text("{\"line_items\": [], \"confidence_score\": 0.4}"),
        ]));
        let executor = executor(client.clone(), default_registry());
        let mut log = InteractionLog::default();
        let input = RoleInput::new().with("document", "y".repeat(1500));

        let outcome =
            executor.execute_role(Role::Analyst, &input, &mut log).await.expect("fallback");

        assert!(outcome.fallback_used);
        assert_eq!(outcome.strategy, InvocationStrategy::Freeform);
        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].is_structured());
        assert!(!requests[1].is_structured());
        assert_eq!(log.len(), 1);
        assert!(log.last().map(|entry| entry.fallback_used).unwrap_or(false));
    }

    #[tokio::test]
    async fn freeform_failure_propagates_without_retry() {
        let client = Arc::new(ScriptedLlmClient::new([ScriptedReply::Fail(LlmError::Transport(
            "connection refused".to_string(),
        ))]));
        let executor = executor(client.clone(), default_registry());
        let mut log = InteractionLog::default();

        let result =
            executor.execute_role(Role::Orchestrator, &RoleInput::new(), &mut log).await;

        assert!(matches!(result, Err(AgentError::InvocationFailure { .. })));
        assert_eq!(client.call_count(), 1);
        assert_eq!(log.len(), 1);
        assert!(!log.entries()[0].success);
    }

    #[tokio::test]
    async fn timeout_surfaces_as_invocation_timeout() {
        let client = Arc::new(ScriptedLlmClient::new([ScriptedReply::delayed(
            Duration::from_millis(300),
            ScriptedReply::text("{}"),
        )]));
        let registry = default_registry().with_timeout(Role::Generator, Duration::from_millis(20));
        let executor = executor(client, registry);
        let mut log = InteractionLog::default();

        let result = executor
            .execute_role(
                Role::Generator,
                &RoleInput::new().with("confirmed_data", json!({})),
                &mut log,
            )
            .await;

        assert!(matches!(result, Err(AgentError::InvocationTimeout { role: Role::Generator, .. })));
    }

    #[tokio::test]
    async fn consecutive_executions_record_independent_entries() {
        let client = Arc::new(ScriptedLlmClient::new([
            ScriptedReply::text("{\"industry\": \"it\"}"),
            ScriptedReply::text("{\"industry\": \"retail\", \"complexity\": \"low\"}"),
        ]));
        let executor = executor(client, default_registry());
        let mut log = InteractionLog::default();
        let input = RoleInput::new().with("document", "doc");

        executor.execute_role(Role::Orchestrator, &input, &mut log).await.expect("first");
        executor.execute_role(Role::Orchestrator, &input, &mut log).await.expect("second");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].entry_id, entries[1].entry_id);
        assert_eq!(entries[0].output_keys.len(), 1);
        assert_eq!(entries[1].output_keys.len(), 2);
    }
}
