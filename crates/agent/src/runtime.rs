use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use quotesmith_core::config::AppConfig;
use quotesmith_core::{
    AgentError, ExtractionEnvelope, InteractionLogEntry, QuoteEnvelope, Role, SessionId,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::adapter::{CompletionAdapter, UsageSnapshot};
use crate::executor::RoleExecutor;
use crate::formatter::{self, RunFacts};
use crate::input::RoleInput;
use crate::llm::LlmClient;
use crate::prompts::PromptLibrary;
use crate::providers::HttpLlmClient;
use crate::registry::RoleRegistry;
use crate::session::SessionStore;

const ANALYZE_AND_EXTRACT: &str = "analyze_and_extract";
const GENERATE_QUOTE: &str = "generate_quote";

/// Point-in-time view of one session, for dashboards and health checks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentStatus {
    pub session_id: SessionId,
    /// `active` once the session holds any context, `inactive` otherwise.
    pub status: &'static str,
    pub available_roles: Vec<Role>,
    pub analysis_completed: bool,
    pub quote_completed: bool,
    pub industry: Option<String>,
    pub complexity: Option<String>,
    pub interactions: usize,
    pub provider: String,
}

/// Runs the two phases for any number of sessions.
///
/// Each phase locks its session for the whole run, so roles of one session
/// execute strictly in order while other sessions proceed independently.
pub struct AgentRuntime {
    executor: RoleExecutor,
    sessions: SessionStore,
}

impl AgentRuntime {
    pub fn new(registry: RoleRegistry, client: Arc<dyn LlmClient>) -> Result<Self> {
        let prompts = PromptLibrary::new().context("failed to compile role prompt templates")?;
        let adapter = CompletionAdapter::new(client, registry.max_output_tokens());
        Ok(Self {
            executor: RoleExecutor::new(registry, prompts, adapter),
            sessions: SessionStore::default(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = HttpLlmClient::from_config(&config.llm)
            .context("failed to construct completion client")?;
        Self::new(RoleRegistry::from_config(config), Arc::new(client))
    }

    pub fn registry(&self) -> &RoleRegistry {
        self.executor.registry()
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.executor.adapter().usage()
    }

    /// Orchestrator then analyst. Never fails; problems come back as an
    /// error-status envelope and leave the session without an analysis.
    pub async fn analyze_and_extract(
        &self,
        session_id: &SessionId,
        document: &str,
        metadata: Map<String, Value>,
    ) -> ExtractionEnvelope {
        let session = self.sessions.session(session_id).await;
        let mut session = session.lock().await;
        let document_chars = document.chars().count();
        let started = Instant::now();
        info!(
            event_name = "agent.phase.started",
            session_id = %session_id,
            phase = ANALYZE_AND_EXTRACT,
            document_chars,
            "analysis phase started"
        );

        let orchestrator_input = RoleInput::new()
            .with("document", document)
            .with("metadata", Value::Object(metadata.clone()));
        let orchestrator = match self
            .executor
            .execute_role(Role::Orchestrator, &orchestrator_input, &mut session.history)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                session.context.clear();
                return phase_failed(session_id, ANALYZE_AND_EXTRACT, &error, || {
                    formatter::extraction_failure(&error, document_chars)
                });
            }
        };

        let analyst_input = RoleInput::new()
            .with("document", document)
            .with("orchestrator_result", Value::Object(orchestrator.decoded.fields.clone()))
            .with("metadata", Value::Object(metadata.clone()));
        let analyst = match self
            .executor
            .execute_role(Role::Analyst, &analyst_input, &mut session.history)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                session.context.clear();
                return phase_failed(session_id, ANALYZE_AND_EXTRACT, &error, || {
                    formatter::extraction_failure(&error, document_chars)
                });
            }
        };

        let elapsed = started.elapsed();
        if analyst.decoded.is_failure() {
            session.context.clear();
        } else {
            session.context.record_analysis(
                document.to_string(),
                metadata,
                orchestrator.decoded.fields.clone(),
                analyst.decoded.fields.clone(),
                elapsed,
            );
        }

        let facts = RunFacts {
            strategy: analyst.strategy,
            fallback_used: analyst.fallback_used,
            elapsed,
            completed_at: session.context.analysis_completed_at.unwrap_or_else(Utc::now),
        };
        let envelope = formatter::extraction_envelope(
            &orchestrator.decoded.fields,
            &analyst.decoded,
            document_chars,
            &facts,
        );

        info!(
            event_name = "agent.phase.completed",
            session_id = %session_id,
            phase = ANALYZE_AND_EXTRACT,
            success = envelope.is_success(),
            ready_for_review = envelope.ready_for_review,
            confidence_score = envelope.confidence_score,
            elapsed_ms = elapsed.as_millis() as u64,
            "analysis phase completed"
        );
        envelope
    }

    /// Generator over the accumulated context. Fails fast, without calling
    /// the completion service, when the session has no analysis.
    pub async fn generate_quote(
        &self,
        session_id: &SessionId,
        confirmed_data: Map<String, Value>,
        pricing_config: Map<String, Value>,
    ) -> QuoteEnvelope {
        let missing = AgentError::MissingContext { operation: GENERATE_QUOTE };
        let Some(session) = self.sessions.existing(session_id).await else {
            return phase_failed(session_id, GENERATE_QUOTE, &missing, || {
                formatter::quote_failure(&missing)
            });
        };
        let mut session = session.lock().await;
        if !session.context.has_analysis() {
            return phase_failed(session_id, GENERATE_QUOTE, &missing, || {
                formatter::quote_failure(&missing)
            });
        }

        let started = Instant::now();
        info!(
            event_name = "agent.phase.started",
            session_id = %session_id,
            phase = GENERATE_QUOTE,
            "quote phase started"
        );

        let input = RoleInput::new()
            .with("project_context", Value::Object(session.context.snapshot()))
            .with("confirmed_data", Value::Object(confirmed_data.clone()))
            .with("pricing_config", Value::Object(pricing_config.clone()));
        let generator = match self
            .executor
            .execute_role(Role::Generator, &input, &mut session.history)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                return phase_failed(session_id, GENERATE_QUOTE, &error, || {
                    formatter::quote_failure(&error)
                })
            }
        };

        let elapsed = started.elapsed();
        if generator.decoded.is_failure() {
            session.context.discard_quote();
        } else {
            session.context.record_quote(generator.decoded.fields.clone(), elapsed);
        }

        let facts = RunFacts {
            strategy: generator.strategy,
            fallback_used: generator.fallback_used,
            elapsed,
            completed_at: session.context.quote_completed_at.unwrap_or_else(Utc::now),
        };
        let envelope =
            formatter::quote_envelope(&generator.decoded, &confirmed_data, &pricing_config, &facts);

        info!(
            event_name = "agent.phase.completed",
            session_id = %session_id,
            phase = GENERATE_QUOTE,
            success = envelope.is_success(),
            elapsed_ms = elapsed.as_millis() as u64,
            "quote phase completed"
        );
        envelope
    }

    /// Read-only snapshot; empty for unknown or cleared sessions.
    pub async fn get_project_context(&self, session_id: &SessionId) -> Map<String, Value> {
        match self.sessions.existing(session_id).await {
            Some(session) => session.lock().await.context.snapshot(),
            None => Map::new(),
        }
    }

    /// Resets the project context. The interaction history is kept.
    pub async fn clear_project_context(&self, session_id: &SessionId) {
        if let Some(session) = self.sessions.existing(session_id).await {
            session.lock().await.context.clear();
            info!(
                event_name = "agent.context.cleared",
                session_id = %session_id,
                "project context cleared"
            );
        }
    }

    pub async fn get_interaction_history(
        &self,
        session_id: &SessionId,
    ) -> Vec<InteractionLogEntry> {
        match self.sessions.existing(session_id).await {
            Some(session) => session.lock().await.history.entries(),
            None => Vec::new(),
        }
    }

    pub async fn get_agent_status(&self, session_id: &SessionId) -> AgentStatus {
        let mut status = AgentStatus {
            session_id: session_id.clone(),
            status: "inactive",
            available_roles: Role::ALL.to_vec(),
            analysis_completed: false,
            quote_completed: false,
            industry: None,
            complexity: None,
            interactions: 0,
            provider: self.executor.adapter().client_name().to_string(),
        };

        if let Some(session) = self.sessions.existing(session_id).await {
            let session = session.lock().await;
            let context = &session.context;
            if !context.is_empty() {
                status.status = "active";
            }
            status.analysis_completed = context.has_analysis();
            status.quote_completed = context.has_quote();
            status.industry = context.industry().map(str::to_string);
            status.complexity = context.complexity().map(str::to_string);
            status.interactions = session.history.len();
        }

        status
    }

    /// Drops the session, its context and its history.
    pub async fn end_session(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).await
    }
}

fn phase_failed<T>(
    session_id: &SessionId,
    phase: &'static str,
    error: &AgentError,
    envelope: impl FnOnce() -> T,
) -> T {
    warn!(
        event_name = "agent.phase.failed",
        session_id = %session_id,
        phase,
        error_class = error.error_class(),
        error = %error,
        "phase failed"
    );
    envelope()
}
