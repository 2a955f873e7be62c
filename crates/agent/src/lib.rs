//! Multi-role orchestration engine for the quoting pipeline.
//!
//! A session moves through two phases:
//! 1. **Analysis** (`AgentRuntime::analyze_and_extract`) - the orchestrator
//!    classifies the document, then the analyst extracts client, project and
//!    line-item data.
//! 2. **Quote generation** (`AgentRuntime::generate_quote`) - the generator
//!    drafts a proposal from the accumulated context and confirmed data.
//!
//! Each role execution renders a prompt (`prompts`), picks an invocation
//! strategy (`strategy`), makes one completion call (`adapter`), and decodes
//! the answer (`decoder`). Results are shaped into stable envelopes by
//! `formatter`.
//!
//! # Failure model
//!
//! Malformed model output is a degraded value, never an error. Timeouts and
//! transport failures propagate out of `RoleExecutor::execute_role` and are
//! turned into error-status envelopes at the phase boundary, so phase calls
//! always return an envelope.
//!
//! The model never decides totals on its own: missing totals are computed
//! from line items and the pricing configuration.

pub mod adapter;
pub mod decoder;
pub mod executor;
pub mod formatter;
pub mod input;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod strategy;

pub use adapter::{CompletionAdapter, UsageSnapshot};
pub use decoder::{DecodeStage, DecodedResponse};
pub use executor::{RoleExecutor, RoleOutcome};
pub use input::RoleInput;
pub use llm::{LlmClient, LlmError, ScriptedLlmClient, ScriptedReply};
pub use providers::HttpLlmClient;
pub use registry::RoleRegistry;
pub use runtime::{AgentRuntime, AgentStatus};
pub use strategy::select_strategy;
