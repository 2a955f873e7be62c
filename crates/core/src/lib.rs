pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;

pub use audit::{InteractionLog, InteractionLogEntry, OutputKeys, INTERACTION_LOG_CAPACITY};
pub use domain::context::ProjectContext;
pub use domain::envelope::{EnvelopeStatus, ErrorDetails, ExtractionEnvelope, QuoteEnvelope};
pub use domain::role::{InvocationStrategy, Role, RoleConfig};
pub use domain::session::SessionId;
pub use errors::AgentError;
