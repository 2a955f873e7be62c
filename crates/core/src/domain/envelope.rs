//! Fixed-shape response envelopes returned by the two phase operations.
//!
//! Both envelopes serialize every declared key whether the phase succeeded or
//! failed. Failure fills the same keys with defaults and sets `error_details`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::role::Role;
use crate::errors::AgentError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Caller-facing failure summary. Transport details stay in the logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub kind: String,
    pub message: String,
    pub role: Option<Role>,
}

impl ErrorDetails {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), role: None }
    }

    pub fn for_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

impl From<&AgentError> for ErrorDetails {
    fn from(error: &AgentError) -> Self {
        Self {
            kind: error.error_class().to_string(),
            message: error.user_message().to_string(),
            role: error.role(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEnvelope {
    pub status: EnvelopeStatus,
    pub extracted_data: Map<String, Value>,
    pub suggestions: Vec<String>,
    pub ready_for_review: bool,
    pub confidence_score: f64,
    pub quality_score: f64,
    pub analysis_metadata: Map<String, Value>,
    pub error_details: Option<ErrorDetails>,
}

impl ExtractionEnvelope {
    pub const KEYS: [&'static str; 8] = [
        "status",
        "extracted_data",
        "suggestions",
        "ready_for_review",
        "confidence_score",
        "quality_score",
        "analysis_metadata",
        "error_details",
    ];

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteEnvelope {
    pub status: EnvelopeStatus,
    pub quote: Map<String, Value>,
    pub metadata: Map<String, Value>,
    pub error_details: Option<ErrorDetails>,
}

impl QuoteEnvelope {
    pub const KEYS: [&'static str; 4] = ["status", "quote", "metadata", "error_details"];

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::{EnvelopeStatus, ErrorDetails, ExtractionEnvelope, QuoteEnvelope};
    use crate::domain::role::Role;
    use crate::errors::AgentError;

    #[test]
    fn extraction_envelope_serializes_every_key_even_without_error() {
        let envelope = ExtractionEnvelope {
            status: EnvelopeStatus::Success,
            extracted_data: Map::new(),
            suggestions: Vec::new(),
            ready_for_review: false,
            confidence_score: 0.0,
            quality_score: 0.0,
            analysis_metadata: Map::new(),
            error_details: None,
        };

        let value = serde_json::to_value(&envelope).unwrap_or(Value::Null);
        for key in ExtractionEnvelope::KEYS {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["status"], "success");
        assert!(value["error_details"].is_null());
    }

    #[test]
    fn quote_envelope_serializes_error_details() {
        let envelope = QuoteEnvelope {
            status: EnvelopeStatus::Error,
            quote: Map::new(),
            metadata: Map::new(),
            error_details: Some(ErrorDetails::new("missing_context", "analyze first")),
        };

        let value = serde_json::to_value(&envelope).unwrap_or(Value::Null);
        for key in QuoteEnvelope::KEYS {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["error_details"]["kind"], "missing_context");
        assert!(value["error_details"]["role"].is_null());
    }

    #[test]
    fn agent_errors_map_to_user_facing_details() {
        let error = AgentError::InvocationFailure {
            role: Role::Analyst,
            message: "api error (500): {\"internal\": \"stack trace\"}".to_string(),
        };

        let details = ErrorDetails::from(&error);

        assert_eq!(details.kind, "invocation_failure");
        assert_eq!(details.message, error.user_message());
        assert!(!details.message.contains("stack trace"));
        assert_eq!(details.role, Some(Role::Analyst));
    }
}
