use std::time::Duration;

use thiserror::Error;

use crate::domain::role::Role;

/// Failures a role execution can surface to its caller.
///
/// Malformed model output is not represented here; the decoder turns it into a
/// degraded result value instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("{role} invocation timed out after {}s", .timeout.as_secs())]
    InvocationTimeout { role: Role, timeout: Duration },
    #[error("{role} invocation failed: {message}")]
    InvocationFailure { role: Role, message: String },
    #[error("{operation} requires a completed analysis in the project context")]
    MissingContext { operation: &'static str },
    #[error("{role} prompt could not be rendered: {message}")]
    PromptRender { role: Role, message: String },
}

impl AgentError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InvocationTimeout { .. } => "invocation_timeout",
            Self::InvocationFailure { .. } => "invocation_failure",
            Self::MissingContext { .. } => "missing_context",
            Self::PromptRender { .. } => "prompt_render",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvocationTimeout { .. } => {
                "The AI service took too long to respond. Please retry shortly."
            }
            Self::InvocationFailure { .. } => {
                "The AI service is temporarily unavailable. Please retry shortly."
            }
            Self::MissingContext { .. } => {
                "No analysis is available for this project. Analyze a document first."
            }
            Self::PromptRender { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::InvocationTimeout { role, .. }
            | Self::InvocationFailure { role, .. }
            | Self::PromptRender { role, .. } => Some(*role),
            Self::MissingContext { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::role::Role;
    use crate::errors::AgentError;

    #[test]
    fn timeout_message_names_role_and_budget() {
        let error =
            AgentError::InvocationTimeout { role: Role::Analyst, timeout: Duration::from_secs(90) };

        assert_eq!(error.to_string(), "analyst invocation timed out after 90s");
        assert_eq!(error.error_class(), "invocation_timeout");
        assert_eq!(error.role(), Some(Role::Analyst));
    }

    #[test]
    fn missing_context_has_user_safe_message() {
        let error = AgentError::MissingContext { operation: "generate_quote" };

        assert_eq!(error.error_class(), "missing_context");
        assert!(error.to_string().starts_with("generate_quote requires"));
        assert_eq!(
            error.user_message(),
            "No analysis is available for this project. Analyze a document first."
        );
        assert_eq!(error.role(), None);
    }

    #[test]
    fn failure_carries_transport_message() {
        let error = AgentError::InvocationFailure {
            role: Role::Generator,
            message: "api error (401): invalid key".to_string(),
        };

        assert_eq!(error.to_string(), "generator invocation failed: api error (401): invalid key");
        assert_eq!(
            error.user_message(),
            "The AI service is temporarily unavailable. Please retry shortly."
        );
    }
}
