use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Closed set of agent roles. Each phase runs one or more of these in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Orchestrator,
    Analyst,
    Generator,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Orchestrator, Role::Analyst, Role::Generator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Analyst => "analyst",
            Self::Generator => "generator",
        }
    }

    /// Top-level keys the role's response is expected to carry.
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Orchestrator => {
                &["document_type", "industry", "complexity", "key_topics", "recommended_approach"]
            }
            Self::Analyst => &[
                "client_info",
                "project_info",
                "line_items",
                "requirements",
                "confidence_score",
                "missing_information",
            ],
            Self::Generator => &["title", "line_items", "totals", "terms", "timeline", "summary"],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "orchestrator" => Ok(Self::Orchestrator),
            "analyst" => Ok(Self::Analyst),
            "generator" => Ok(Self::Generator),
            other => Err(format!(
                "unknown role `{other}` (expected orchestrator|analyst|generator)"
            )),
        }
    }
}

/// How a role asks the completion service for its answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStrategy {
    /// The service fills a fixed schema through a tool call.
    Structured,
    /// The service returns prose expected to embed a JSON object.
    Freeform,
}

impl InvocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Freeform => "freeform",
        }
    }
}

impl fmt::Display for InvocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-role settings resolved once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleConfig {
    pub role: Role,
    pub template: &'static str,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub required_keys: &'static [&'static str],
}

impl RoleConfig {
    pub fn missing_keys<'a, I>(&self, present: I) -> Vec<&'static str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let present = present.into_iter().map(String::as_str).collect::<Vec<_>>();
        self.required_keys.iter().copied().filter(|key| !present.contains(key)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Role, RoleConfig};

    #[test]
    fn role_names_round_trip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("pricing".parse::<Role>().is_err());
    }

    #[test]
    fn missing_keys_preserve_declared_order() {
        let config = RoleConfig {
            role: Role::Orchestrator,
            template: "orchestrator",
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 100,
            timeout: Duration::from_secs(5),
            required_keys: Role::Orchestrator.required_keys(),
        };
        let present = vec!["industry".to_string(), "key_topics".to_string()];

        assert_eq!(
            config.missing_keys(&present),
            vec!["document_type", "complexity", "recommended_approach"]
        );
    }
}
