//! Role prompt templates and structured-output schemas.
//!
//! Each role registers a `<role>.system` and a `<role>.task` template. Task
//! templates receive the role input fields pre-serialized as strings, so a
//! missing field renders as an empty section instead of failing.

use quotesmith_core::{AgentError, InvocationStrategy, Role, RoleConfig};
use serde_json::{json, Value};
use tera::{Context, Tera};

use crate::input::RoleInput;
use crate::llm::ToolSchema;

const TEMPLATE_FIELDS: [&str; 6] =
    [
        "document",
        "metadata",
        "orchestrator_result",
        "project_context",
        "confirmed_data",
        "pricing_config",
    ];

const ORCHESTRATOR_SYSTEM: &str = "You coordinate a quoting team. Read the incoming business \
document, classify it, and decide how the analyst should approach it. Be brief and factual.";

const ORCHESTRATOR_TASK: &str = r#"Classify the following document for quoting.
{% if metadata %}
Context supplied by the requester:
{{ metadata }}
{% endif %}
Document:
"""
{{ document }}
"""
{% if not structured %}
Respond with a single JSON object containing the keys: {{ required_keys }}.
Use "low", "medium" or "high" for complexity.
{% endif %}"#;

const ANALYST_SYSTEM: &str = "You extract quoting data from business documents. Only report \
what the document states or clearly implies; list anything you could not find as missing \
information instead of guessing.";

const ANALYST_TASK: &str = r#"Extract the client, project and billable line items from the document.
{% if orchestrator_result %}
Triage notes from the orchestrator:
{{ orchestrator_result }}
{% endif %}{% if metadata %}
Context supplied by the requester:
{{ metadata }}
{% endif %}
Document:
"""
{{ document }}
"""
{% if structured %}
Record the extraction with the provided tool.
{% else %}
Respond with a single JSON object containing the keys: {{ required_keys }}.
Set confidence_score between 0 and 1.
{% endif %}"#;

const GENERATOR_SYSTEM: &str = "You write professional commercial quotes. Use the confirmed data \
as the source of truth and the pricing configuration for rates, currency and taxes. Never invent \
discounts.";

const GENERATOR_TASK: &str = r#"Prepare a quote proposal.

Project context:
{{ project_context }}

Confirmed data:
{{ confirmed_data }}
{% if pricing_config %}
Pricing configuration:
{{ pricing_config }}
{% endif %}
Respond with a single JSON object containing the keys: {{ required_keys }}.
Each line item needs description, quantity, unit_price and total.
totals needs subtotal, tax, total and currency."#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub task: String,
}

impl RenderedPrompt {
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.task.chars().count()
    }
}

#[derive(Debug)]
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("orchestrator.system", ORCHESTRATOR_SYSTEM),
            ("orchestrator.task", ORCHESTRATOR_TASK),
            ("analyst.system", ANALYST_SYSTEM),
            ("analyst.task", ANALYST_TASK),
            ("generator.system", GENERATOR_SYSTEM),
            ("generator.task", GENERATOR_TASK),
        ])?;
        Ok(Self { tera })
    }

    pub fn template_name(role: Role) -> &'static str {
        role.as_str()
    }

    pub fn render(
        &self,
        config: &RoleConfig,
        input: &RoleInput,
        strategy: InvocationStrategy,
    ) -> Result<RenderedPrompt, AgentError> {
        let mut context = Context::new();
        for field in TEMPLATE_FIELDS {
            context.insert(field, &template_value(input.get(field)));
        }
        context.insert("required_keys", &config.required_keys.join(", "));
        context.insert("structured", &(strategy == InvocationStrategy::Structured));

        let render = |suffix: &str| {
            self.tera.render(&format!("{}.{suffix}", config.template), &context).map_err(|error| {
                AgentError::PromptRender { role: config.role, message: error.to_string() }
            })
        };

        Ok(RenderedPrompt { system: render("system")?, task: render("task")? })
    }
}

fn template_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) if map.is_empty() => String::new(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Tool schema the completion service fills when `role` is invoked structurally.
pub fn tool_schema(role: Role) -> ToolSchema {
    match role {
        Role::Orchestrator => ToolSchema {
            name: "record_triage".to_string(),
            description: "Record the document classification".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "document_type": {"type": "string"},
                    "industry": {"type": "string"},
                    "complexity": {"type": "string", "enum": ["low", "medium", "high"]},
                    "key_topics": {"type": "array", "items": {"type": "string"}},
                    "recommended_approach": {"type": "string"}
                },
                "required": Role::Orchestrator.required_keys(),
            }),
        },
        Role::Analyst => ToolSchema {
            name: "record_extraction".to_string(),
            description: "Record the quoting data extracted from the document".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "client_info": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "company": {"type": "string"},
                            "email": {"type": "string"},
                            "phone": {"type": "string"}
                        }
                    },
                    "project_info": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"},
                            "location": {"type": "string"}
                        }
                    },
                    "line_items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "description": {"type": "string"},
                                "quantity": {"type": "number"},
                                "unit": {"type": "string"},
                                "unit_price": {"type": "number"}
                            },
                            "required": ["description"]
                        }
                    },
                    "requirements": {"type": "array", "items": {"type": "string"}},
                    "timeline": {"type": "string"},
                    "budget": {"type": "string"},
                    "confidence_score": {"type": "number", "minimum": 0, "maximum": 1},
                    "missing_information": {"type": "array", "items": {"type": "string"}},
                    "suggestions": {"type": "array", "items": {"type": "string"}}
                },
                "required": Role::Analyst.required_keys(),
            }),
        },
        Role::Generator => ToolSchema {
            name: "record_quote".to_string(),
            description: "Record the generated quote proposal".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "line_items": {"type": "array", "items": {"type": "object"}},
                    "totals": {"type": "object"},
                    "terms": {"type": "string"},
                    "timeline": {"type": "string"},
                    "summary": {"type": "string"}
                },
                "required": Role::Generator.required_keys(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quotesmith_core::{InvocationStrategy, Role, RoleConfig};
    use serde_json::json;

    use super::{tool_schema, PromptLibrary};
    use crate::input::RoleInput;

    fn config(role: Role) -> RoleConfig {
        RoleConfig {
            role,
            template: PromptLibrary::template_name(role),
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            timeout: Duration::from_secs(5),
            required_keys: role.required_keys(),
        }
    }

    #[test]
    fn freeform_analyst_prompt_lists_required_keys() {
        let library = PromptLibrary::new().expect("templates compile");
        let input = RoleInput::new()
            .with("document", "Paint 3 offices")
            .with("orchestrator_result", json!({"industry": "construction"}));

        let prompt = library
            .render(&config(Role::Analyst), &input, InvocationStrategy::Freeform)
            .expect("render");

        assert!(prompt.task.contains("Paint 3 offices"));
        assert!(prompt.task.contains("\"industry\": \"construction\""));
        assert!(prompt.task.contains("client_info, project_info, line_items"));
        assert!(!prompt.task.contains("provided tool"));
        assert!(!prompt.system.is_empty());
    }

    #[test]
    fn structured_analyst_prompt_defers_to_tool() {
        let library = PromptLibrary::new().expect("templates compile");
        let input = RoleInput::new().with("document", "Paint 3 offices");

        let prompt = library
            .render(&config(Role::Analyst), &input, InvocationStrategy::Structured)
            .expect("render");

        assert!(prompt.task.contains("provided tool"));
        assert!(!prompt.task.contains("Triage notes"));
    }

    #[test]
    fn generator_prompt_renders_without_pricing() {
        let library = PromptLibrary::new().expect("templates compile");
        let input = RoleInput::new()
            .with("project_context", json!({"document": "x"}))
            .with("confirmed_data", json!({"client": "Acme"}));

        let prompt = library
            .render(&config(Role::Generator), &input, InvocationStrategy::Freeform)
            .expect("render");

        assert!(prompt.task.contains("Acme"));
        assert!(!prompt.task.contains("Pricing configuration"));
    }

    #[test]
    fn every_role_schema_requires_its_keys() {
        for role in Role::ALL {
            let schema = tool_schema(role);
            assert_eq!(schema.parameters["required"], json!(role.required_keys()));
        }
    }
}
