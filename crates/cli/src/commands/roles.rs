use quotesmith_agent::strategy::STRUCTURED_THRESHOLD_CHARS;
use quotesmith_agent::RoleRegistry;
use quotesmith_core::config::{AppConfig, LoadOptions};
use quotesmith_core::Role;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct RoleRow {
    role: Role,
    template: &'static str,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    required_keys: &'static [&'static str],
    structured_above_chars: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RolesReport {
    command: &'static str,
    status: &'static str,
    max_output_tokens: u32,
    roles: Vec<RoleRow>,
}

pub fn run() -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config),
        Err(error) => CommandResult::failure(
            "roles",
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        ),
    }
}

pub fn render(config: &AppConfig) -> CommandResult {
    let registry = RoleRegistry::from_config(config);
    let roles = registry
        .iter()
        .map(|role| RoleRow {
            role: role.role,
            template: role.template,
            model: role.model.clone(),
            temperature: role.temperature,
            max_tokens: role.max_tokens,
            timeout_secs: role.timeout.as_secs(),
            required_keys: role.required_keys,
            structured_above_chars: (role.role == Role::Analyst)
                .then_some(STRUCTURED_THRESHOLD_CHARS),
        })
        .collect();

    let report = RolesReport {
        command: "roles",
        status: "ok",
        max_output_tokens: registry.max_output_tokens(),
        roles,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("roles", "serialization", error.to_string(), 1),
    }
}
