use quotesmith_agent::prompts::PromptLibrary;
use quotesmith_agent::providers::{endpoint_for, HttpLlmClient};
use quotesmith_agent::RoleRegistry;
use quotesmith_core::config::{AppConfig, LlmProvider, LoadOptions};
use serde::Serialize;

use super::escape_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                 \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = vec![check_prompt_templates()];

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_role_budgets(&config));
            checks.push(check_provider_client(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["role_budgets", "provider_client"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_prompt_templates() -> DoctorCheck {
    match PromptLibrary::new() {
        Ok(_) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Pass,
            details: "all role templates compiled".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Fail,
            details: format!("template compilation failed: {error}"),
        },
    }
}

fn check_role_budgets(config: &AppConfig) -> DoctorCheck {
    let registry = RoleRegistry::from_config(config);
    let summary = registry
        .iter()
        .map(|role| {
            format!(
                "{}: model={} max_tokens={} timeout={}s",
                role.role,
                role.model,
                role.max_tokens,
                role.timeout.as_secs()
            )
        })
        .collect::<Vec<_>>()
        .join("; ");

    DoctorCheck { name: "role_budgets", status: CheckStatus::Pass, details: summary }
}

fn check_provider_client(config: &AppConfig) -> DoctorCheck {
    let endpoint = endpoint_for(config.llm.provider, config.llm.base_url.as_deref());
    let credentials = match (config.llm.provider, config.llm.api_key.is_some()) {
        (LlmProvider::Ollama, _) => "no api key required",
        (_, true) => "api key present",
        (_, false) => "api key missing",
    };

    match HttpLlmClient::from_config(&config.llm) {
        Ok(_) => DoctorCheck {
            name: "provider_client",
            status: CheckStatus::Pass,
            details: format!("{endpoint} ({credentials})"),
        },
        Err(error) => DoctorCheck {
            name: "provider_client",
            status: CheckStatus::Fail,
            details: format!("failed to build client for {endpoint}: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
