use std::fs;
use std::path::PathBuf;

use quotesmith_agent::{AgentRuntime, UsageSnapshot};
use quotesmith_core::config::{AppConfig, LoadOptions};
use quotesmith_core::{ExtractionEnvelope, QuoteEnvelope, SessionId};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub document: PathBuf,
    pub metadata: Option<String>,
    pub pricing: Option<String>,
    pub confirmed: Option<String>,
    pub analyze_only: bool,
}

/// Parsed inputs for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub document: String,
    pub metadata: Map<String, Value>,
    pub pricing: Map<String, Value>,
    /// Data the caller confirmed; `None` quotes from the extracted data.
    pub confirmed: Option<Map<String, Value>>,
    pub analyze_only: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    command: &'static str,
    status: &'static str,
    session_id: SessionId,
    extraction: ExtractionEnvelope,
    quote: Option<QuoteEnvelope>,
    usage: UsageSnapshot,
}

pub fn run(args: RunArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config);

    let request = match read_request(&args) {
        Ok(request) => request,
        Err(message) => return CommandResult::failure("run", "invalid_input", message, 4),
    };

    let agent = match AgentRuntime::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure("run", "runtime_init", format!("{error:#}"), 3);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(execute(&agent, request))
}

/// Runs analysis, then quote generation when analysis succeeded and the
/// caller asked for it. Exit code 5 signals an error-status envelope.
///
/// Without explicit confirmed data the extracted data is treated as confirmed.
pub async fn execute(agent: &AgentRuntime, request: RunRequest) -> CommandResult {
    let session_id = SessionId::generate();
    let extraction =
        agent.analyze_and_extract(&session_id, &request.document, request.metadata).await;

    let quote = if request.analyze_only || !extraction.is_success() {
        None
    } else {
        let confirmed =
            request.confirmed.unwrap_or_else(|| extraction.extracted_data.clone());
        Some(agent.generate_quote(&session_id, confirmed, request.pricing).await)
    };

    let succeeded =
        extraction.is_success() && quote.as_ref().map_or(true, QuoteEnvelope::is_success);
    info!(
        event_name = "cli.run.completed",
        session_id = %session_id,
        succeeded,
        quote_generated = quote.is_some(),
        "pipeline run finished"
    );
    let report = RunReport {
        command: "run",
        status: if succeeded { "ok" } else { "error" },
        session_id,
        extraction,
        quote,
        usage: agent.usage(),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: if succeeded { 0 } else { 5 }, output },
        Err(error) => CommandResult::failure("run", "serialization", error.to_string(), 1),
    }
}

fn read_request(args: &RunArgs) -> Result<RunRequest, String> {
    let document = fs::read_to_string(&args.document).map_err(|error| {
        format!("could not read document `{}`: {error}", args.document.display())
    })?;

    Ok(RunRequest {
        document,
        metadata: parse_object("--metadata", args.metadata.as_deref())?,
        pricing: parse_object("--pricing", args.pricing.as_deref())?,
        confirmed: args
            .confirmed
            .as_deref()
            .map(|raw| parse_object("--confirmed", Some(raw)))
            .transpose()?,
        analyze_only: args.analyze_only,
    })
}

pub fn parse_object(flag: &str, raw: Option<&str>) -> Result<Map<String, Value>, String> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!("{flag} must be a JSON object")),
        Err(error) => Err(format!("{flag} is not valid JSON: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_object;

    #[test]
    fn missing_flags_default_to_empty_objects() {
        assert_eq!(parse_object("--pricing", None).map(|map| map.len()), Ok(0));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let error = parse_object("--metadata", Some("[1, 2]")).expect_err("array");
        assert_eq!(error, "--metadata must be a JSON object");
        assert!(parse_object("--metadata", Some("{oops")).is_err());
    }
}
