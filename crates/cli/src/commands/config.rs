use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quotesmith_core::config::{AppConfig, LoadOptions};
use quotesmith_core::Role;
use toml::Value;

struct ConfigSources {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = ConfigSources { file_path, file_doc };

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let llm_fields = [
        ("llm.provider", format!("{:?}", config.llm.provider), Some("QUOTESMITH_LLM_PROVIDER")),
        ("llm.model", config.llm.model.clone(), Some("QUOTESMITH_LLM_MODEL")),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            Some("QUOTESMITH_LLM_BASE_URL"),
        ),
        ("llm.api_key", llm_api_key.to_string(), Some("QUOTESMITH_LLM_API_KEY")),
        (
            "llm.connect_timeout_secs",
            config.llm.connect_timeout_secs.to_string(),
            Some("QUOTESMITH_LLM_CONNECT_TIMEOUT_SECS"),
        ),
        (
            "agent.max_output_tokens",
            config.agent.max_output_tokens.to_string(),
            Some("QUOTESMITH_AGENT_MAX_OUTPUT_TOKENS"),
        ),
    ];
    for (key, value, env_key) in &llm_fields {
        lines.push(render_line(key, value, field_source(key, *env_key, &sources)));
    }

    for role in Role::ALL {
        let settings = config.agent.role(role);
        let env_prefix = format!("QUOTESMITH_AGENT_{}", role.as_str().to_ascii_uppercase());
        let model_env = format!("{env_prefix}_MODEL");
        let timeout_env = format!("{env_prefix}_TIMEOUT_SECS");
        let role_fields = [
            ("model", config.model_for(role).to_string(), Some(model_env.as_str())),
            ("temperature", settings.temperature.to_string(), None),
            ("max_tokens", settings.max_tokens.to_string(), None),
            ("timeout_secs", settings.timeout_secs.to_string(), Some(timeout_env.as_str())),
        ];
        for (field, value, env_key) in role_fields {
            let key = format!("agent.{}.{field}", role.as_str());
            lines.push(render_line(&key, &value, field_source(&key, env_key, &sources)));
        }
    }

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source("logging.level", Some("QUOTESMITH_LOGGING_LEVEL"), &sources),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source("logging.format", Some("QUOTESMITH_LOGGING_FORMAT"), &sources),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("quotesmith.toml"), PathBuf::from("config/quotesmith.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_key: Option<&str>, sources: &ConfigSources) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = &sources.file_doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .file_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::{contains_path, render_line};

    #[test]
    fn nested_role_tables_are_found() {
        let doc = "[agent.analyst]\ntimeout_secs = 30\n".parse::<toml::Value>().expect("toml");
        assert!(contains_path(&doc, "agent.analyst.timeout_secs"));
        assert!(!contains_path(&doc, "agent.generator.timeout_secs"));
    }

    #[test]
    fn lines_name_their_source() {
        assert_eq!(
            render_line("llm.model", "llama3.1", "default".to_string()),
            "- llm.model = llama3.1 (source: default)"
        );
    }
}
