//! Turns raw model output into a field mapping.
//!
//! Stages run in order and each is a pure function:
//! fence strip, full parse, brace-substring recovery, terminal failure.
//! Decoding never fails; an unusable answer becomes a failure mapping that
//! carries a truncated copy of the raw response.

use quotesmith_core::{Role, RoleConfig};
use serde_json::{Map, Value};

use crate::llm::RawModelOutput;

/// Maximum characters of the raw response kept in a failure mapping.
pub const RAW_RESPONSE_LIMIT: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStage {
    /// Arguments of a structured tool call.
    ToolCall,
    /// The fence-stripped text parsed as a whole.
    Direct,
    /// Only the outermost braced substring parsed.
    BraceRecovery,
    Failed,
}

impl DecodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::Direct => "direct",
            Self::BraceRecovery => "brace_recovery",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedResponse {
    pub fields: Map<String, Value>,
    pub stage: DecodeStage,
    /// Required keys the mapping lacks. Always empty for failures.
    pub missing_keys: Vec<&'static str>,
}

impl DecodedResponse {
    pub fn is_failure(&self) -> bool {
        self.stage == DecodeStage::Failed
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Removes a surrounding code fence, including a language tag on the opener.
pub fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

/// Parses `text` as a JSON object. Arrays and scalars are rejected.
pub fn parse_mapping(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Parses the span from the first `{` to the last `}`.
pub fn recover_braced(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_mapping(&text[start..=end])
}

pub fn failure_mapping(role: Role, raw: &str, reasoning: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("error".to_string(), Value::String(format!("{role} decode failed")));
    fields.insert(
        "raw_response".to_string(),
        Value::String(truncate_chars(raw, RAW_RESPONSE_LIMIT)),
    );
    fields.insert("reasoning".to_string(), Value::String(reasoning.to_string()));
    fields
}

/// Required keys of `config` that `fields` does not carry.
pub fn schema_drift(config: &RoleConfig, fields: &Map<String, Value>) -> Vec<&'static str> {
    config.missing_keys(fields.keys())
}

pub fn decode_text(role: Role, raw: &str) -> (Map<String, Value>, DecodeStage) {
    if raw.trim().is_empty() {
        let fields = failure_mapping(role, raw, "model returned an empty response");
        return (fields, DecodeStage::Failed);
    }

    let cleaned = strip_fences(raw);
    if let Some(fields) = parse_mapping(cleaned) {
        return (fields, DecodeStage::Direct);
    }
    if let Some(fields) = recover_braced(cleaned) {
        return (fields, DecodeStage::BraceRecovery);
    }

    let reasoning = if cleaned.contains('{') {
        "braced content was not a valid JSON object"
    } else {
        "response contained no JSON object"
    };
    (failure_mapping(role, raw, reasoning), DecodeStage::Failed)
}

pub fn decode(config: &RoleConfig, output: &RawModelOutput) -> DecodedResponse {
    let (fields, stage) = match output {
        RawModelOutput::ToolCall(Value::Object(map)) => (map.clone(), DecodeStage::ToolCall),
        // Some providers hand tool arguments back as an encoded string.
        RawModelOutput::ToolCall(Value::String(text)) => match decode_text(config.role, text) {
            (fields, DecodeStage::Direct) => (fields, DecodeStage::ToolCall),
            other => other,
        },
        RawModelOutput::ToolCall(other) => (
            failure_mapping(
                config.role,
                &other.to_string(),
                "tool call arguments were not an object",
            ),
            DecodeStage::Failed,
        ),
        RawModelOutput::Text(text) => decode_text(config.role, text),
    };

    let missing_keys =
        if stage == DecodeStage::Failed { Vec::new() } else { schema_drift(config, &fields) };

    DecodedResponse { fields, stage, missing_keys }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}
