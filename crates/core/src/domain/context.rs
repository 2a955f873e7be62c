use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accumulated state of one project session across both phases.
///
/// Created empty, filled by the analysis phase, extended by quote generation and
/// reset by an explicit clear or a failed analysis. There is no expiry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_elapsed_ms: Option<u64>,
}

impl ProjectContext {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Quote generation is only allowed once an analyst result exists.
    pub fn has_analysis(&self) -> bool {
        self.analyst_result.is_some()
    }

    pub fn has_quote(&self) -> bool {
        self.generator_result.is_some()
    }

    pub fn record_analysis(
        &mut self,
        document: String,
        metadata: Map<String, Value>,
        orchestrator_result: Map<String, Value>,
        analyst_result: Map<String, Value>,
        elapsed: Duration,
    ) {
        self.document = Some(document);
        self.metadata = Some(metadata);
        self.orchestrator_result = Some(orchestrator_result);
        self.analyst_result = Some(analyst_result);
        self.analysis_completed_at = Some(Utc::now());
        self.analysis_elapsed_ms = Some(duration_ms(elapsed));
        self.discard_quote();
    }

    pub fn record_quote(&mut self, generator_result: Map<String, Value>, elapsed: Duration) {
        self.generator_result = Some(generator_result);
        self.quote_completed_at = Some(Utc::now());
        self.quote_elapsed_ms = Some(duration_ms(elapsed));
    }

    /// Drops the generator result so a stale quote is never reported.
    pub fn discard_quote(&mut self) {
        self.generator_result = None;
        self.quote_completed_at = None;
        self.quote_elapsed_ms = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn industry(&self) -> Option<&str> {
        self.orchestrator_field("industry")
    }

    pub fn complexity(&self) -> Option<&str> {
        self.orchestrator_field("complexity")
    }

    /// Read-only mapping view. An empty context yields an empty mapping.
    pub fn snapshot(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    fn orchestrator_field(&self, key: &str) -> Option<&str> {
        self.orchestrator_result.as_ref()?.get(key)?.as_str()
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
