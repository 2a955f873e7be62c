//! Maps role outputs onto the two fixed-shape envelopes.
//!
//! Every declared key is always filled, with the mapped value or a default.
//! The duplicate keys (`client`, `project_details`, `items`, `client_info`,
//! `total_amount`) are aliases read by older consumers and must stay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quotesmith_core::{
    AgentError, EnvelopeStatus, ErrorDetails, ExtractionEnvelope, InvocationStrategy,
    QuoteEnvelope, Role,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use crate::decoder::DecodedResponse;

pub const DECODE_FAILURE_KIND: &str = "response_decode_failure";
pub const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.5;
const DEFAULT_CURRENCY: &str = "USD";

/// Facts about a role run that end up in envelope metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct RunFacts {
    pub strategy: InvocationStrategy,
    pub fallback_used: bool,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

pub fn extraction_envelope(
    orchestrator: &Map<String, Value>,
    analyst: &DecodedResponse,
    document_chars: usize,
    facts: &RunFacts,
) -> ExtractionEnvelope {
    let mut analysis_metadata = analysis_metadata(orchestrator, document_chars, facts);
    analysis_metadata.insert("decode_stage".to_string(), json!(analyst.stage.as_str()));

    if analyst.is_failure() {
        return ExtractionEnvelope {
            status: EnvelopeStatus::Error,
            extracted_data: extracted_data(&Map::new()),
            suggestions: vec![
                "Re-run the analysis or enter the project details manually.".to_string()
            ],
            ready_for_review: false,
            confidence_score: 0.0,
            quality_score: 0.0,
            analysis_metadata,
            error_details: Some(decode_failure_details(Role::Analyst, &analyst.fields)),
        };
    }

    let fields = &analyst.fields;
    let extracted_data = extracted_data(fields);
    let confidence_score =
        number(fields.get("confidence_score")).map(|v| v.clamp(0.0, 1.0)).unwrap_or(0.0);
    let has_line_items = extracted_data
        .get("line_items")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());

    ExtractionEnvelope {
        status: EnvelopeStatus::Success,
        suggestions: suggestions(fields),
        ready_for_review: has_line_items && confidence_score >= REVIEW_CONFIDENCE_THRESHOLD,
        confidence_score,
        quality_score: quality_score(Role::Analyst, fields),
        extracted_data,
        analysis_metadata,
        error_details: None,
    }
}

/// Envelope for an analysis that never produced an analyst answer.
pub fn extraction_failure(error: &AgentError, document_chars: usize) -> ExtractionEnvelope {
    let mut analysis_metadata = Map::new();
    analysis_metadata.insert("document_length".to_string(), json!(document_chars));
    analysis_metadata.insert("failed_at".to_string(), json!(Utc::now().to_rfc3339()));

    ExtractionEnvelope {
        status: EnvelopeStatus::Error,
        extracted_data: extracted_data(&Map::new()),
        suggestions: Vec::new(),
        ready_for_review: false,
        confidence_score: 0.0,
        quality_score: 0.0,
        analysis_metadata,
        error_details: Some(ErrorDetails::from(error)),
    }
}

pub fn quote_envelope(
    generator: &DecodedResponse,
    confirmed_data: &Map<String, Value>,
    pricing_config: &Map<String, Value>,
    facts: &RunFacts,
) -> QuoteEnvelope {
    let mut metadata = Map::new();
    metadata.insert("generated_at".to_string(), json!(facts.completed_at.to_rfc3339()));
    metadata.insert("elapsed_ms".to_string(), json!(duration_ms(facts.elapsed)));
    metadata.insert("strategy".to_string(), json!(facts.strategy.as_str()));
    metadata.insert("fallback_used".to_string(), json!(facts.fallback_used));
    metadata.insert("decode_stage".to_string(), json!(generator.stage.as_str()));

    if generator.is_failure() {
        return QuoteEnvelope {
            status: EnvelopeStatus::Error,
            quote: quote(&Map::new(), &Map::new(), &Map::new()),
            metadata,
            error_details: Some(decode_failure_details(Role::Generator, &generator.fields)),
        };
    }

    let quote = quote(&generator.fields, confirmed_data, pricing_config);
    metadata.insert(
        "line_item_count".to_string(),
        json!(quote.get("line_items").and_then(Value::as_array).map_or(0, Vec::len)),
    );
    metadata.insert(
        "quality_score".to_string(),
        json!(quality_score(Role::Generator, &generator.fields)),
    );

    QuoteEnvelope { status: EnvelopeStatus::Success, quote, metadata, error_details: None }
}

pub fn quote_failure(error: &AgentError) -> QuoteEnvelope {
    let mut metadata = Map::new();
    metadata.insert("failed_at".to_string(), json!(Utc::now().to_rfc3339()));

    QuoteEnvelope {
        status: EnvelopeStatus::Error,
        quote: quote(&Map::new(), &Map::new(), &Map::new()),
        metadata,
        error_details: Some(ErrorDetails::from(error)),
    }
}

fn analysis_metadata(
    orchestrator: &Map<String, Value>,
    document_chars: usize,
    facts: &RunFacts,
) -> Map<String, Value> {
    let mut metadata = Map::new();
    for key in ["document_type", "industry", "complexity", "recommended_approach"] {
        metadata.insert(key.to_string(), json!(text(orchestrator.get(key))));
    }
    metadata.insert("key_topics".to_string(), array(orchestrator.get("key_topics")));
    metadata.insert("strategy".to_string(), json!(facts.strategy.as_str()));
    metadata.insert("fallback_used".to_string(), json!(facts.fallback_used));
    metadata.insert("document_length".to_string(), json!(document_chars));
    metadata.insert("elapsed_ms".to_string(), json!(duration_ms(facts.elapsed)));
    metadata.insert("analyzed_at".to_string(), json!(facts.completed_at.to_rfc3339()));
    metadata
}

fn extracted_data(fields: &Map<String, Value>) -> Map<String, Value> {
    let client_info = object(fields.get("client_info"));
    let project_info = object(fields.get("project_info"));
    let line_items = array(fields.get("line_items"));

    let mut data = Map::new();
    data.insert("client".to_string(), client_info.clone());
    data.insert("client_info".to_string(), client_info);
    data.insert("project_details".to_string(), project_info.clone());
    data.insert("project_info".to_string(), project_info);
    data.insert("items".to_string(), line_items.clone());
    data.insert("line_items".to_string(), line_items);
    data.insert("requirements".to_string(), array(fields.get("requirements")));
    data.insert("missing_information".to_string(), array(fields.get("missing_information")));
    data.insert("timeline".to_string(), json!(text(fields.get("timeline"))));
    data.insert("budget".to_string(), json!(text(fields.get("budget"))));
    data
}

fn suggestions(fields: &Map<String, Value>) -> Vec<String> {
    let explicit = strings(fields.get("suggestions"));
    let from_missing = strings(fields.get("missing_information"))
        .into_iter()
        .map(|item| format!("Confirm {item} with the client"));
    explicit.into_iter().chain(from_missing).collect()
}

/// Fraction of the role's required keys present in `fields`.
pub fn quality_score(role: Role, fields: &Map<String, Value>) -> f64 {
    let required = role.required_keys();
    let present = required.iter().filter(|key| fields.contains_key(**key)).count();
    present as f64 / required.len() as f64
}

fn quote(
    generator: &Map<String, Value>,
    confirmed: &Map<String, Value>,
    pricing: &Map<String, Value>,
) -> Map<String, Value> {
    let client = [generator.get("client"), confirmed.get("client_info"), confirmed.get("client")]
        .into_iter()
        .find_map(|value| value.filter(|v| v.is_object()).cloned())
        .unwrap_or_else(|| json!({}));
    let line_items =
        [generator.get("line_items"), generator.get("items"), confirmed.get("line_items")];
    let line_items = line_items
        .into_iter()
        .find_map(|value| value.filter(|v| v.is_array()).cloned())
        .unwrap_or_else(|| json!([]));
    let totals = totals(generator.get("totals"), &line_items, pricing);
    let total_amount = totals.get("total").cloned().unwrap_or_else(|| json!(0.0));

    let mut quote = Map::new();
    quote.insert("title".to_string(), json!(text(generator.get("title"))));
    quote.insert("client".to_string(), client.clone());
    quote.insert("client_info".to_string(), client);
    quote.insert("items".to_string(), line_items.clone());
    quote.insert("line_items".to_string(), line_items);
    quote.insert("totals".to_string(), Value::Object(totals));
    quote.insert("total_amount".to_string(), total_amount);
    for key in ["terms", "timeline", "summary"] {
        quote.insert(key.to_string(), json!(text(generator.get(key))));
    }
    quote
}

/// Totals computed from line items, overridden by whatever the model stated.
///
/// Amounts that overflow `Decimal` are left out: an item whose line total
/// overflows is skipped, and an overflowing tax counts as zero.
fn totals(
    stated: Option<&Value>,
    line_items: &Value,
    pricing: &Map<String, Value>,
) -> Map<String, Value> {
    let subtotal = line_items
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(line_total)
                .fold(Decimal::ZERO, |sum, amount| sum.checked_add(amount).unwrap_or(sum))
        })
        .unwrap_or(Decimal::ZERO);
    let tax_rate = decimal(pricing.get("tax_rate")).unwrap_or(Decimal::ZERO);
    let tax = subtotal.checked_mul(tax_rate).unwrap_or(Decimal::ZERO);
    let currency = text(pricing.get("currency"));

    let stated = stated.and_then(Value::as_object);
    let pick = |key: &str, computed: Decimal| {
        stated.and_then(|totals| decimal(totals.get(key))).unwrap_or(computed)
    };
    let subtotal = pick("subtotal", subtotal);
    let tax = pick("tax", tax);
    let total = pick("total", subtotal.checked_add(tax).unwrap_or(subtotal));
    let currency = stated
        .map(|totals| text(totals.get("currency")))
        .filter(|value| !value.is_empty())
        .or(Some(currency).filter(|value| !value.is_empty()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let mut totals = Map::new();
    totals.insert("subtotal".to_string(), json!(money(subtotal)));
    totals.insert("tax".to_string(), json!(money(tax)));
    totals.insert("total".to_string(), json!(money(total)));
    totals.insert("currency".to_string(), json!(currency));
    totals
}

fn line_total(item: &Value) -> Option<Decimal> {
    if let Some(total) = decimal(item.get("total")) {
        return Some(total);
    }
    let quantity = decimal(item.get("quantity")).unwrap_or(Decimal::ONE);
    let unit_price = decimal(item.get("unit_price")).unwrap_or(Decimal::ZERO);
    quantity.checked_mul(unit_price)
}

fn decode_failure_details(role: Role, fields: &Map<String, Value>) -> ErrorDetails {
    let reasoning = text(fields.get("reasoning"));
    let message = if reasoning.is_empty() {
        format!("{role} response could not be decoded")
    } else {
        format!("{role} response could not be decoded: {reasoning}")
    };
    ErrorDetails::new(DECODE_FAILURE_KIND, message)
}

fn money(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or(0.0)
}

fn decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(number) => number
            .to_string()
            .parse::<Decimal>()
            .ok()
            .or_else(|| number.as_f64().and_then(|float| Decimal::try_from(float).ok())),
        Value::String(raw) => {
            let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
            cleaned.parse::<Decimal>().ok()
        }
        _ => None,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn object(value: Option<&Value>) -> Value {
    value.filter(|value| value.is_object()).cloned().unwrap_or_else(|| json!({}))
}

fn array(value: Option<&Value>) -> Value {
    value.filter(|value| value.is_array()).cloned().unwrap_or_else(|| json!([]))
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
