//! Codex streaming-response extraction
//!
//! The Codex CLI logs one `codex.sse_event` record per server-sent event.
//! The `response.completed` events carry the session's token counters;
//! those become cumulative token and cost metrics. SSE records themselves
//! are never stored (one row per streamed chunk would dwarf the rest of
//! the table); every other `codex.*` event passes through.

use std::collections::HashMap;

use crate::core::constants::CODEX_SERVICE_NAME;
use crate::data::types::{AggregationTemporality, LogRow, MetricRow, MetricType};
use crate::domain::pricing::PricingTable;

pub const CODEX_TOKEN_METRIC: &str = "codex_cli_rs.token.usage";
pub const CODEX_COST_METRIC: &str = "codex_cli_rs.cost.usage";

const SSE_EVENT: &str = "codex.sse_event";
const EVENT_NAME_ATTR: &str = "event.name";
const EVENT_KIND_ATTR: &str = "event.kind";
const RESPONSE_COMPLETED: &str = "response.completed";
const MODEL_ATTR: &str = "model";

/// Token counter attributes and the `type` values their metrics carry
const TOKEN_KINDS: &[(&str, &str)] = &[
    ("input_token_count", "input"),
    ("output_token_count", "output"),
    ("cached_token_count", "cacheRead"),
    ("reasoning_token_count", "reasoning"),
    ("tool_token_count", "tool"),
];

pub fn derive(pricing: &PricingTable, logs: &mut Vec<LogRow>, metrics: &mut Vec<MetricRow>) {
    let mut kept = Vec::with_capacity(logs.len());
    for log in logs.drain(..) {
        if !is_codex_sse(&log) {
            kept.push(log);
            continue;
        }
        if log.log_attrs.get(EVENT_KIND_ATTR).map(String::as_str) == Some(RESPONSE_COMPLETED) {
            extract_metrics(pricing, &log, metrics);
        }
        // SSE record dropped either way
    }
    *logs = kept;
}

fn is_codex_sse(log: &LogRow) -> bool {
    log.service_name == CODEX_SERVICE_NAME
        && log.log_attrs.get(EVENT_NAME_ATTR).map(String::as_str) == Some(SSE_EVENT)
}

fn counter(attrs: &HashMap<String, String>, key: &str) -> f64 {
    attrs
        .get(key)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn token_row(log: &LogRow, name: &str, value: f64, unit: &str, attrs: HashMap<String, String>) -> MetricRow {
    MetricRow {
        timestamp: log.timestamp,
        service_name: log.service_name.clone(),
        metric_name: name.to_string(),
        unit: unit.to_string(),
        resource_attrs: log.resource_attrs.clone(),
        scope_name: log.scope_name.clone(),
        scope_version: log.scope_version.clone(),
        attrs,
        metric_type: MetricType::Sum,
        value: Some(value),
        aggregation_temporality: AggregationTemporality::Cumulative,
        is_monotonic: Some(true),
        ..Default::default()
    }
}

fn extract_metrics(pricing: &PricingTable, log: &LogRow, metrics: &mut Vec<MetricRow>) {
    let model = log
        .log_attrs
        .get(MODEL_ATTR)
        .cloned()
        .unwrap_or_default();

    for &(attr, kind) in TOKEN_KINDS {
        let value = counter(&log.log_attrs, attr);
        if value == 0.0 {
            continue;
        }
        let attrs = HashMap::from([
            ("type".to_string(), kind.to_string()),
            (MODEL_ATTR.to_string(), model.clone()),
        ]);
        metrics.push(token_row(log, CODEX_TOKEN_METRIC, value, "tokens", attrs));
    }

    let input = counter(&log.log_attrs, "input_token_count");
    let cached = counter(&log.log_attrs, "cached_token_count");
    let output = counter(&log.log_attrs, "output_token_count");
    if let Some(cost) = pricing.codex_cost(&model, input, cached, output)
        && cost > 0.0
    {
        let attrs = HashMap::from([(MODEL_ATTR.to_string(), model.clone())]);
        metrics.push(token_row(log, CODEX_COST_METRIC, cost, "USD", attrs));
    }
}
