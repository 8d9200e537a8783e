//! Gemini cost derivation
//!
//! Every `gemini_cli.token.usage` point gains a matching cost point priced
//! by token kind. Costs are per-event, so they carry DELTA temporality
//! regardless of the token row's own temporality.

use std::collections::HashMap;

use crate::data::types::{AggregationTemporality, MetricRow, MetricType};
use crate::domain::pricing::PricingTable;

pub const GEMINI_TOKEN_METRIC: &str = "gemini_cli.token.usage";
pub const GEMINI_COST_METRIC: &str = "gemini_cli.cost.usage";

pub fn derive(pricing: &PricingTable, metrics: &mut Vec<MetricRow>) {
    let mut derived = Vec::new();

    for m in metrics.iter() {
        if m.metric_name != GEMINI_TOKEN_METRIC {
            continue;
        }
        let Some(tokens) = m.value else { continue };
        let kind = m.attrs.get("type").map(String::as_str).unwrap_or("");
        let model = m.attrs.get("model").map(String::as_str).unwrap_or("");
        let Some(rate) = pricing.gemini_rate(model, kind) else {
            continue;
        };
        let cost = tokens * rate;
        if cost <= 0.0 {
            continue;
        }

        derived.push(MetricRow {
            timestamp: m.timestamp,
            service_name: m.service_name.clone(),
            metric_name: GEMINI_COST_METRIC.to_string(),
            unit: "USD".to_string(),
            resource_attrs: m.resource_attrs.clone(),
            scope_name: m.scope_name.clone(),
            scope_version: m.scope_version.clone(),
            attrs: HashMap::from([("model".to_string(), model.to_string())]),
            metric_type: MetricType::Sum,
            value: Some(cost),
            aggregation_temporality: AggregationTemporality::Delta,
            is_monotonic: Some(true),
            ..Default::default()
        });
    }

    metrics.extend(derived);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn token_point(kind: &str, model: &str, tokens: f64) -> MetricRow {
        MetricRow {
            timestamp: Utc.timestamp_nanos(1_700_000_000_000_000_000),
            service_name: "gemini-cli".to_string(),
            metric_name: GEMINI_TOKEN_METRIC.to_string(),
            unit: "tokens".to_string(),
            attrs: HashMap::from([
                ("type".to_string(), kind.to_string()),
                ("model".to_string(), model.to_string()),
            ]),
            metric_type: MetricType::Sum,
            value: Some(tokens),
            aggregation_temporality: AggregationTemporality::Cumulative,
            is_monotonic: Some(true),
            ..Default::default()
        }
    }

    fn cost_rows(metrics: &[MetricRow]) -> Vec<&MetricRow> {
        metrics
            .iter()
            .filter(|m| m.metric_name == GEMINI_COST_METRIC)
            .collect()
    }

    #[test]
    fn test_input_tokens_priced() {
        let pricing = PricingTable::new();
        let mut metrics = vec![token_point("input", "gemini-2.5-flash", 1_000_000.0)];
        derive(&pricing, &mut metrics);

        let costs = cost_rows(&metrics);
        assert_eq!(costs.len(), 1);
        let cost = costs[0];
        assert!((cost.value.unwrap() - 0.30).abs() < 1e-9);
        assert_eq!(cost.unit, "USD");
        assert_eq!(cost.aggregation_temporality, AggregationTemporality::Delta);
        assert_eq!(
            cost.attrs.get("model").map(String::as_str),
            Some("gemini-2.5-flash")
        );
        assert!(!cost.attrs.contains_key("type"));
    }

    #[test]
    fn test_thought_tokens_use_output_rate() {
        let pricing = PricingTable::new();
        let mut metrics = vec![
            token_point("thought", "gemini-2.5-flash", 1000.0),
            token_point("output", "gemini-2.5-flash", 1000.0),
        ];
        derive(&pricing, &mut metrics);

        let costs = cost_rows(&metrics);
        assert_eq!(costs.len(), 2);
        assert_eq!(costs[0].value, costs[1].value);
    }

    #[test]
    fn test_tool_tokens_not_charged() {
        let pricing = PricingTable::new();
        let mut metrics = vec![token_point("tool", "gemini-2.5-flash", 5000.0)];
        derive(&pricing, &mut metrics);
        assert!(cost_rows(&metrics).is_empty());
    }

    #[test]
    fn test_unknown_model_not_charged() {
        let pricing = PricingTable::new();
        let mut metrics = vec![token_point("input", "gemini-99", 5000.0)];
        derive(&pricing, &mut metrics);
        assert!(cost_rows(&metrics).is_empty());
    }

    #[test]
    fn test_zero_cache_rate_emits_no_row() {
        let pricing = PricingTable::new();
        // gemini-1.5-flash has no cache tier
        let mut metrics = vec![token_point("cache", "gemini-1.5-flash", 5000.0)];
        derive(&pricing, &mut metrics);
        assert!(cost_rows(&metrics).is_empty());
    }

    #[test]
    fn test_other_metrics_untouched() {
        let pricing = PricingTable::new();
        let mut other = token_point("input", "gemini-2.5-flash", 100.0);
        other.metric_name = "gemini_cli.session.count".to_string();
        let mut metrics = vec![other];
        derive(&pricing, &mut metrics);
        assert_eq!(metrics.len(), 1);
    }
}
