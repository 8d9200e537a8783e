//! Cumulative-to-delta derivation
//!
//! Producers restart often and re-seed their cumulative counters from
//! zero, so series are keyed by a per-metric allow-list of essential
//! attributes rather than the full attribute set; session-identifying
//! attributes would fragment the series unboundedly. Counter resets show
//! up as a value drop and are handled by taking the new value as the
//! delta.

use std::collections::{HashMap, HashSet};

use crate::data::duckdb::Store;
use crate::data::duckdb::repositories::metric::latest_metric_value;
use crate::data::types::{AggregationTemporality, MetricRow, MetricType};

use super::DeriveError;

pub const DELTA_SUFFIX: &str = ".delta";

/// Closed allow-list: metric name -> essential attribute keys forming the
/// series key alongside the service name
const DELTA_RULES: &[(&str, &[&str])] = &[
    ("claude_code.token.usage", &["type", "model"]),
    ("claude_code.cost.usage", &["model"]),
    ("claude_code.session.count", &[]),
    ("claude_code.lines_of_code.count", &["type"]),
    ("claude_code.commit.count", &[]),
    ("claude_code.pull_request.count", &[]),
    ("gemini_cli.token.usage", &["type", "model"]),
    ("gemini_cli.session.count", &[]),
    ("gemini_cli.api.request.count", &["model"]),
    ("gemini_cli.file.operation.count", &["operation"]),
    ("gemini_cli.tool.call.count", &["function_name"]),
    ("codex_cli_rs.token.usage", &["type", "model"]),
];

fn essential_keys(metric_name: &str) -> Option<&'static [&'static str]> {
    DELTA_RULES
        .iter()
        .find(|(name, _)| *name == metric_name)
        .map(|(_, keys)| *keys)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    metric: String,
    service: String,
    attrs: Vec<(String, String)>,
}

fn series_key(row: &MetricRow, keys: &[&str]) -> SeriesKey {
    let attrs = keys
        .iter()
        .filter_map(|&k| row.attrs.get(k).map(|v| (k.to_string(), v.clone())))
        .collect();
    SeriesKey {
        metric: row.metric_name.clone(),
        service: row.service_name.clone(),
        attrs,
    }
}

fn qualifies(row: &MetricRow) -> bool {
    row.metric_type == MetricType::Sum
        && row.aggregation_temporality == AggregationTemporality::Cumulative
        && row.value.is_some()
        && essential_keys(&row.metric_name).is_some()
}

/// Derive `.delta` rows for allow-listed cumulative counters. The prior
/// value per series comes from one store read (taken before the caller
/// acquires the write lock); within the batch the running value carries
/// forward in memory.
pub async fn derive(store: &Store, metrics: &mut Vec<MetricRow>) -> Result<(), DeriveError> {
    let mut qualifying: Vec<usize> = (0..metrics.len())
        .filter(|&i| qualifies(&metrics[i]))
        .collect();
    if qualifying.is_empty() {
        return Ok(());
    }
    qualifying.sort_by_key(|&i| metrics[i].timestamp);

    let keys: HashSet<SeriesKey> = qualifying
        .iter()
        .map(|&i| {
            let row = &metrics[i];
            series_key(row, essential_keys(&row.metric_name).unwrap_or(&[]))
        })
        .collect();

    let lookup: Vec<SeriesKey> = keys.into_iter().collect();
    let priors: HashMap<SeriesKey, f64> = store
        .read(move |conn| {
            let mut map = HashMap::new();
            for key in lookup {
                if let Some(value) =
                    latest_metric_value(conn, &key.metric, &key.service, &key.attrs)?
                {
                    map.insert(key, value);
                }
            }
            Ok(map)
        })
        .await?;

    let mut last = priors;
    let mut derived = Vec::new();
    for i in qualifying {
        let row = &metrics[i];
        let current = row.value.unwrap_or(0.0);
        let key = series_key(row, essential_keys(&row.metric_name).unwrap_or(&[]));

        let Some(&previous) = last.get(&key) else {
            // first point seeds the series
            last.insert(key, current);
            continue;
        };
        last.insert(key, current);

        let delta = if current < previous {
            // counter reset
            current
        } else {
            current - previous
        };
        if delta == 0.0 {
            continue;
        }

        let mut delta_row = row.clone();
        delta_row.metric_name = format!("{}{}", row.metric_name, DELTA_SUFFIX);
        delta_row.aggregation_temporality = AggregationTemporality::Delta;
        delta_row.value = Some(delta);
        derived.push(delta_row);
    }

    metrics.extend(derived);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::duckdb::repositories::metric::insert_metrics;
    use chrono::{TimeZone, Utc};

    const T0: i64 = 1_700_000_000_000_000_000;
    const MINUTE: i64 = 60_000_000_000;

    fn cumulative(name: &str, value: f64, nanos: i64, attrs: &[(&str, &str)]) -> MetricRow {
        MetricRow {
            timestamp: Utc.timestamp_nanos(nanos),
            service_name: "gemini-cli".to_string(),
            metric_name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metric_type: MetricType::Sum,
            value: Some(value),
            aggregation_temporality: AggregationTemporality::Cumulative,
            is_monotonic: Some(true),
            ..Default::default()
        }
    }

    fn token_attrs() -> Vec<(&'static str, &'static str)> {
        vec![("type", "input"), ("model", "gemini-2.5-flash")]
    }

    fn deltas(metrics: &[MetricRow]) -> Vec<&MetricRow> {
        metrics
            .iter()
            .filter(|m| m.metric_name.ends_with(DELTA_SUFFIX))
            .collect()
    }

    async fn persist(store: &Store, metrics: Vec<MetricRow>) {
        store
            .write(move |conn| insert_metrics(conn, &metrics))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_point_seeds_without_delta() {
        let store = Store::open_in_memory().await.unwrap();
        let mut metrics = vec![cumulative("gemini_cli.token.usage", 100.0, T0, &token_attrs())];
        derive(&store, &mut metrics).await.unwrap();
        assert!(deltas(&metrics).is_empty());
    }

    #[tokio::test]
    async fn test_delta_against_stored_prior() {
        let store = Store::open_in_memory().await.unwrap();
        persist(
            &store,
            vec![cumulative("gemini_cli.token.usage", 100.0, T0, &token_attrs())],
        )
        .await;

        let mut metrics = vec![cumulative(
            "gemini_cli.token.usage",
            150.0,
            T0 + MINUTE,
            &token_attrs(),
        )];
        derive(&store, &mut metrics).await.unwrap();

        let rows = deltas(&metrics);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metric_name, "gemini_cli.token.usage.delta");
        assert_eq!(rows[0].value, Some(50.0));
        assert_eq!(rows[0].aggregation_temporality, AggregationTemporality::Delta);
        // original cumulative row is preserved
        assert!(metrics.iter().any(|m| m.metric_name == "gemini_cli.token.usage"));
    }

    #[tokio::test]
    async fn test_reset_takes_current_as_delta() {
        let store = Store::open_in_memory().await.unwrap();
        persist(
            &store,
            vec![cumulative("gemini_cli.token.usage", 150.0, T0, &token_attrs())],
        )
        .await;

        let mut metrics = vec![cumulative(
            "gemini_cli.token.usage",
            50.0,
            T0 + MINUTE,
            &token_attrs(),
        )];
        derive(&store, &mut metrics).await.unwrap();

        let rows = deltas(&metrics);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Some(50.0));
    }

    #[tokio::test]
    async fn test_repeated_value_produces_no_delta() {
        let store = Store::open_in_memory().await.unwrap();
        persist(
            &store,
            vec![cumulative("gemini_cli.token.usage", 100.0, T0, &token_attrs())],
        )
        .await;

        let mut metrics = vec![cumulative(
            "gemini_cli.token.usage",
            100.0,
            T0 + MINUTE,
            &token_attrs(),
        )];
        derive(&store, &mut metrics).await.unwrap();
        assert!(deltas(&metrics).is_empty());
    }

    #[tokio::test]
    async fn test_in_batch_sequence() {
        // 100 @ t1 seeds, 150 @ t2 -> 50, 50 @ t3 -> reset -> 50
        let store = Store::open_in_memory().await.unwrap();
        let mut metrics = vec![
            cumulative("gemini_cli.token.usage", 100.0, T0, &token_attrs()),
            cumulative("gemini_cli.token.usage", 150.0, T0 + MINUTE, &token_attrs()),
            cumulative("gemini_cli.token.usage", 50.0, T0 + 2 * MINUTE, &token_attrs()),
        ];
        derive(&store, &mut metrics).await.unwrap();

        let rows = deltas(&metrics);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(50.0));
        assert_eq!(rows[1].value, Some(50.0));
    }

    #[tokio::test]
    async fn test_series_keyed_by_essential_attrs_only() {
        let store = Store::open_in_memory().await.unwrap();
        persist(
            &store,
            vec![cumulative(
                "gemini_cli.token.usage",
                100.0,
                T0,
                &[("type", "input"), ("model", "gemini-2.5-flash"), ("session.id", "aaa")],
            )],
        )
        .await;

        // same essential attrs, different session: still the same series
        let mut metrics = vec![cumulative(
            "gemini_cli.token.usage",
            130.0,
            T0 + MINUTE,
            &[("type", "input"), ("model", "gemini-2.5-flash"), ("session.id", "bbb")],
        )];
        derive(&store, &mut metrics).await.unwrap();

        let rows = deltas(&metrics);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Some(30.0));
    }

    #[tokio::test]
    async fn test_non_allow_listed_metric_skipped() {
        let store = Store::open_in_memory().await.unwrap();
        persist(
            &store,
            vec![cumulative("custom.counter", 100.0, T0, &[])],
        )
        .await;

        let mut metrics = vec![cumulative("custom.counter", 200.0, T0 + MINUTE, &[])];
        derive(&store, &mut metrics).await.unwrap();
        assert!(deltas(&metrics).is_empty());
    }

    #[tokio::test]
    async fn test_delta_temporality_rows_skipped() {
        let store = Store::open_in_memory().await.unwrap();
        persist(
            &store,
            vec![cumulative("gemini_cli.token.usage", 100.0, T0, &token_attrs())],
        )
        .await;

        let mut row = cumulative("gemini_cli.token.usage", 500.0, T0 + MINUTE, &token_attrs());
        row.aggregation_temporality = AggregationTemporality::Delta;
        let mut metrics = vec![row];
        derive(&store, &mut metrics).await.unwrap();
        assert!(deltas(&metrics).is_empty());
    }
}
