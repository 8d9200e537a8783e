//! Time-series query planning
//!
//! Picks a type-aware aggregation for a metric, buckets it with
//! `time_bucket`, and (when not collapsing to a scalar) produces a
//! complete time grid: every bucket start in the window appears for every
//! `(service, breakdown)` pair, with gaps zero-filled so charts render
//! stable axes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, params_from_iter};
use serde::Serialize;

use crate::data::duckdb::StoreError;
use crate::data::types::{AggregationTemporality, MetricType};
use crate::utils::time::micros_to_datetime;

// =============================================================================
// Metric metadata
// =============================================================================

/// Latest observed `(type, monotonicity, temporality)` for a metric; the
/// planner keys its aggregation choice off this
#[derive(Debug, Clone, Copy)]
pub struct SeriesMeta {
    pub metric_type: MetricType,
    pub is_monotonic: bool,
    pub temporality: AggregationTemporality,
}

/// Resolve metadata for a single metric. `None` when the metric has never
/// been observed.
pub fn series_meta(conn: &Connection, name: &str) -> Result<Option<SeriesMeta>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT arg_max(metric_type, timestamp),
                arg_max(COALESCE(is_monotonic, false), timestamp),
                arg_max(COALESCE(aggregation_temporality, 0), timestamp)
         FROM metrics WHERE metric_name = ?",
    )?;
    let mut rows = stmt.query(duckdb::params![name])?;
    match rows.next()? {
        Some(row) => {
            let metric_type: Option<String> = row.get(0)?;
            let is_monotonic: Option<bool> = row.get(1)?;
            let temporality: Option<i32> = row.get(2)?;
            Ok(metric_type.map(|mt| SeriesMeta {
                metric_type: MetricType::parse(&mt),
                is_monotonic: is_monotonic.unwrap_or(false),
                temporality: AggregationTemporality::from_i32(temporality.unwrap_or(0)),
            }))
        }
        None => Ok(None),
    }
}

/// Resolve metadata for many metrics in one query (batch series prefetch)
pub fn series_meta_many(
    conn: &Connection,
    names: &[String],
) -> Result<HashMap<String, SeriesMeta>, StoreError> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT metric_name,
                arg_max(metric_type, timestamp),
                arg_max(COALESCE(is_monotonic, false), timestamp),
                arg_max(COALESCE(aggregation_temporality, 0), timestamp)
         FROM metrics WHERE metric_name IN ({})
         GROUP BY metric_name",
        placeholders
    );
    let values: Vec<Value> = names.iter().map(|n| Value::Text(n.clone())).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        let name: String = row.get(0)?;
        let metric_type: String = row.get(1)?;
        Ok((
            name,
            SeriesMeta {
                metric_type: MetricType::parse(&metric_type),
                is_monotonic: row.get(2)?,
                temporality: AggregationTemporality::from_i32(row.get(3)?),
            },
        ))
    })?;
    rows.collect::<Result<HashMap<_, _>, _>>()
        .map_err(StoreError::from)
}

// =============================================================================
// Series queries
// =============================================================================

#[derive(Debug, Clone)]
pub struct SeriesParams {
    pub name: String,
    pub service: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub interval_seconds: u64,
    pub aggregate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesGroup {
    pub service: String,
    /// Value of the breakdown attribute (`type` or `gen_ai.token.type`),
    /// empty when the metric carries neither
    pub breakdown: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResult {
    pub name: String,
    pub series: Vec<SeriesGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<f64>,
}

const BREAKDOWN_EXPR: &str = "COALESCE(json_extract_string(attrs, '$.\"type\"'), \
     json_extract_string(attrs, '$.\"gen_ai.token.type\"'), '')";

fn aggregate_expr(meta: &SeriesMeta, bucketed: bool) -> &'static str {
    match meta.metric_type {
        MetricType::Gauge => "AVG(COALESCE(value, sum))",
        MetricType::Sum => match meta.temporality {
            AggregationTemporality::Cumulative => {
                if bucketed {
                    // last value in bucket
                    "arg_max(value, timestamp)"
                } else {
                    "MAX(value) - MIN(value)"
                }
            }
            _ => "SUM(value)",
        },
        MetricType::Histogram | MetricType::ExponentialHistogram | MetricType::Summary => {
            "SUM(sum)"
        }
    }
}

fn ts_literal(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Run one series query with already-resolved metadata
pub fn query_series(
    conn: &Connection,
    params: &SeriesParams,
    meta: &SeriesMeta,
) -> Result<SeriesResult, StoreError> {
    if params.aggregate {
        query_scalar(conn, params, meta)
    } else {
        query_grid(conn, params, meta)
    }
}

fn query_scalar(
    conn: &Connection,
    params: &SeriesParams,
    meta: &SeriesMeta,
) -> Result<SeriesResult, StoreError> {
    let mut sql = format!(
        "SELECT {} FROM metrics
         WHERE metric_name = ?
           AND timestamp >= TIMESTAMP '{}' AND timestamp <= TIMESTAMP '{}'",
        aggregate_expr(meta, false),
        ts_literal(params.from),
        ts_literal(params.to),
    );
    let mut values = vec![Value::Text(params.name.clone())];
    if let Some(ref service) = params.service {
        sql.push_str(" AND service_name = ?");
        values.push(Value::Text(service.clone()));
    }

    let value: Option<f64> = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(SeriesResult {
        name: params.name.clone(),
        series: Vec::new(),
        aggregate: Some(value.unwrap_or(0.0)),
    })
}

fn query_grid(
    conn: &Connection,
    params: &SeriesParams,
    meta: &SeriesMeta,
) -> Result<SeriesResult, StoreError> {
    let interval = params.interval_seconds.max(1);
    let from = ts_literal(params.from);
    let to = ts_literal(params.to);
    let service_filter = if params.service.is_some() {
        " AND service_name = ?"
    } else {
        ""
    };

    let sql = format!(
        "WITH buckets AS (
             SELECT generate_series AS bucket
             FROM generate_series(
                 time_bucket(INTERVAL '{interval} seconds', TIMESTAMP '{from}'),
                 TIMESTAMP '{to}',
                 INTERVAL '{interval} seconds')
         ),
         series AS (
             SELECT DISTINCT service_name, {BREAKDOWN_EXPR} AS breakdown
             FROM metrics
             WHERE metric_name = ?
               AND timestamp >= TIMESTAMP '{from}' AND timestamp <= TIMESTAMP '{to}'{service_filter}
         ),
         data AS (
             SELECT time_bucket(INTERVAL '{interval} seconds', timestamp) AS bucket,
                    service_name,
                    {BREAKDOWN_EXPR} AS breakdown,
                    {agg} AS value
             FROM metrics
             WHERE metric_name = ?
               AND timestamp >= TIMESTAMP '{from}' AND timestamp <= TIMESTAMP '{to}'{service_filter}
             GROUP BY 1, 2, 3
         )
         SELECT epoch_us(b.bucket), s.service_name, s.breakdown, COALESCE(d.value, 0)
         FROM buckets b
         CROSS JOIN series s
         LEFT JOIN data d
           ON d.bucket = b.bucket
          AND d.service_name = s.service_name
          AND d.breakdown = s.breakdown
         ORDER BY s.service_name, s.breakdown, b.bucket",
        agg = aggregate_expr(meta, true),
    );

    let mut values = vec![Value::Text(params.name.clone())];
    if let Some(ref service) = params.service {
        values.push(Value::Text(service.clone()));
    }
    values.push(Value::Text(params.name.clone()));
    if let Some(ref service) = params.service {
        values.push(Value::Text(service.clone()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((
            micros_to_datetime(row.get(0)?),
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;

    let mut series: Vec<SeriesGroup> = Vec::new();
    for row in rows {
        let (timestamp, service, breakdown, value) = row?;
        let matches_last = series
            .last()
            .is_some_and(|g| g.service == service && g.breakdown == breakdown);
        if !matches_last {
            series.push(SeriesGroup {
                service,
                breakdown,
                points: Vec::new(),
            });
        }
        if let Some(group) = series.last_mut() {
            group.points.push(SeriesPoint { timestamp, value });
        }
    }

    Ok(SeriesResult {
        name: params.name.clone(),
        series,
        aggregate: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::duckdb::repositories::metric::insert_metrics;
    use crate::data::duckdb::repositories::test_support::test_conn;
    use crate::data::types::MetricRow;
    use chrono::TimeZone;

    const T0: i64 = 1_700_000_000_000_000_000;
    const MINUTE: i64 = 60_000_000_000;

    fn sum_point(value: f64, nanos: i64, temporality: AggregationTemporality) -> MetricRow {
        MetricRow {
            timestamp: Utc.timestamp_nanos(nanos),
            service_name: "svc".to_string(),
            metric_name: "t.usage".to_string(),
            attrs: [("type".to_string(), "input".to_string())].into(),
            metric_type: MetricType::Sum,
            value: Some(value),
            aggregation_temporality: temporality,
            is_monotonic: Some(true),
            ..Default::default()
        }
    }

    fn grid_params(buckets: i64) -> SeriesParams {
        SeriesParams {
            name: "t.usage".to_string(),
            service: None,
            from: Utc.timestamp_nanos(T0),
            to: Utc.timestamp_nanos(T0 + buckets * MINUTE),
            interval_seconds: 60,
            aggregate: false,
        }
    }

    #[test]
    fn test_series_meta_absent_metric() {
        let conn = test_conn();
        assert!(series_meta(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_series_meta_picks_latest() {
        let conn = test_conn();
        let mut old = sum_point(1.0, T0, AggregationTemporality::Delta);
        old.metric_type = MetricType::Gauge;
        insert_metrics(
            &conn,
            &[old, sum_point(2.0, T0 + MINUTE, AggregationTemporality::Cumulative)],
        )
        .unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        assert_eq!(meta.metric_type, MetricType::Sum);
        assert_eq!(meta.temporality, AggregationTemporality::Cumulative);
        assert!(meta.is_monotonic);
    }

    #[test]
    fn test_series_meta_many() {
        let conn = test_conn();
        insert_metrics(&conn, &[sum_point(1.0, T0, AggregationTemporality::Delta)]).unwrap();

        let metas = series_meta_many(
            &conn,
            &["t.usage".to_string(), "missing.metric".to_string()],
        )
        .unwrap();
        assert_eq!(metas.len(), 1);
        assert!(metas.contains_key("t.usage"));
    }

    #[test]
    fn test_grid_is_complete_with_zero_fill() {
        let conn = test_conn();
        // two points, bucket 0 and bucket 2; window spans 4 intervals
        insert_metrics(
            &conn,
            &[
                sum_point(5.0, T0, AggregationTemporality::Delta),
                sum_point(7.0, T0 + 2 * MINUTE, AggregationTemporality::Delta),
            ],
        )
        .unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let result = query_series(&conn, &grid_params(4), &meta).unwrap();
        assert_eq!(result.series.len(), 1);
        let points = &result.series[0].points;
        assert_eq!(points.len(), 5, "window of k intervals yields k+1 buckets");
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5.0, 0.0, 7.0, 0.0, 0.0]);
        assert_eq!(result.series[0].breakdown, "input");
    }

    #[test]
    fn test_grid_delta_sums_within_bucket() {
        let conn = test_conn();
        insert_metrics(
            &conn,
            &[
                sum_point(5.0, T0, AggregationTemporality::Delta),
                sum_point(3.0, T0 + 1_000_000_000, AggregationTemporality::Delta),
            ],
        )
        .unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let result = query_series(&conn, &grid_params(1), &meta).unwrap();
        assert_eq!(result.series[0].points[0].value, 8.0);
    }

    #[test]
    fn test_grid_cumulative_takes_last_value_in_bucket() {
        let conn = test_conn();
        insert_metrics(
            &conn,
            &[
                sum_point(100.0, T0, AggregationTemporality::Cumulative),
                sum_point(150.0, T0 + 1_000_000_000, AggregationTemporality::Cumulative),
            ],
        )
        .unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let result = query_series(&conn, &grid_params(1), &meta).unwrap();
        assert_eq!(result.series[0].points[0].value, 150.0);
    }

    #[test]
    fn test_scalar_cumulative_is_max_minus_min() {
        let conn = test_conn();
        insert_metrics(
            &conn,
            &[
                sum_point(100.0, T0, AggregationTemporality::Cumulative),
                sum_point(175.0, T0 + MINUTE, AggregationTemporality::Cumulative),
            ],
        )
        .unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let mut params = grid_params(2);
        params.aggregate = true;
        let result = query_series(&conn, &params, &meta).unwrap();
        assert_eq!(result.aggregate, Some(75.0));
        assert!(result.series.is_empty());
    }

    #[test]
    fn test_gauge_averages() {
        let conn = test_conn();
        let mut g1 = sum_point(10.0, T0, AggregationTemporality::Unspecified);
        g1.metric_type = MetricType::Gauge;
        g1.is_monotonic = None;
        let mut g2 = sum_point(20.0, T0 + 1_000_000_000, AggregationTemporality::Unspecified);
        g2.metric_type = MetricType::Gauge;
        g2.is_monotonic = None;
        insert_metrics(&conn, &[g1, g2]).unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let result = query_series(&conn, &grid_params(1), &meta).unwrap();
        assert_eq!(result.series[0].points[0].value, 15.0);
    }

    #[test]
    fn test_histogram_sums_sum_field() {
        let conn = test_conn();
        let mut h = sum_point(0.0, T0, AggregationTemporality::Delta);
        h.metric_type = MetricType::Histogram;
        h.value = None;
        h.count = Some(4);
        h.sum = Some(12.5);
        h.bucket_counts = Some(vec![1, 3]);
        h.explicit_bounds = Some(vec![5.0]);
        insert_metrics(&conn, &[h]).unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let result = query_series(&conn, &grid_params(1), &meta).unwrap();
        assert_eq!(result.series[0].points[0].value, 12.5);
    }

    #[test]
    fn test_service_breakdown_pairs_cross_join() {
        let conn = test_conn();
        let mut other = sum_point(1.0, T0, AggregationTemporality::Delta);
        other.attrs = [("type".to_string(), "output".to_string())].into();
        insert_metrics(
            &conn,
            &[sum_point(5.0, T0, AggregationTemporality::Delta), other],
        )
        .unwrap();

        let meta = series_meta(&conn, "t.usage").unwrap().unwrap();
        let result = query_series(&conn, &grid_params(2), &meta).unwrap();
        assert_eq!(result.series.len(), 2, "one group per (service, type) pair");
        for group in &result.series {
            assert_eq!(group.points.len(), 3);
        }
    }
}
