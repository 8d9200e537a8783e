//! Metric repository
//!
//! Inserts metric data points (originals and derived rows alike) and
//! serves the point-lookup contract the delta derivation depends on.

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, params_from_iter};
use serde::Serialize;

use crate::data::duckdb::StoreError;
use crate::data::duckdb::sql_types::opt_json_string;
use crate::data::types::MetricRow;
use crate::utils::time::micros_to_datetime;

use super::{json_path, ts_value};

// =============================================================================
// Writes
// =============================================================================

const INSERT_METRIC_SQL: &str = "INSERT INTO metrics (
    timestamp, service_name, metric_name, description, unit,
    resource_attrs, scope_name, scope_version, attrs, metric_type,
    value, aggregation_temporality, is_monotonic, count, sum,
    bucket_counts, explicit_bounds, scale, zero_count, positive_offset,
    positive_bucket_counts, negative_offset, negative_bucket_counts,
    quantile_values, quantile_quantiles, min, max
) VALUES (CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Insert a batch of metric points, reusing one prepared statement across
/// rows. Caller provides the surrounding transaction.
pub fn insert_metrics(conn: &Connection, metrics: &[MetricRow]) -> Result<(), StoreError> {
    if metrics.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare(INSERT_METRIC_SQL)?;
    for m in metrics {
        stmt.execute(duckdb::params![
            ts_value(m.timestamp),
            m.service_name,
            m.metric_name,
            m.description,
            m.unit,
            serde_json::to_string(&m.resource_attrs).unwrap_or_default(),
            m.scope_name,
            m.scope_version,
            serde_json::to_string(&m.attrs).unwrap_or_default(),
            m.metric_type.as_str(),
            m.value,
            m.aggregation_temporality.as_i32(),
            m.is_monotonic,
            m.count,
            m.sum,
            opt_json_string(&m.bucket_counts),
            opt_json_string(&m.explicit_bounds),
            m.scale,
            m.zero_count,
            m.positive_offset,
            opt_json_string(&m.positive_bucket_counts),
            m.negative_offset,
            opt_json_string(&m.negative_bucket_counts),
            opt_json_string(&m.quantile_values),
            opt_json_string(&m.quantile_quantiles),
            m.min,
            m.max,
        ])?;
    }
    Ok(())
}

// =============================================================================
// Point lookup
// =============================================================================

/// Latest stored value of one series, identified by metric name, service
/// and exact values of the given attributes (JSON-path extraction against
/// the attrs column). Returns `None` when the series has no prior point.
pub fn latest_metric_value(
    conn: &Connection,
    metric_name: &str,
    service_name: &str,
    attrs: &[(String, String)],
) -> Result<Option<f64>, StoreError> {
    let mut sql = String::from(
        "SELECT value FROM metrics
         WHERE metric_name = ? AND service_name = ? AND value IS NOT NULL",
    );
    let mut values = vec![
        Value::Text(metric_name.to_string()),
        Value::Text(service_name.to_string()),
    ];
    for (key, value) in attrs {
        sql.push_str(&format!(
            " AND json_extract_string(attrs, '{}') = ?",
            json_path(key)
        ));
        values.push(Value::Text(value.clone()));
    }
    sql.push_str(" ORDER BY timestamp DESC LIMIT 1");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

// =============================================================================
// Catalog reads
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricInfo {
    pub name: String,
    pub metric_type: String,
    pub unit: String,
    pub description: String,
    pub point_count: u64,
    pub last_seen: DateTime<Utc>,
}

/// List metrics observed within a time range, with their latest metadata
pub fn list_metrics(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    service: Option<&str>,
) -> Result<Vec<MetricInfo>, StoreError> {
    let mut sql = String::from(
        "SELECT metric_name,
                arg_max(metric_type, timestamp),
                arg_max(COALESCE(unit, ''), timestamp),
                arg_max(COALESCE(description, ''), timestamp),
                COUNT(*),
                epoch_us(MAX(timestamp))
         FROM metrics
         WHERE timestamp >= CAST(? AS TIMESTAMP) AND timestamp <= CAST(? AS TIMESTAMP)",
    );
    let mut values = vec![ts_value(from), ts_value(to)];
    if let Some(service) = service {
        sql.push_str(" AND service_name = ?");
        values.push(Value::Text(service.to_string()));
    }
    sql.push_str(" GROUP BY metric_name ORDER BY metric_name");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok(MetricInfo {
            name: row.get(0)?,
            metric_type: row.get(1)?,
            unit: row.get(2)?,
            description: row.get(3)?,
            point_count: row.get::<_, i64>(4)? as u64,
            last_seen: micros_to_datetime(row.get(5)?),
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

/// Distinct metric names, optionally scoped to one service
pub fn metric_names(conn: &Connection, service: Option<&str>) -> Result<Vec<String>, StoreError> {
    let (sql, values): (&str, Vec<Value>) = match service {
        Some(service) => (
            "SELECT DISTINCT metric_name FROM metrics WHERE service_name = ? ORDER BY metric_name",
            vec![Value::Text(service.to_string())],
        ),
        None => (
            "SELECT DISTINCT metric_name FROM metrics ORDER BY metric_name",
            Vec::new(),
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| row.get(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

/// Distinct values of one attribute on one metric within a time range
pub fn breakdown_values(
    conn: &Connection,
    metric_name: &str,
    attribute: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<String>, StoreError> {
    let sql = format!(
        "SELECT DISTINCT json_extract_string(attrs, '{}') AS v
         FROM metrics
         WHERE metric_name = ?
           AND timestamp >= CAST(? AS TIMESTAMP) AND timestamp <= CAST(? AS TIMESTAMP)
           AND v IS NOT NULL
         ORDER BY v",
        json_path(attribute)
    );
    let values = vec![
        Value::Text(metric_name.to_string()),
        ts_value(from),
        ts_value(to),
    ];

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| row.get(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}
