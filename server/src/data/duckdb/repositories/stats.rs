//! Service catalog, aggregate stats and telemetry deletion

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, params_from_iter};
use serde::Serialize;

use crate::data::duckdb::StoreError;
use crate::data::types::{DeleteCounts, DeleteScope};
use crate::utils::time::micros_to_datetime;

use super::ts_value;

// =============================================================================
// Services
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub span_count: u64,
    pub log_count: u64,
    pub metric_count: u64,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Services observed in any telemetry table within a time range
pub fn list_services(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<ServiceInfo>, StoreError> {
    let mut services: BTreeMap<String, ServiceInfo> = BTreeMap::new();

    for (table, field) in [
        ("traces", 0usize),
        ("logs", 1usize),
        ("metrics", 2usize),
    ] {
        let sql = format!(
            "SELECT service_name, COUNT(*), epoch_us(MAX(timestamp)) FROM {table}
             WHERE timestamp >= CAST(? AS TIMESTAMP) AND timestamp <= CAST(? AS TIMESTAMP)
             GROUP BY service_name"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter([ts_value(from), ts_value(to)]), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? as u64,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (name, count, last_us) = row?;
            let entry = services.entry(name.clone()).or_insert_with(|| ServiceInfo {
                name,
                ..Default::default()
            });
            match field {
                0 => entry.span_count = count,
                1 => entry.log_count = count,
                _ => entry.metric_count = count,
            }
            let seen = micros_to_datetime(last_us);
            if entry.last_seen.is_none_or(|prev| seen > prev) {
                entry.last_seen = Some(seen);
            }
        }
    }

    Ok(services.into_values().collect())
}

// =============================================================================
// Aggregate stats
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub span_count: u64,
    pub trace_count: u64,
    pub log_count: u64,
    pub metric_count: u64,
    pub service_count: u64,
}

pub fn stats(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<StatsSummary, StoreError> {
    let range = || params_from_iter([ts_value(from), ts_value(to)]);
    let window = "timestamp >= CAST(? AS TIMESTAMP) AND timestamp <= CAST(? AS TIMESTAMP)";

    let (span_count, trace_count): (i64, i64) = conn.query_row(
        &format!("SELECT COUNT(*), COUNT(DISTINCT trace_id) FROM traces WHERE {window}"),
        range(),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let log_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM logs WHERE {window}"),
        range(),
        |row| row.get(0),
    )?;
    let metric_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM metrics WHERE {window}"),
        range(),
        |row| row.get(0),
    )?;
    let service_count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT service_name) FROM (
                 SELECT service_name FROM traces WHERE {window}
                 UNION ALL SELECT service_name FROM logs WHERE {window}
                 UNION ALL SELECT service_name FROM metrics WHERE {window}
             )"
        ),
        params_from_iter([
            ts_value(from),
            ts_value(to),
            ts_value(from),
            ts_value(to),
            ts_value(from),
            ts_value(to),
        ]),
        |row| row.get(0),
    )?;

    Ok(StatsSummary {
        span_count: span_count as u64,
        trace_count: trace_count as u64,
        log_count: log_count as u64,
        metric_count: metric_count as u64,
        service_count: service_count as u64,
    })
}

// =============================================================================
// Deletion
// =============================================================================

/// Delete telemetry by scope, time range and optional service filter.
/// Returns per-table deleted counts. Runs in the caller's transaction.
pub fn delete_telemetry(
    conn: &Connection,
    scope: DeleteScope,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    service: Option<&str>,
) -> Result<DeleteCounts, StoreError> {
    let mut counts = DeleteCounts::default();

    let delete_from = |table: &str| -> Result<u64, StoreError> {
        let mut sql = format!(
            "DELETE FROM {table}
             WHERE timestamp >= CAST(? AS TIMESTAMP) AND timestamp <= CAST(? AS TIMESTAMP)"
        );
        let mut values = vec![ts_value(from), ts_value(to)];
        if let Some(service) = service {
            sql.push_str(" AND service_name = ?");
            values.push(Value::Text(service.to_string()));
        }
        Ok(conn.execute(&sql, params_from_iter(values))? as u64)
    };

    if matches!(scope, DeleteScope::Traces | DeleteScope::All) {
        counts.traces = delete_from("traces")?;
    }
    if matches!(scope, DeleteScope::Logs | DeleteScope::All) {
        counts.logs = delete_from("logs")?;
    }
    if matches!(scope, DeleteScope::Metrics | DeleteScope::All) {
        counts.metrics = delete_from("metrics")?;
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::duckdb::repositories::log::insert_logs;
    use crate::data::duckdb::repositories::metric::insert_metrics;
    use crate::data::duckdb::repositories::span::insert_spans;
    use crate::data::duckdb::repositories::test_support::test_conn;
    use crate::data::types::{
        AggregationTemporality, LogRow, MetricRow, MetricType, SpanKind, SpanRow, StatusCode,
    };
    use chrono::TimeZone;
    use std::collections::HashMap;

    const T0: i64 = 1_700_000_000_000_000_000;

    fn seed(conn: &Connection) {
        insert_spans(
            conn,
            &[SpanRow {
                timestamp: Utc.timestamp_nanos(T0),
                trace_id: "t1".to_string(),
                span_id: "s1".to_string(),
                parent_span_id: String::new(),
                trace_state: String::new(),
                span_name: "root".to_string(),
                span_kind: SpanKind::Internal,
                service_name: "alpha".to_string(),
                resource_attrs: HashMap::new(),
                scope_name: String::new(),
                scope_version: String::new(),
                span_attrs: HashMap::new(),
                duration_ns: 1,
                status_code: StatusCode::Ok,
                status_message: String::new(),
                events: Vec::new(),
                links: Vec::new(),
            }],
        )
        .unwrap();
        insert_logs(
            conn,
            &[LogRow {
                timestamp: Utc.timestamp_nanos(T0),
                trace_id: String::new(),
                span_id: String::new(),
                trace_flags: 0,
                severity_text: "INFO".to_string(),
                severity_number: 9,
                service_name: "beta".to_string(),
                body: "hello".to_string(),
                resource_schema_url: String::new(),
                resource_attrs: HashMap::new(),
                scope_schema_url: String::new(),
                scope_name: String::new(),
                scope_version: String::new(),
                scope_attrs: HashMap::new(),
                log_attrs: HashMap::new(),
            }],
        )
        .unwrap();
        insert_metrics(
            conn,
            &[MetricRow {
                timestamp: Utc.timestamp_nanos(T0),
                service_name: "alpha".to_string(),
                metric_name: "m.count".to_string(),
                metric_type: MetricType::Sum,
                value: Some(1.0),
                aggregation_temporality: AggregationTemporality::Delta,
                ..Default::default()
            }],
        )
        .unwrap();
    }

    fn full_range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.timestamp_nanos(0),
            Utc.timestamp_nanos(1_800_000_000_000_000_000),
        )
    }

    #[test]
    fn test_list_services_merges_tables() {
        let conn = test_conn();
        seed(&conn);

        let (from, to) = full_range();
        let services = list_services(&conn, from, to).unwrap();
        assert_eq!(services.len(), 2);
        let alpha = services.iter().find(|s| s.name == "alpha").unwrap();
        assert_eq!(alpha.span_count, 1);
        assert_eq!(alpha.metric_count, 1);
        assert_eq!(alpha.log_count, 0);
        assert!(alpha.last_seen.is_some());
        let beta = services.iter().find(|s| s.name == "beta").unwrap();
        assert_eq!(beta.log_count, 1);
    }

    #[test]
    fn test_stats_counts() {
        let conn = test_conn();
        seed(&conn);

        let (from, to) = full_range();
        let summary = stats(&conn, from, to).unwrap();
        assert_eq!(summary.span_count, 1);
        assert_eq!(summary.trace_count, 1);
        assert_eq!(summary.log_count, 1);
        assert_eq!(summary.metric_count, 1);
        assert_eq!(summary.service_count, 2);
    }

    #[test]
    fn test_delete_scoped() {
        let conn = test_conn();
        seed(&conn);

        let (from, to) = full_range();
        let counts = delete_telemetry(&conn, DeleteScope::Logs, from, to, None).unwrap();
        assert_eq!(counts.logs, 1);
        assert_eq!(counts.traces, 0);
        assert_eq!(counts.metrics, 0);

        let summary = stats(&conn, from, to).unwrap();
        assert_eq!(summary.log_count, 0);
        assert_eq!(summary.span_count, 1);
    }

    #[test]
    fn test_delete_all_with_service_filter() {
        let conn = test_conn();
        seed(&conn);

        let (from, to) = full_range();
        let counts = delete_telemetry(&conn, DeleteScope::All, from, to, Some("alpha")).unwrap();
        assert_eq!(counts.traces, 1);
        assert_eq!(counts.metrics, 1);
        assert_eq!(counts.logs, 0, "beta logs are outside the service filter");
    }

    #[test]
    fn test_delete_respects_time_range() {
        let conn = test_conn();
        seed(&conn);

        let counts = delete_telemetry(
            &conn,
            DeleteScope::All,
            Utc.timestamp_nanos(0),
            Utc.timestamp_nanos(T0 - 1),
            None,
        )
        .unwrap();
        assert_eq!(counts.traces + counts.logs + counts.metrics, 0);
    }
}
