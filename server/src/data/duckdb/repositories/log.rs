//! Log repository

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, Row, params_from_iter};
use serde::Serialize;

use crate::data::duckdb::StoreError;
use crate::data::types::LogRow;
use crate::utils::time::micros_to_datetime;

use super::{parse_attrs, ts_value};

// =============================================================================
// Writes
// =============================================================================

const INSERT_LOG_SQL: &str = "INSERT INTO logs (
    timestamp, trace_id, span_id, trace_flags, severity_text,
    severity_number, service_name, body, resource_schema_url, resource_attrs,
    scope_schema_url, scope_name, scope_version, scope_attrs, log_attrs
) VALUES (CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Insert a batch of log records, reusing one prepared statement across
/// rows. Caller provides the surrounding transaction.
pub fn insert_logs(conn: &Connection, logs: &[LogRow]) -> Result<(), StoreError> {
    if logs.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare(INSERT_LOG_SQL)?;
    for log in logs {
        stmt.execute(duckdb::params![
            ts_value(log.timestamp),
            log.trace_id,
            log.span_id,
            log.trace_flags,
            log.severity_text,
            log.severity_number,
            log.service_name,
            log.body,
            log.resource_schema_url,
            serde_json::to_string(&log.resource_attrs).unwrap_or_default(),
            log.scope_schema_url,
            log.scope_name,
            log.scope_version,
            serde_json::to_string(&log.scope_attrs).unwrap_or_default(),
            serde_json::to_string(&log.log_attrs).unwrap_or_default(),
        ])?;
    }
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Debug, Clone)]
pub struct LogListParams {
    pub service: Option<String>,
    /// Matches `severity_text` case-insensitively
    pub severity: Option<String>,
    pub trace_id: Option<String>,
    /// Substring match against the body
    pub search: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub limit: u64,
    pub offset: u64,
}

const LOG_COLUMNS: &str = "epoch_us(timestamp), trace_id, span_id, trace_flags, severity_text,
    severity_number, service_name, body, resource_schema_url, CAST(resource_attrs AS VARCHAR),
    scope_schema_url, scope_name, scope_version, CAST(scope_attrs AS VARCHAR),
    CAST(log_attrs AS VARCHAR)";

fn row_to_log(row: &Row<'_>) -> Result<LogRow, duckdb::Error> {
    Ok(LogRow {
        timestamp: micros_to_datetime(row.get(0)?),
        trace_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        span_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        trace_flags: row.get::<_, Option<i32>>(3)?.unwrap_or(0),
        severity_text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        severity_number: row.get::<_, Option<i32>>(5)?.unwrap_or(0),
        service_name: row.get(6)?,
        body: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        resource_schema_url: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        resource_attrs: parse_attrs(row.get(9)?),
        scope_schema_url: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        scope_name: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        scope_version: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        scope_attrs: parse_attrs(row.get(13)?),
        log_attrs: parse_attrs(row.get(14)?),
    })
}

fn build_conditions(params: &LogListParams) -> (String, Vec<Value>) {
    let mut conditions = vec![
        "timestamp >= CAST(? AS TIMESTAMP)".to_string(),
        "timestamp <= CAST(? AS TIMESTAMP)".to_string(),
    ];
    let mut values = vec![ts_value(params.from), ts_value(params.to)];

    if let Some(ref service) = params.service {
        conditions.push("service_name = ?".to_string());
        values.push(Value::Text(service.clone()));
    }
    if let Some(ref severity) = params.severity {
        conditions.push("UPPER(severity_text) = UPPER(?)".to_string());
        values.push(Value::Text(severity.clone()));
    }
    if let Some(ref trace_id) = params.trace_id {
        conditions.push("trace_id = ?".to_string());
        values.push(Value::Text(trace_id.clone()));
    }
    if let Some(ref search) = params.search {
        conditions.push("body ILIKE ?".to_string());
        values.push(Value::Text(format!("%{}%", search)));
    }

    (conditions.join(" AND "), values)
}

/// List log records, newest first, with the total matching count
pub fn list_logs(
    conn: &Connection,
    params: &LogListParams,
) -> Result<(Vec<LogRow>, u64), StoreError> {
    let (where_clause, values) = build_conditions(params);

    let count_sql = format!("SELECT COUNT(*) FROM logs WHERE {}", where_clause);
    let total: i64 = conn.query_row(
        &count_sql,
        params_from_iter(values.iter().cloned()),
        |row| row.get(0),
    )?;

    let data_sql = format!(
        "SELECT {LOG_COLUMNS} FROM logs WHERE {} ORDER BY timestamp DESC LIMIT {} OFFSET {}",
        where_clause, params.limit, params.offset
    );
    let mut stmt = conn.prepare(&data_sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_log)?;
    let logs = rows.collect::<Result<Vec<_>, _>>()?;

    Ok((logs, total as u64))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCount {
    pub level: String,
    pub count: u64,
}

/// Per-severity record counts within a time range
pub fn level_counts(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    service: Option<&str>,
) -> Result<Vec<LevelCount>, StoreError> {
    let mut sql = String::from(
        "SELECT COALESCE(severity_text, ''), COUNT(*) FROM logs
         WHERE timestamp >= CAST(? AS TIMESTAMP) AND timestamp <= CAST(? AS TIMESTAMP)",
    );
    let mut values = vec![ts_value(from), ts_value(to)];
    if let Some(service) = service {
        sql.push_str(" AND service_name = ?");
        values.push(Value::Text(service.to_string()));
    }
    sql.push_str(" GROUP BY 1 ORDER BY 2 DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok(LevelCount {
            level: row.get(0)?,
            count: row.get::<_, i64>(1)? as u64,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::duckdb::repositories::test_support::test_conn;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn make_log(service: &str, severity: &str, body: &str) -> LogRow {
        LogRow {
            timestamp: Utc.timestamp_nanos(1_700_000_000_000_000_000),
            trace_id: String::new(),
            span_id: String::new(),
            trace_flags: 0,
            severity_text: severity.to_string(),
            severity_number: 9,
            service_name: service.to_string(),
            body: body.to_string(),
            resource_schema_url: String::new(),
            resource_attrs: HashMap::new(),
            scope_schema_url: String::new(),
            scope_name: String::new(),
            scope_version: String::new(),
            scope_attrs: HashMap::new(),
            log_attrs: HashMap::new(),
        }
    }

    fn list_params() -> LogListParams {
        LogListParams {
            service: None,
            severity: None,
            trace_id: None,
            search: None,
            from: Utc.timestamp_nanos(0),
            to: Utc.timestamp_nanos(1_800_000_000_000_000_000),
            limit: 100,
            offset: 0,
        }
    }

    #[test]
    fn test_insert_and_list_roundtrip() {
        let conn = test_conn();
        let mut log = make_log("gemini-cli", "INFO", "session started");
        log.trace_id = "0af7651916cd43dd8448eb211c80319c".to_string();
        log.log_attrs
            .insert("event.name".to_string(), "cli.start".to_string());
        insert_logs(&conn, &[log]).unwrap();

        let (logs, total) = list_logs(&conn, &list_params()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs[0].body, "session started");
        assert_eq!(logs[0].trace_id, "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(
            logs[0].log_attrs.get("event.name").map(String::as_str),
            Some("cli.start")
        );
    }

    #[test]
    fn test_list_filters() {
        let conn = test_conn();
        insert_logs(
            &conn,
            &[
                make_log("alpha", "INFO", "all good"),
                make_log("alpha", "ERROR", "request failed"),
                make_log("beta", "ERROR", "boom"),
            ],
        )
        .unwrap();

        let mut params = list_params();
        params.severity = Some("error".to_string());
        let (logs, total) = list_logs(&conn, &params).unwrap();
        assert_eq!(total, 2);
        assert!(logs.iter().all(|l| l.severity_text == "ERROR"));

        params.service = Some("beta".to_string());
        let (_, total) = list_logs(&conn, &params).unwrap();
        assert_eq!(total, 1);

        let mut params = list_params();
        params.search = Some("failed".to_string());
        let (logs, total) = list_logs(&conn, &params).unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs[0].body, "request failed");
    }

    #[test]
    fn test_list_pagination() {
        let conn = test_conn();
        let logs: Vec<LogRow> = (0..5)
            .map(|i| {
                let mut log = make_log("svc", "INFO", &format!("line {}", i));
                log.timestamp = Utc.timestamp_nanos(1_700_000_000_000_000_000 + i * 1_000_000_000);
                log
            })
            .collect();
        insert_logs(&conn, &logs).unwrap();

        let mut params = list_params();
        params.limit = 2;
        params.offset = 2;
        let (page, total) = list_logs(&conn, &params).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // newest first: offset 2 lands on "line 2"
        assert_eq!(page[0].body, "line 2");
    }

    #[test]
    fn test_level_counts() {
        let conn = test_conn();
        insert_logs(
            &conn,
            &[
                make_log("svc", "INFO", "a"),
                make_log("svc", "INFO", "b"),
                make_log("svc", "ERROR", "c"),
            ],
        )
        .unwrap();

        let counts = level_counts(
            &conn,
            Utc.timestamp_nanos(0),
            Utc.timestamp_nanos(1_800_000_000_000_000_000),
            None,
        )
        .unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].level, "INFO");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].level, "ERROR");
        assert_eq!(counts[1].count, 1);
    }
}
