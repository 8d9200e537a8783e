//! Span repository
//!
//! Inserts span rows and serves the trace-shaped read contracts, including
//! the "virtual trace" reshaping for Codex session traces: a virtual trace
//! is rooted at any span whose parent is absent from the stored Codex
//! rows, and its subtree is re-evaluated on every query so late-arriving
//! parents collapse previously-orphaned roots.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, Row, params, params_from_iter};
use serde::Serialize;

use crate::core::constants::CODEX_SERVICE_NAME;
use crate::data::duckdb::StoreError;
use crate::data::duckdb::sql_types::parse_json_list;
use crate::data::types::{SpanEvent, SpanKind, SpanLink, SpanRow, StatusCode};
use crate::utils::time::{micros_to_datetime, nanos_to_datetime};

use super::{parse_attrs, ts_value};

// =============================================================================
// Writes
// =============================================================================

const INSERT_SPAN_SQL: &str = "INSERT INTO traces (
    timestamp, trace_id, span_id, parent_span_id, trace_state,
    span_name, span_kind, service_name, resource_attrs, scope_name,
    scope_version, span_attrs, duration_ns, status_code, status_message,
    event_timestamps, event_names, event_attrs,
    link_trace_ids, link_span_ids, link_trace_states, link_attrs
) VALUES (CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Insert a batch of spans, reusing one prepared statement across rows.
/// Caller provides the surrounding transaction.
pub fn insert_spans(conn: &Connection, spans: &[SpanRow]) -> Result<(), StoreError> {
    if spans.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare(INSERT_SPAN_SQL)?;
    for span in spans {
        let event_timestamps: Vec<i64> = span
            .events
            .iter()
            .map(|e| e.timestamp.timestamp_nanos_opt().unwrap_or(0))
            .collect();
        let event_names: Vec<&str> = span.events.iter().map(|e| e.name.as_str()).collect();
        let event_attrs: Vec<&HashMap<String, String>> =
            span.events.iter().map(|e| &e.attrs).collect();
        let link_trace_ids: Vec<&str> = span.links.iter().map(|l| l.trace_id.as_str()).collect();
        let link_span_ids: Vec<&str> = span.links.iter().map(|l| l.span_id.as_str()).collect();
        let link_trace_states: Vec<&str> =
            span.links.iter().map(|l| l.trace_state.as_str()).collect();
        let link_attrs: Vec<&HashMap<String, String>> =
            span.links.iter().map(|l| &l.attrs).collect();

        stmt.execute(params![
            ts_value(span.timestamp),
            span.trace_id,
            span.span_id,
            span.parent_span_id,
            span.trace_state,
            span.span_name,
            span.span_kind.as_str(),
            span.service_name,
            serde_json::to_string(&span.resource_attrs).unwrap_or_default(),
            span.scope_name,
            span.scope_version,
            serde_json::to_string(&span.span_attrs).unwrap_or_default(),
            span.duration_ns,
            span.status_code.as_str(),
            span.status_message,
            serde_json::to_string(&event_timestamps).unwrap_or_default(),
            serde_json::to_string(&event_names).unwrap_or_default(),
            serde_json::to_string(&event_attrs).unwrap_or_default(),
            serde_json::to_string(&link_trace_ids).unwrap_or_default(),
            serde_json::to_string(&link_span_ids).unwrap_or_default(),
            serde_json::to_string(&link_trace_states).unwrap_or_default(),
            serde_json::to_string(&link_attrs).unwrap_or_default(),
        ])?;
    }
    Ok(())
}

// =============================================================================
// Trace listing (real + virtual)
// =============================================================================

#[derive(Debug, Clone)]
pub struct TraceListParams {
    pub service: Option<String>,
    pub search: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    /// For virtual traces this is the root span id, not an OTLP trace id
    pub trace_id: String,
    pub root_name: String,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub duration_ns: i64,
    pub span_count: u64,
    pub status: StatusCode,
    pub is_virtual: bool,
}

/// List traces: real traces aggregated by trace id, plus virtual traces
/// for the Codex service, merged and paginated as one set.
pub fn list_traces(
    conn: &Connection,
    params: &TraceListParams,
) -> Result<(Vec<TraceSummary>, u64), StoreError> {
    let mut combined = query_regular_traces(conn, params)?;
    combined.extend(query_virtual_traces(conn, params)?);

    combined.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    let total = combined.len() as u64;

    let offset = params.offset as usize;
    let limit = params.limit as usize;
    let page = combined.into_iter().skip(offset).take(limit).collect();
    Ok((page, total))
}

fn trace_status(error_count: i64, ok_count: i64) -> StatusCode {
    if error_count > 0 {
        StatusCode::Error
    } else if ok_count > 0 {
        StatusCode::Ok
    } else {
        StatusCode::Unset
    }
}

fn query_regular_traces(
    conn: &Connection,
    params: &TraceListParams,
) -> Result<Vec<TraceSummary>, StoreError> {
    if params
        .service
        .as_deref()
        .is_some_and(|s| s == CODEX_SERVICE_NAME)
    {
        return Ok(Vec::new());
    }

    let mut sql = String::from(
        "SELECT trace_id,
                arg_min(span_name, timestamp) AS root_name,
                arg_min(service_name, timestamp) AS service_name,
                epoch_us(MIN(timestamp)) AS start_us,
                MAX(epoch_ns(timestamp) + duration_ns) - MIN(epoch_ns(timestamp)) AS duration_ns,
                COUNT(*) AS span_count,
                COUNT(*) FILTER (WHERE status_code = 'ERROR') AS error_count,
                COUNT(*) FILTER (WHERE status_code = 'OK') AS ok_count
         FROM traces
         WHERE service_name != ?
           AND timestamp >= CAST(? AS TIMESTAMP)
           AND timestamp <= CAST(? AS TIMESTAMP)",
    );
    let mut values: Vec<Value> = vec![
        Value::Text(CODEX_SERVICE_NAME.to_string()),
        ts_value(params.from),
        ts_value(params.to),
    ];

    if let Some(ref service) = params.service {
        sql.push_str(" AND service_name = ?");
        values.push(Value::Text(service.clone()));
    }

    sql.push_str(" GROUP BY trace_id");

    if let Some(ref search) = params.search {
        sql.push_str(" HAVING bool_or(span_name ILIKE ?)");
        values.push(Value::Text(format!("%{}%", search)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok(TraceSummary {
            trace_id: row.get(0)?,
            root_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            service_name: row.get(2)?,
            start_time: micros_to_datetime(row.get(3)?),
            duration_ns: row.get(4)?,
            span_count: row.get::<_, i64>(5)? as u64,
            status: trace_status(row.get(6)?, row.get(7)?),
            is_virtual: false,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

/// Virtual traces: the subtree predicate runs against all stored Codex
/// rows (roots are spans with no stored parent), then the listing window
/// filters on the computed start time.
fn query_virtual_traces(
    conn: &Connection,
    params: &TraceListParams,
) -> Result<Vec<TraceSummary>, StoreError> {
    if params
        .service
        .as_deref()
        .is_some_and(|s| s != CODEX_SERVICE_NAME)
    {
        return Ok(Vec::new());
    }

    let mut sql = String::from(
        "WITH RECURSIVE codex AS (
             SELECT span_id, parent_span_id, span_name, timestamp, duration_ns, status_code
             FROM traces WHERE service_name = ?
         ),
         roots AS (
             SELECT * FROM codex s
             WHERE s.parent_span_id IS NULL OR s.parent_span_id = ''
                OR NOT EXISTS (SELECT 1 FROM codex p WHERE p.span_id = s.parent_span_id)
         ),
         tree AS (
             SELECT r.span_id AS root_id, r.span_id, r.span_name, r.timestamp,
                    r.duration_ns, r.status_code
             FROM roots r
             UNION ALL
             SELECT t.root_id, c.span_id, c.span_name, c.timestamp,
                    c.duration_ns, c.status_code
             FROM codex c JOIN tree t ON c.parent_span_id = t.span_id
         )
         SELECT root_id,
                arg_min(span_name, timestamp) AS root_name,
                epoch_us(MIN(timestamp)) AS start_us,
                MAX(epoch_ns(timestamp) + duration_ns) - MIN(epoch_ns(timestamp)) AS duration_ns,
                COUNT(*) AS span_count,
                COUNT(*) FILTER (WHERE status_code = 'ERROR') AS error_count,
                COUNT(*) FILTER (WHERE status_code = 'OK') AS ok_count
         FROM tree
         GROUP BY root_id
         HAVING MIN(timestamp) >= CAST(? AS TIMESTAMP)
            AND MIN(timestamp) <= CAST(? AS TIMESTAMP)",
    );
    let mut values: Vec<Value> = vec![
        Value::Text(CODEX_SERVICE_NAME.to_string()),
        ts_value(params.from),
        ts_value(params.to),
    ];

    if let Some(ref search) = params.search {
        sql.push_str(" AND bool_or(span_name ILIKE ?)");
        values.push(Value::Text(format!("%{}%", search)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok(TraceSummary {
            trace_id: row.get(0)?,
            root_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            service_name: CODEX_SERVICE_NAME.to_string(),
            start_time: micros_to_datetime(row.get(2)?),
            duration_ns: row.get(3)?,
            span_count: row.get::<_, i64>(4)? as u64,
            status: trace_status(row.get(5)?, row.get(6)?),
            is_virtual: true,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

/// Look up one trace summary by id (virtual root span id or trace id)
pub fn get_trace(conn: &Connection, id: &str) -> Result<Option<TraceSummary>, StoreError> {
    let window = TraceListParams {
        service: None,
        search: None,
        from: nanos_to_datetime(0),
        to: Utc::now() + chrono::Duration::days(1),
        limit: u64::MAX,
        offset: 0,
    };

    let virtuals = query_virtual_traces(conn, &window)?;
    if let Some(found) = virtuals.into_iter().find(|t| t.trace_id == id) {
        return Ok(Some(found));
    }

    let regulars = query_regular_traces(conn, &window)?;
    Ok(regulars.into_iter().find(|t| t.trace_id == id))
}

// =============================================================================
// Span retrieval
// =============================================================================

const SPAN_COLUMNS: &str = "epoch_us(timestamp), trace_id, span_id, parent_span_id, trace_state,
    span_name, span_kind, service_name, CAST(resource_attrs AS VARCHAR), scope_name,
    scope_version, CAST(span_attrs AS VARCHAR), duration_ns, status_code, status_message,
    CAST(event_timestamps AS VARCHAR), CAST(event_names AS VARCHAR), CAST(event_attrs AS VARCHAR),
    CAST(link_trace_ids AS VARCHAR), CAST(link_span_ids AS VARCHAR),
    CAST(link_trace_states AS VARCHAR), CAST(link_attrs AS VARCHAR)";

fn row_to_span(row: &Row<'_>) -> Result<SpanRow, duckdb::Error> {
    let event_timestamps: Vec<i64> =
        parse_json_list(row.get::<_, Option<String>>(15)?).unwrap_or_default();
    let event_names: Vec<String> =
        parse_json_list(row.get::<_, Option<String>>(16)?).unwrap_or_default();
    let event_attrs: Vec<HashMap<String, String>> =
        parse_json_list(row.get::<_, Option<String>>(17)?).unwrap_or_default();
    let events = event_timestamps
        .into_iter()
        .zip(event_names)
        .zip(event_attrs)
        .map(|((ts, name), attrs)| SpanEvent {
            timestamp: nanos_to_datetime(ts.max(0) as u64),
            name,
            attrs,
        })
        .collect();

    let link_trace_ids: Vec<String> =
        parse_json_list(row.get::<_, Option<String>>(18)?).unwrap_or_default();
    let link_span_ids: Vec<String> =
        parse_json_list(row.get::<_, Option<String>>(19)?).unwrap_or_default();
    let link_trace_states: Vec<String> =
        parse_json_list(row.get::<_, Option<String>>(20)?).unwrap_or_default();
    let link_attrs: Vec<HashMap<String, String>> =
        parse_json_list(row.get::<_, Option<String>>(21)?).unwrap_or_default();
    let links = link_trace_ids
        .into_iter()
        .zip(link_span_ids)
        .zip(link_trace_states)
        .zip(link_attrs)
        .map(|(((trace_id, span_id), trace_state), attrs)| SpanLink {
            trace_id,
            span_id,
            trace_state,
            attrs,
        })
        .collect();

    Ok(SpanRow {
        timestamp: micros_to_datetime(row.get(0)?),
        trace_id: row.get(1)?,
        span_id: row.get(2)?,
        parent_span_id: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        trace_state: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        span_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        span_kind: SpanKind::parse(&row.get::<_, Option<String>>(6)?.unwrap_or_default()),
        service_name: row.get(7)?,
        resource_attrs: parse_attrs(row.get(8)?),
        scope_name: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        scope_version: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        span_attrs: parse_attrs(row.get(11)?),
        duration_ns: row.get(12)?,
        status_code: StatusCode::parse(&row.get::<_, Option<String>>(13)?.unwrap_or_default()),
        status_message: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
        events,
        links,
    })
}

/// Spans of a trace, in timestamp order. A Codex root span id resolves to
/// its recursive subtree; anything else resolves by OTLP trace id.
pub fn trace_spans(conn: &Connection, id: &str) -> Result<Vec<SpanRow>, StoreError> {
    let subtree = virtual_trace_spans(conn, id)?;
    if !subtree.is_empty() {
        return Ok(subtree);
    }

    let sql = format!(
        "SELECT {SPAN_COLUMNS} FROM traces WHERE trace_id = ? ORDER BY timestamp, span_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![id], row_to_span)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

fn virtual_trace_spans(conn: &Connection, root_span_id: &str) -> Result<Vec<SpanRow>, StoreError> {
    let sql = format!(
        "WITH RECURSIVE tree AS (
             SELECT * FROM traces WHERE span_id = ? AND service_name = ?
             UNION ALL
             SELECT c.* FROM traces c
             JOIN tree t ON c.parent_span_id = t.span_id
             WHERE c.service_name = ?
         )
         SELECT {SPAN_COLUMNS} FROM tree ORDER BY timestamp, span_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![root_span_id, CODEX_SERVICE_NAME, CODEX_SERVICE_NAME],
        row_to_span,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}
