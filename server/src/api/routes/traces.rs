//! Trace query endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::api::types::{clamp_limit, resolve_time_range};
use crate::data::duckdb::repositories::span::{self, TraceListParams, TraceSummary};
use crate::data::types::SpanRow;
use crate::utils::time::nanos_to_datetime;

#[derive(Debug, Deserialize)]
pub struct TraceListQuery {
    pub service: Option<String>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceListResponse {
    pub traces: Vec<TraceSummary>,
    pub total: u64,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<TraceListQuery>,
) -> Result<Json<TraceListResponse>, ApiError> {
    let (from, to) = resolve_time_range(query.from, query.to);
    let params = TraceListParams {
        service: query.service,
        search: query.search,
        from,
        to,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or(0),
    };

    let (traces, total) = state
        .store
        .read(move |conn| span::list_traces(conn, &params))
        .await?;
    Ok(Json(TraceListResponse { traces, total }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u64>,
}

pub async fn recent(
    State(state): State<ApiState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<TraceListResponse>, ApiError> {
    let params = TraceListParams {
        service: None,
        search: None,
        from: nanos_to_datetime(0),
        to: Utc::now() + Duration::hours(1),
        limit: query.limit.unwrap_or(20).min(100),
        offset: 0,
    };

    let (traces, total) = state
        .store
        .read(move |conn| span::list_traces(conn, &params))
        .await?;
    Ok(Json(TraceListResponse { traces, total }))
}

pub async fn get_by_id(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TraceSummary>, ApiError> {
    let lookup = id.clone();
    let trace = state
        .store
        .read(move |conn| span::get_trace(conn, &lookup))
        .await?;
    trace
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("trace {}", id)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpansResponse {
    pub spans: Vec<SpanRow>,
}

pub async fn spans(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TraceSpansResponse>, ApiError> {
    let lookup = id.clone();
    let spans = state
        .store
        .read(move |conn| span::trace_spans(conn, &lookup))
        .await?;
    if spans.is_empty() {
        return Err(ApiError::NotFound(format!("trace {}", id)));
    }
    Ok(Json(TraceSpansResponse { spans }))
}
