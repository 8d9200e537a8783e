//! Log query endpoints

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::api::types::{clamp_limit, resolve_time_range};
use crate::data::duckdb::repositories::log::{self, LevelCount, LogListParams};
use crate::data::types::LogRow;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogListQuery {
    pub service: Option<String>,
    pub severity: Option<String>,
    pub trace_id: Option<String>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogListResponse {
    pub logs: Vec<LogRow>,
    pub total: u64,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<LogListQuery>,
) -> Result<Json<LogListResponse>, ApiError> {
    let (from, to) = resolve_time_range(query.from, query.to);
    let params = LogListParams {
        service: query.service,
        severity: query.severity,
        trace_id: query.trace_id,
        search: query.search,
        from,
        to,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or(0),
    };

    let (logs, total) = state
        .store
        .read(move |conn| log::list_logs(conn, &params))
        .await?;
    Ok(Json(LogListResponse { logs, total }))
}

#[derive(Debug, Deserialize)]
pub struct LevelsQuery {
    pub service: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn levels(
    State(state): State<ApiState>,
    Query(query): Query<LevelsQuery>,
) -> Result<Json<Vec<LevelCount>>, ApiError> {
    let (from, to) = resolve_time_range(query.from, query.to);
    let service = query.service;
    let counts = state
        .store
        .read(move |conn| log::level_counts(conn, from, to, service.as_deref()))
        .await?;
    Ok(Json(counts))
}
