//! Service catalog, aggregate stats, and telemetry deletion

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::api::types::resolve_time_range;
use crate::data::duckdb::repositories::stats::{self, ServiceInfo, StatsSummary};
use crate::data::types::{DeleteCounts, DeleteScope};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<ServiceInfo>>, ApiError> {
    let (from, to) = resolve_time_range(query.from, query.to);
    let services = state
        .store
        .read(move |conn| stats::list_services(conn, from, to))
        .await?;
    Ok(Json(services))
}

pub async fn stats(
    State(state): State<ApiState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<StatsSummary>, ApiError> {
    let (from, to) = resolve_time_range(query.from, query.to);
    let summary = state
        .store
        .read(move |conn| stats::stats(conn, from, to))
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub scope: String,
    pub service: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn delete_telemetry(
    State(state): State<ApiState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteCounts>, ApiError> {
    let scope = DeleteScope::parse(&query.scope).ok_or_else(|| {
        ApiError::Validation(format!(
            "scope must be one of logs, metrics, traces, all (got '{}')",
            query.scope
        ))
    })?;
    let (from, to) = resolve_time_range(query.from, query.to);
    let service = query.service;

    let counts = state
        .store
        .write(move |conn| stats::delete_telemetry(conn, scope, from, to, service.as_deref()))
        .await?;
    tracing::info!(
        traces = counts.traces,
        logs = counts.logs,
        metrics = counts.metrics,
        "Telemetry deleted"
    );
    Ok(Json(counts))
}
