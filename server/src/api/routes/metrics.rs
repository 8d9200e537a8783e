//! Metric query endpoints, including single and batch time series

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::api::types::resolve_time_range;
use crate::core::constants::BATCH_SERIES_MAX_QUERIES;
use crate::data::duckdb::repositories::metric;
use crate::data::duckdb::repositories::series::{self, SeriesGroup, SeriesParams, SeriesResult};

const DEFAULT_INTERVAL_SECONDS: u64 = 60;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MetricListQuery {
    pub service: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<MetricListQuery>,
) -> Result<Json<Vec<metric::MetricInfo>>, ApiError> {
    let (from, to) = resolve_time_range(query.from, query.to);
    let service = query.service;
    let infos = state
        .store
        .read(move |conn| metric::list_metrics(conn, from, to, service.as_deref()))
        .await?;
    Ok(Json(infos))
}

#[derive(Debug, Deserialize)]
pub struct NamesQuery {
    pub service: Option<String>,
}

pub async fn names(
    State(state): State<ApiState>,
    Query(query): Query<NamesQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let service = query.service;
    let names = state
        .store
        .read(move |conn| metric::metric_names(conn, service.as_deref()))
        .await?;
    Ok(Json(names))
}

#[derive(Debug, Deserialize)]
pub struct BreakdownQuery {
    pub name: String,
    pub attribute: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn breakdown(
    State(state): State<ApiState>,
    Query(query): Query<BreakdownQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    if query.name.is_empty() || query.attribute.is_empty() {
        return Err(ApiError::Validation(
            "name and attribute are required".to_string(),
        ));
    }
    let (from, to) = resolve_time_range(query.from, query.to);
    let values = state
        .store
        .read(move |conn| metric::breakdown_values(conn, &query.name, &query.attribute, from, to))
        .await?;
    Ok(Json(values))
}

// =============================================================================
// Series
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub name: String,
    pub service: Option<String>,
    /// Bucket width in seconds
    pub interval: Option<u64>,
    pub aggregate: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SeriesQuery {
    fn into_params(self) -> Result<SeriesParams, ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation("name is required".to_string()));
        }
        let interval = self.interval.unwrap_or(DEFAULT_INTERVAL_SECONDS);
        if interval == 0 {
            return Err(ApiError::Validation(
                "interval must be at least 1 second".to_string(),
            ));
        }
        let (from, to) = resolve_time_range(self.from, self.to);
        Ok(SeriesParams {
            name: self.name,
            service: self.service,
            from,
            to,
            interval_seconds: interval,
            aggregate: self.aggregate.unwrap_or(false),
        })
    }
}

pub async fn series(
    State(state): State<ApiState>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResult>, ApiError> {
    let params = query.into_params()?;
    let result = state
        .store
        .read(move |conn| {
            match series::series_meta(conn, &params.name)? {
                Some(meta) => series::query_series(conn, &params, &meta),
                // unseen metrics are empty results, not errors
                None => Ok(SeriesResult {
                    name: params.name.clone(),
                    ..Default::default()
                }),
            }
        })
        .await?;
    Ok(Json(result))
}

// =============================================================================
// Batch series
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct BatchSeriesRequest {
    pub queries: Vec<BatchQuery>,
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub id: String,
    pub name: String,
    pub service: Option<String>,
    pub interval: Option<u64>,
    pub aggregate: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSeriesEntry {
    pub success: bool,
    pub series: Vec<SeriesGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSeriesResponse {
    pub results: HashMap<String, BatchSeriesEntry>,
}

/// Up to 50 series queries in one call. Type metadata for all distinct
/// metric names is pre-fetched in a single query, then the sub-queries
/// run concurrently. Per-query failures are reported per id and never
/// fail the batch.
pub async fn batch_series(
    State(state): State<ApiState>,
    Json(request): Json<BatchSeriesRequest>,
) -> Result<Json<BatchSeriesResponse>, ApiError> {
    if request.queries.is_empty() {
        return Err(ApiError::Validation("queries must not be empty".to_string()));
    }
    if request.queries.len() > BATCH_SERIES_MAX_QUERIES {
        return Err(ApiError::Validation(format!(
            "at most {} queries per batch",
            BATCH_SERIES_MAX_QUERIES
        )));
    }

    let mut names: Vec<String> = request.queries.iter().map(|q| q.name.clone()).collect();
    names.sort();
    names.dedup();

    let metas = state
        .store
        .read(move |conn| series::series_meta_many(conn, &names))
        .await?;

    let tasks = request.queries.into_iter().map(|query| {
        let store = state.store.clone();
        let meta = metas.get(&query.name).copied();
        async move {
            let id = query.id.clone();
            let interval = query.interval.unwrap_or(DEFAULT_INTERVAL_SECONDS).max(1);
            let (from, to) = resolve_time_range(query.from, query.to);
            let params = SeriesParams {
                name: query.name,
                service: query.service,
                from,
                to,
                interval_seconds: interval,
                aggregate: query.aggregate.unwrap_or(false),
            };

            let Some(meta) = meta else {
                // unseen metric: empty success
                return (
                    id,
                    BatchSeriesEntry {
                        success: true,
                        series: Vec::new(),
                        aggregate: None,
                        error: None,
                    },
                );
            };

            let outcome = store
                .read(move |conn| series::query_series(conn, &params, &meta))
                .await;
            let entry = match outcome {
                Ok(result) => BatchSeriesEntry {
                    success: true,
                    series: result.series,
                    aggregate: result.aggregate,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Batch series sub-query failed");
                    BatchSeriesEntry {
                        success: false,
                        series: Vec::new(),
                        aggregate: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            (id, entry)
        }
    });

    let results = futures::future::join_all(tasks).await.into_iter().collect();
    Ok(Json(BatchSeriesResponse { results }))
}
