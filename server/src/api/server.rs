//! Router assembly for the two listeners

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::routes;
use super::ApiState;
use crate::domain::ingest::IngestPipeline;

/// The query/dashboard surface: JSON API, WebSocket, health
pub fn build_query_router(state: ApiState, allowed: &AllowedOrigins) -> Router {
    routes::query_router(state)
        .layer(middleware::cors(allowed))
        .layer(TraceLayer::new_for_http())
}

/// The ingestion surface: OTLP/HTTP endpoints, health
pub fn build_otlp_router(pipeline: Arc<IngestPipeline>) -> Router {
    routes::otlp::routes(pipeline).layer(TraceLayer::new_for_http())
}
