//! OTLP/HTTP ingestion endpoints
//!
//! Standard per-signal paths plus a root endpoint that auto-routes by
//! payload content for producers that post every signal to `/`. gzip
//! request bodies are decompressed by middleware; the body format is
//! sniffed per request (never trusted from `Content-Type`).

pub mod encoding;
mod export;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::timeout::TimeoutLayer;

use crate::core::constants::{INGEST_TIMEOUT_SECS, OTLP_BODY_LIMIT};
use crate::domain::ingest::IngestPipeline;

use super::health;

#[derive(Clone)]
pub struct OtlpState {
    pub pipeline: Arc<IngestPipeline>,
}

pub fn routes(pipeline: Arc<IngestPipeline>) -> Router {
    let state = OtlpState { pipeline };

    Router::new()
        .route("/v1/traces", post(export::traces))
        .route("/v1/metrics", post(export::metrics))
        .route("/v1/logs", post(export::logs))
        .route("/", post(export::auto_route))
        .route("/health", get(health::health))
        .layer(DefaultBodyLimit::max(OTLP_BODY_LIMIT))
        .layer(RequestDecompressionLayer::new().gzip(true))
        .layer(TimeoutLayer::new(Duration::from_secs(INGEST_TIMEOUT_SECS)))
        .with_state(state)
}
