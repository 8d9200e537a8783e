//! OTLP export handlers

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};

use super::OtlpState;
use super::encoding::{decode_request, detect_format, success_response};
use crate::data::duckdb::StoreError;

fn storage_failure(e: StoreError) -> Response {
    tracing::error!(error = %e, "Ingest commit failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        "Failed to store telemetry",
    )
        .into_response()
}

pub async fn traces(State(state): State<OtlpState>, body: Bytes) -> Response {
    let format = detect_format(&body);
    let request: ExportTraceServiceRequest = match decode_request(&body, format) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.pipeline.ingest_traces(&request).await {
        Ok(()) => success_response(
            &ExportTraceServiceResponse {
                partial_success: None,
            },
            format,
        ),
        Err(e) => storage_failure(e),
    }
}

pub async fn metrics(State(state): State<OtlpState>, body: Bytes) -> Response {
    let format = detect_format(&body);
    let request: ExportMetricsServiceRequest = match decode_request(&body, format) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.pipeline.ingest_metrics(&request).await {
        Ok(()) => success_response(
            &ExportMetricsServiceResponse {
                partial_success: None,
            },
            format,
        ),
        Err(e) => storage_failure(e),
    }
}

pub async fn logs(State(state): State<OtlpState>, body: Bytes) -> Response {
    let format = detect_format(&body);
    let request: ExportLogsServiceRequest = match decode_request(&body, format) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.pipeline.ingest_logs(&request).await {
        Ok(()) => success_response(
            &ExportLogsServiceResponse {
                partial_success: None,
            },
            format,
        ),
        Err(e) => storage_failure(e),
    }
}

/// Signal-type auto-routing for producers that post everything to `/`:
/// decode the payload opportunistically as each signal in turn; the first
/// decode with non-empty resource records wins.
pub async fn auto_route(State(state): State<OtlpState>, body: Bytes) -> Response {
    let format = detect_format(&body);
    let mut decoded_any = false;

    if let Ok(request) = decode_request::<ExportTraceServiceRequest>(&body, format) {
        decoded_any = true;
        if !request.resource_spans.is_empty() {
            return match state.pipeline.ingest_traces(&request).await {
                Ok(()) => success_response(
                    &ExportTraceServiceResponse {
                        partial_success: None,
                    },
                    format,
                ),
                Err(e) => storage_failure(e),
            };
        }
    }

    if let Ok(request) = decode_request::<ExportMetricsServiceRequest>(&body, format) {
        decoded_any = true;
        if !request.resource_metrics.is_empty() {
            return match state.pipeline.ingest_metrics(&request).await {
                Ok(()) => success_response(
                    &ExportMetricsServiceResponse {
                        partial_success: None,
                    },
                    format,
                ),
                Err(e) => storage_failure(e),
            };
        }
    }

    match decode_request::<ExportLogsServiceRequest>(&body, format) {
        Ok(request) => {
            if !request.resource_logs.is_empty() {
                return match state.pipeline.ingest_logs(&request).await {
                    Ok(()) => success_response(
                        &ExportLogsServiceResponse {
                            partial_success: None,
                        },
                        format,
                    ),
                    Err(e) => storage_failure(e),
                };
            }
            success_response(
                &ExportLogsServiceResponse {
                    partial_success: None,
                },
                format,
            )
        }
        Err(e) => {
            if decoded_any {
                // every signal decoded empty; acknowledge the no-op
                return success_response(
                    &ExportLogsServiceResponse {
                        partial_success: None,
                    },
                    format,
                );
            }
            e.into_response()
        }
    }
}
