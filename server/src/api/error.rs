//! Query API error type
//!
//! Maps the error taxonomy onto HTTP statuses: validation -> 400,
//! missing entity -> 404, storage -> 500. Internal detail is logged but
//! not exposed for storage failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::data::duckdb::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("not found: {}", what)),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal storage error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Validation("bad interval".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::NotFound("dashboard x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Store(StoreError::Closed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_store_not_found_becomes_404() {
        let error: ApiError = StoreError::NotFound("widget 7".to_string()).into();
        assert!(matches!(error, ApiError::NotFound(_)));
    }
}
