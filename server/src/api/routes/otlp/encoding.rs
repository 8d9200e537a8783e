//! OTLP payload format detection and decoding
//!
//! Producers occasionally mis-label `Content-Type`, so the format is
//! sniffed from the payload bytes themselves and the header is ignored.
//! Detection is non-destructive: it only inspects the buffered body.

use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use prost::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Protobuf tags for field 1/2 with wire type 2, the first byte of every
/// OTLP export request
const PROTO_FIELD_TAGS: &[u8] = &[0x0A, 0x12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Binary,
    Unknown,
}

impl PayloadFormat {
    /// Content type for the matching response encoding
    pub fn response_content_type(self) -> &'static str {
        match self {
            PayloadFormat::Json => "application/json",
            _ => "application/x-protobuf",
        }
    }
}

/// Sniff the payload format from its bytes: skip a UTF-8 BOM and ASCII
/// whitespace, then classify on the first remaining byte.
pub fn detect_format(body: &[u8]) -> PayloadFormat {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    let first = body
        .iter()
        .copied()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'));

    match first {
        Some(b'{') | Some(b'[') => PayloadFormat::Json,
        Some(b) if PROTO_FIELD_TAGS.contains(&b) => PayloadFormat::Binary,
        Some(b) if b < 0x20 => PayloadFormat::Binary,
        Some(_) => PayloadFormat::Binary,
        None => PayloadFormat::Unknown,
    }
}

/// Error returned when decoding fails
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("protobuf decode error: {0}")]
    Protobuf(String),

    #[error("JSON decode error: {0}")]
    Json(String),

    #[error("empty or unrecognized payload")]
    UnknownFormat,
}

impl DecodeError {
    /// Decode failures are client errors; detail is logged, not exposed
    pub fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Failed to decode OTLP request");
        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            "Failed to decode OTLP request",
        )
            .into_response()
    }
}

/// Decode an OTLP export request in the detected format
pub fn decode_request<T>(body: &Bytes, format: PayloadFormat) -> Result<T, DecodeError>
where
    T: Message + Default + for<'de> Deserialize<'de>,
{
    match format {
        PayloadFormat::Json => {
            serde_json::from_slice(body.as_ref()).map_err(|e| DecodeError::Json(e.to_string()))
        }
        PayloadFormat::Binary => {
            T::decode(body.as_ref()).map_err(|e| DecodeError::Protobuf(e.to_string()))
        }
        PayloadFormat::Unknown => Err(DecodeError::UnknownFormat),
    }
}

/// Encode a successful OTLP export response in the matching format
pub fn success_response<T>(response: &T, format: PayloadFormat) -> Response
where
    T: Message + Serialize,
{
    let encoded = match format {
        PayloadFormat::Json => {
            serde_json::to_vec(response).map_err(|e| e.to_string())
        }
        _ => Ok(response.encode_to_vec()),
    };

    match encoded {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, format.response_content_type())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode OTLP response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "Internal server error",
            )
                .into_response()
        }
    }
}
