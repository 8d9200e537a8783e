//! Shared row model
//!
//! Flat records produced by the normalizer and persisted by the store.
//! Attribute maps are flat string maps (see `utils::otlp`); list-shaped
//! span fields (events, links) are carried as typed vectors and persisted
//! as parallel JSON lists.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanKind {
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    pub fn from_otlp(kind: i32) -> Self {
        match kind {
            1 => SpanKind::Internal,
            2 => SpanKind::Server,
            3 => SpanKind::Client,
            4 => SpanKind::Producer,
            5 => SpanKind::Consumer,
            _ => SpanKind::Unspecified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpanKind::Unspecified => "UNSPECIFIED",
            SpanKind::Internal => "INTERNAL",
            SpanKind::Server => "SERVER",
            SpanKind::Client => "CLIENT",
            SpanKind::Producer => "PRODUCER",
            SpanKind::Consumer => "CONSUMER",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "INTERNAL" => SpanKind::Internal,
            "SERVER" => SpanKind::Server,
            "CLIENT" => SpanKind::Client,
            "PRODUCER" => SpanKind::Producer,
            "CONSUMER" => SpanKind::Consumer,
            _ => SpanKind::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Unset,
    Ok,
    Error,
}

impl StatusCode {
    pub fn from_otlp(code: i32) -> Self {
        match code {
            1 => StatusCode::Ok,
            2 => StatusCode::Error,
            _ => StatusCode::Unset,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Unset => "UNSET",
            StatusCode::Ok => "OK",
            StatusCode::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "OK" => StatusCode::Ok,
            "ERROR" => StatusCode::Error,
            _ => StatusCode::Unset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Gauge,
    Sum,
    Histogram,
    ExponentialHistogram,
    Summary,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Sum => "sum",
            MetricType::Histogram => "histogram",
            MetricType::ExponentialHistogram => "exponential_histogram",
            MetricType::Summary => "summary",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sum" => MetricType::Sum,
            "histogram" => MetricType::Histogram,
            "exponential_histogram" => MetricType::ExponentialHistogram,
            "summary" => MetricType::Summary,
            _ => MetricType::Gauge,
        }
    }
}

/// OTLP aggregation temporality, persisted as its wire integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationTemporality {
    Unspecified,
    Delta,
    Cumulative,
}

impl AggregationTemporality {
    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => AggregationTemporality::Delta,
            2 => AggregationTemporality::Cumulative,
            _ => AggregationTemporality::Unspecified,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            AggregationTemporality::Unspecified => 0,
            AggregationTemporality::Delta => 1,
            AggregationTemporality::Cumulative => 2,
        }
    }
}

// =============================================================================
// Telemetry rows
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEvent {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanLink {
    pub trace_id: String,
    pub span_id: String,
    pub trace_state: String,
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRow {
    /// Span start time
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub span_id: String,
    /// Empty when the span is a root
    pub parent_span_id: String,
    pub trace_state: String,
    pub span_name: String,
    pub span_kind: SpanKind,
    pub service_name: String,
    pub resource_attrs: HashMap<String, String>,
    pub scope_name: String,
    pub scope_version: String,
    pub span_attrs: HashMap<String, String>,
    /// Always >= 0; negative end-before-start inputs clamp to 0
    pub duration_ns: i64,
    pub status_code: StatusCode,
    pub status_message: String,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRow {
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: i32,
    pub severity_text: String,
    /// 1-24 per the OTLP severity scale; 0 when unset
    pub severity_number: i32,
    pub service_name: String,
    pub body: String,
    pub resource_schema_url: String,
    pub resource_attrs: HashMap<String, String>,
    pub scope_schema_url: String,
    pub scope_name: String,
    pub scope_version: String,
    pub scope_attrs: HashMap<String, String>,
    pub log_attrs: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    pub metric_name: String,
    pub description: String,
    pub unit: String,
    pub resource_attrs: HashMap<String, String>,
    pub scope_name: String,
    pub scope_version: String,
    /// Data point attributes
    pub attrs: HashMap<String, String>,
    pub metric_type: MetricType,
    /// Populated for gauge and sum points
    pub value: Option<f64>,
    pub aggregation_temporality: AggregationTemporality,
    pub is_monotonic: Option<bool>,
    // Histogram
    pub count: Option<i64>,
    pub sum: Option<f64>,
    pub bucket_counts: Option<Vec<i64>>,
    pub explicit_bounds: Option<Vec<f64>>,
    // Exponential histogram
    pub scale: Option<i32>,
    pub zero_count: Option<i64>,
    pub positive_offset: Option<i32>,
    pub positive_bucket_counts: Option<Vec<i64>>,
    pub negative_offset: Option<i32>,
    pub negative_bucket_counts: Option<Vec<i64>>,
    // Summary
    pub quantile_quantiles: Option<Vec<f64>>,
    pub quantile_values: Option<Vec<f64>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Default for MetricRow {
    fn default() -> Self {
        Self {
            timestamp: Utc.timestamp_nanos(0),
            service_name: String::new(),
            metric_name: String::new(),
            description: String::new(),
            unit: String::new(),
            resource_attrs: HashMap::new(),
            scope_name: String::new(),
            scope_version: String::new(),
            attrs: HashMap::new(),
            metric_type: MetricType::Gauge,
            value: None,
            aggregation_temporality: AggregationTemporality::Unspecified,
            is_monotonic: None,
            count: None,
            sum: None,
            bucket_counts: None,
            explicit_bounds: None,
            scale: None,
            zero_count: None,
            positive_offset: None,
            positive_bucket_counts: None,
            negative_offset: None,
            negative_bucket_counts: None,
            quantile_quantiles: None,
            quantile_values: None,
            min: None,
            max: None,
        }
    }
}

// =============================================================================
// Dashboards
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardWidget {
    pub id: String,
    pub dashboard_id: String,
    pub widget_type: String,
    pub title: String,
    pub grid_col: i32,
    pub grid_row: i32,
    pub col_span: i32,
    pub row_span: i32,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Hub notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Traces,
    Metrics,
    Logs,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Traces => "traces",
            SignalKind::Metrics => "metrics",
            SignalKind::Logs => "logs",
        }
    }
}

/// Compact notification pushed to live subscribers after an ingest commit.
/// Carries counts and provenance only, never the rows themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestNotification {
    pub kind: SignalKind,
    pub count: u64,
    pub service_names: Vec<String>,
    pub latest_timestamp: DateTime<Utc>,
}

// =============================================================================
// Deletion
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    Logs,
    Metrics,
    Traces,
    All,
}

impl DeleteScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "logs" => Some(DeleteScope::Logs),
            "metrics" => Some(DeleteScope::Metrics),
            "traces" => Some(DeleteScope::Traces),
            "all" => Some(DeleteScope::All),
            _ => None,
        }
    }
}

/// Per-table counts returned by a telemetry deletion
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCounts {
    pub traces: u64,
    pub logs: u64,
    pub metrics: u64,
}
