//! Log record normalization

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::logs::v1::LogRecord;

use crate::data::types::LogRow;
use crate::utils::otlp::{any_value_to_string, extract_attributes, resolve_service_name};
use crate::utils::time::{nanos_to_datetime, parse_rfc3339};

/// Attribute some producers use instead of `time_unix_nano`
const EVENT_TIMESTAMP_ATTR: &str = "event.timestamp";

/// Attribute that names the event when the body is empty
const EVENT_NAME_ATTR: &str = "event.name";

/// Lower an OTLP logs export into log rows
pub fn normalize_logs(request: &ExportLogsServiceRequest) -> Vec<LogRow> {
    let mut rows = Vec::new();

    for resource_logs in &request.resource_logs {
        let resource_attrs = resource_logs
            .resource
            .as_ref()
            .map(|r| extract_attributes(&r.attributes))
            .unwrap_or_default();
        let service_name = resolve_service_name(&resource_attrs);

        for scope_logs in &resource_logs.scope_logs {
            let (scope_name, scope_version, scope_attrs) = scope_logs
                .scope
                .as_ref()
                .map(|s| {
                    (
                        s.name.clone(),
                        s.version.clone(),
                        extract_attributes(&s.attributes),
                    )
                })
                .unwrap_or_default();

            for record in &scope_logs.log_records {
                let log_attrs = extract_attributes(&record.attributes);

                let mut body = record
                    .body
                    .as_ref()
                    .map(any_value_to_string)
                    .unwrap_or_default();
                if body.is_empty()
                    && let Some(event_name) = log_attrs.get(EVENT_NAME_ATTR)
                {
                    body = event_name.clone();
                }

                let severity_number = record.severity_number;
                let severity_text = if record.severity_text.is_empty() {
                    severity_text_for(severity_number).to_string()
                } else {
                    record.severity_text.clone()
                };

                rows.push(LogRow {
                    timestamp: resolve_timestamp(record, &log_attrs),
                    trace_id: hex::encode(&record.trace_id),
                    span_id: hex::encode(&record.span_id),
                    trace_flags: record.flags as i32,
                    severity_text,
                    severity_number,
                    service_name: service_name.clone(),
                    body,
                    resource_schema_url: resource_logs.schema_url.clone(),
                    resource_attrs: resource_attrs.clone(),
                    scope_schema_url: scope_logs.schema_url.clone(),
                    scope_name: scope_name.clone(),
                    scope_version: scope_version.clone(),
                    scope_attrs: scope_attrs.clone(),
                    log_attrs,
                });
            }
        }
    }

    rows
}

/// Timestamp fallback order: record time, then the `event.timestamp`
/// attribute (RFC 3339), then the observed time
fn resolve_timestamp(
    record: &LogRecord,
    log_attrs: &std::collections::HashMap<String, String>,
) -> chrono::DateTime<chrono::Utc> {
    if record.time_unix_nano != 0 {
        return nanos_to_datetime(record.time_unix_nano);
    }
    if let Some(dt) = log_attrs.get(EVENT_TIMESTAMP_ATTR).and_then(|v| parse_rfc3339(v)) {
        return dt;
    }
    nanos_to_datetime(record.observed_time_unix_nano)
}

/// Bucket an OTLP severity number into its text form
fn severity_text_for(severity_number: i32) -> &'static str {
    match severity_number {
        n if n >= 21 => "FATAL",
        n if n >= 17 => "ERROR",
        n if n >= 13 => "WARN",
        n if n >= 9 => "INFO",
        n if n >= 5 => "DEBUG",
        n if n >= 1 => "TRACE",
        _ => "",
    }
}
