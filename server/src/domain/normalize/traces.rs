//! Span normalization

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

use crate::data::types::{SpanEvent, SpanKind, SpanLink, SpanRow, StatusCode};
use crate::utils::otlp::{extract_attributes, resolve_service_name};
use crate::utils::time::nanos_to_datetime;

/// Lower an OTLP trace export into span rows
pub fn normalize_traces(request: &ExportTraceServiceRequest) -> Vec<SpanRow> {
    let mut rows = Vec::new();

    for resource_spans in &request.resource_spans {
        let resource_attrs = resource_spans
            .resource
            .as_ref()
            .map(|r| extract_attributes(&r.attributes))
            .unwrap_or_default();
        let service_name = resolve_service_name(&resource_attrs);

        for scope_spans in &resource_spans.scope_spans {
            let (scope_name, scope_version) = scope_spans
                .scope
                .as_ref()
                .map(|s| (s.name.clone(), s.version.clone()))
                .unwrap_or_default();

            for span in &scope_spans.spans {
                let (status_code, status_message) = span
                    .status
                    .as_ref()
                    .map(|s| (StatusCode::from_otlp(s.code), s.message.clone()))
                    .unwrap_or((StatusCode::Unset, String::new()));

                let events = span
                    .events
                    .iter()
                    .map(|e| SpanEvent {
                        timestamp: nanos_to_datetime(e.time_unix_nano),
                        name: e.name.clone(),
                        attrs: extract_attributes(&e.attributes),
                    })
                    .collect();
                let links = span
                    .links
                    .iter()
                    .map(|l| SpanLink {
                        trace_id: hex::encode(&l.trace_id),
                        span_id: hex::encode(&l.span_id),
                        trace_state: l.trace_state.clone(),
                        attrs: extract_attributes(&l.attributes),
                    })
                    .collect();

                rows.push(SpanRow {
                    timestamp: nanos_to_datetime(span.start_time_unix_nano),
                    trace_id: hex::encode(&span.trace_id),
                    span_id: hex::encode(&span.span_id),
                    parent_span_id: hex::encode(&span.parent_span_id),
                    trace_state: span.trace_state.clone(),
                    span_name: span.name.clone(),
                    span_kind: SpanKind::from_otlp(span.kind),
                    service_name: service_name.clone(),
                    resource_attrs: resource_attrs.clone(),
                    scope_name: scope_name.clone(),
                    scope_version: scope_version.clone(),
                    span_attrs: extract_attributes(&span.attributes),
                    duration_ns: span
                        .end_time_unix_nano
                        .saturating_sub(span.start_time_unix_nano)
                        .min(i64::MAX as u64) as i64,
                    status_code,
                    status_message,
                    events,
                    links,
                });
            }
        }
    }

    rows
}
