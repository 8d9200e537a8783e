//! Ingest pipeline
//!
//! Drives one decoded OTLP export end-to-end: normalize, derive, commit
//! originals and derived rows in a single transaction, then notify the
//! hub. Derivation reads (delta priors) happen before the write lock is
//! taken; hub notifications go out strictly after commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

use crate::data::duckdb::repositories::{log as log_repo, metric as metric_repo, span as span_repo};
use crate::data::duckdb::{Store, StoreError};
use crate::data::types::{IngestNotification, SignalKind};
use crate::domain::derive;
use crate::domain::normalize::{normalize_logs, normalize_metrics, normalize_traces};
use crate::domain::pricing::PricingTable;
use crate::hub::Hub;

pub struct IngestPipeline {
    store: Arc<Store>,
    hub: Arc<Hub>,
    pricing: Arc<PricingTable>,
}

impl IngestPipeline {
    pub fn new(store: Arc<Store>, hub: Arc<Hub>, pricing: Arc<PricingTable>) -> Self {
        Self { store, hub, pricing }
    }

    pub async fn ingest_traces(
        &self,
        request: &ExportTraceServiceRequest,
    ) -> Result<(), StoreError> {
        let spans = normalize_traces(request);
        if spans.is_empty() {
            return Ok(());
        }

        let notification = notification(
            SignalKind::Traces,
            spans.len(),
            spans.iter().map(|s| (s.service_name.as_str(), s.timestamp)),
        );

        self.store
            .write(move |conn| span_repo::insert_spans(conn, &spans))
            .await?;

        self.hub.publish(&notification);
        Ok(())
    }

    pub async fn ingest_metrics(
        &self,
        request: &ExportMetricsServiceRequest,
    ) -> Result<(), StoreError> {
        let mut metrics = normalize_metrics(request);
        let mut logs = Vec::new();
        derive::run_derivations(&self.store, &self.pricing, &mut logs, &mut metrics).await;
        if metrics.is_empty() {
            return Ok(());
        }

        let notification = notification(
            SignalKind::Metrics,
            metrics.len(),
            metrics.iter().map(|m| (m.service_name.as_str(), m.timestamp)),
        );

        self.store
            .write(move |conn| metric_repo::insert_metrics(conn, &metrics))
            .await?;

        self.hub.publish(&notification);
        Ok(())
    }

    /// Logs may shed derived metric rows (Codex SSE extraction); both
    /// classes commit in the same transaction and each non-empty class
    /// notifies separately.
    pub async fn ingest_logs(&self, request: &ExportLogsServiceRequest) -> Result<(), StoreError> {
        let mut logs = normalize_logs(request);
        let mut metrics = Vec::new();
        derive::run_derivations(&self.store, &self.pricing, &mut logs, &mut metrics).await;
        if logs.is_empty() && metrics.is_empty() {
            return Ok(());
        }

        let log_notification = (!logs.is_empty()).then(|| {
            notification(
                SignalKind::Logs,
                logs.len(),
                logs.iter().map(|l| (l.service_name.as_str(), l.timestamp)),
            )
        });
        let metric_notification = (!metrics.is_empty()).then(|| {
            notification(
                SignalKind::Metrics,
                metrics.len(),
                metrics.iter().map(|m| (m.service_name.as_str(), m.timestamp)),
            )
        });

        self.store
            .write(move |conn| {
                log_repo::insert_logs(conn, &logs)?;
                metric_repo::insert_metrics(conn, &metrics)
            })
            .await?;

        if let Some(n) = log_notification {
            self.hub.publish(&n);
        }
        if let Some(n) = metric_notification {
            self.hub.publish(&n);
        }
        Ok(())
    }
}

fn notification<'a>(
    kind: SignalKind,
    count: usize,
    rows: impl Iterator<Item = (&'a str, DateTime<Utc>)>,
) -> IngestNotification {
    let mut services = BTreeSet::new();
    let mut latest: Option<DateTime<Utc>> = None;
    for (service, timestamp) in rows {
        services.insert(service.to_string());
        if latest.is_none_or(|l| timestamp > l) {
            latest = Some(timestamp);
        }
    }
    IngestNotification {
        kind,
        count: count as u64,
        service_names: services.into_iter().collect(),
        latest_timestamp: latest.unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
    use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
    use opentelemetry_proto::tonic::metrics::v1::{
        Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum, metric, number_data_point,
    };
    use opentelemetry_proto::tonic::resource::v1::Resource;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

    use crate::core::constants::CODEX_SERVICE_NAME;

    fn string_attr(key: &str, value: &str) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue(value.to_string())),
            }),
        }
    }

    async fn make_pipeline() -> (IngestPipeline, Arc<Store>, Arc<Hub>) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let hub = Arc::new(Hub::new());
        let pipeline = IngestPipeline::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            Arc::new(PricingTable::new()),
        );
        (pipeline, store, hub)
    }

    fn trace_request(service: &str) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource {
                    attributes: vec![string_attr("service.name", service)],
                    dropped_attributes_count: 0,
                }),
                scope_spans: vec![ScopeSpans {
                    scope: None,
                    spans: vec![Span {
                        trace_id: vec![1; 16],
                        span_id: vec![2; 8],
                        trace_state: String::new(),
                        parent_span_id: vec![],
                        flags: 0,
                        name: "root".to_string(),
                        kind: 1,
                        start_time_unix_nano: 1_700_000_000_000_000_000,
                        end_time_unix_nano: 1_700_000_001_000_000_000,
                        attributes: vec![],
                        dropped_attributes_count: 0,
                        events: vec![],
                        dropped_events_count: 0,
                        links: vec![],
                        dropped_links_count: 0,
                        status: None,
                    }],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        }
    }

    fn codex_sse_request() -> ExportLogsServiceRequest {
        ExportLogsServiceRequest {
            resource_logs: vec![ResourceLogs {
                resource: Some(Resource {
                    attributes: vec![string_attr("service.name", CODEX_SERVICE_NAME)],
                    dropped_attributes_count: 0,
                }),
                scope_logs: vec![ScopeLogs {
                    scope: None,
                    log_records: vec![LogRecord {
                        time_unix_nano: 1_700_000_000_000_000_000,
                        observed_time_unix_nano: 0,
                        severity_number: 9,
                        severity_text: "INFO".to_string(),
                        body: None,
                        attributes: vec![
                            string_attr("event.name", "codex.sse_event"),
                            string_attr("event.kind", "response.completed"),
                            string_attr("input_token_count", "1000"),
                            string_attr("output_token_count", "500"),
                            string_attr("cached_token_count", "200"),
                            string_attr("model", "gpt-5"),
                        ],
                        dropped_attributes_count: 0,
                        flags: 0,
                        trace_id: vec![],
                        span_id: vec![],
                        event_name: String::new(),
                    }],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        }
    }

    #[tokio::test]
    async fn test_ingest_traces_commits_and_notifies() {
        let (pipeline, store, hub) = make_pipeline().await;
        let hub_arc = Arc::clone(&hub);
        let mut sub = hub_arc.subscribe();

        pipeline.ingest_traces(&trace_request("svc")).await.unwrap();

        let count: i64 = store
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM traces", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let payload = sub.recv().await.unwrap();
        let parsed: IngestNotification = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.kind, SignalKind::Traces);
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.service_names, vec!["svc".to_string()]);
    }

    #[tokio::test]
    async fn test_ingest_empty_request_is_silent() {
        let (pipeline, _store, hub) = make_pipeline().await;
        let mut sub = hub.subscribe();

        pipeline
            .ingest_traces(&ExportTraceServiceRequest {
                resource_spans: vec![],
            })
            .await
            .unwrap();

        hub.publish(&IngestNotification {
            kind: SignalKind::Logs,
            count: 0,
            service_names: vec![],
            latest_timestamp: Utc::now(),
        });
        let payload = sub.recv().await.unwrap();
        let parsed: IngestNotification = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.count, 0, "only the probe notification arrived");
    }

    #[tokio::test]
    async fn test_codex_sse_logs_become_metrics_in_one_transaction() {
        let (pipeline, store, hub) = make_pipeline().await;
        let mut sub = hub.subscribe();

        pipeline.ingest_logs(&codex_sse_request()).await.unwrap();

        let (log_count, metric_count): (i64, i64) = store
            .read(|conn| {
                let logs: i64 =
                    conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
                let metrics: i64 =
                    conn.query_row("SELECT COUNT(*) FROM metrics", [], |row| row.get(0))?;
                Ok((logs, metrics))
            })
            .await
            .unwrap();
        assert_eq!(log_count, 0, "SSE log must not be stored");
        assert_eq!(metric_count, 4, "input, output, cacheRead, cost");

        let payload = sub.recv().await.unwrap();
        let parsed: IngestNotification = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.kind, SignalKind::Metrics, "no log notification for an all-derived batch");

        let cost: f64 = store
            .read(|conn| {
                conn.query_row(
                    "SELECT value FROM metrics WHERE metric_name = 'codex_cli_rs.cost.usage'",
                    [],
                    |row| row.get(0),
                )
                .map_err(StoreError::from)
            })
            .await
            .unwrap();
        assert!(cost > 0.0);
    }

    #[tokio::test]
    async fn test_ingest_cumulative_twice_derives_delta_once() {
        let (pipeline, store, _hub) = make_pipeline().await;

        let make_request = |value: i64, nanos: u64| ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                resource: Some(Resource {
                    attributes: vec![string_attr("service.name", "gemini-cli")],
                    dropped_attributes_count: 0,
                }),
                scope_metrics: vec![ScopeMetrics {
                    scope: None,
                    metrics: vec![Metric {
                        name: "gemini_cli.token.usage".to_string(),
                        description: String::new(),
                        unit: "tokens".to_string(),
                        metadata: vec![],
                        data: Some(metric::Data::Sum(Sum {
                            data_points: vec![NumberDataPoint {
                                attributes: vec![
                                    string_attr("type", "input"),
                                    string_attr("model", "gemini-2.5-flash"),
                                ],
                                start_time_unix_nano: 0,
                                time_unix_nano: nanos,
                                exemplars: vec![],
                                flags: 0,
                                value: Some(number_data_point::Value::AsInt(value)),
                            }],
                            aggregation_temporality: 2,
                            is_monotonic: true,
                        })),
                    }],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        };

        pipeline
            .ingest_metrics(&make_request(100, 1_700_000_000_000_000_000))
            .await
            .unwrap();
        pipeline
            .ingest_metrics(&make_request(150, 1_700_000_060_000_000_000))
            .await
            .unwrap();

        let delta_count: i64 = store
            .read(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM metrics WHERE metric_name = 'gemini_cli.token.usage.delta'",
                    [],
                    |row| row.get(0),
                )
                .map_err(StoreError::from)
            })
            .await
            .unwrap();
        assert_eq!(delta_count, 1, "first ingest seeds, second derives");
    }
}
