//! Metric data point normalization
//!
//! One row per data point, with the type-discriminated value fields
//! populated per metric type.

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{Metric, metric, number_data_point};

use crate::data::types::{AggregationTemporality, MetricRow, MetricType};
use crate::utils::otlp::{extract_attributes, resolve_service_name};
use crate::utils::time::nanos_to_datetime;

/// Lower an OTLP metrics export into metric rows
pub fn normalize_metrics(request: &ExportMetricsServiceRequest) -> Vec<MetricRow> {
    let mut rows = Vec::new();

    for resource_metrics in &request.resource_metrics {
        let resource_attrs = resource_metrics
            .resource
            .as_ref()
            .map(|r| extract_attributes(&r.attributes))
            .unwrap_or_default();
        let service_name = resolve_service_name(&resource_attrs);

        for scope_metrics in &resource_metrics.scope_metrics {
            let (scope_name, scope_version) = scope_metrics
                .scope
                .as_ref()
                .map(|s| (s.name.clone(), s.version.clone()))
                .unwrap_or_default();

            for m in &scope_metrics.metrics {
                let base = MetricRow {
                    service_name: service_name.clone(),
                    metric_name: m.name.clone(),
                    description: m.description.clone(),
                    unit: m.unit.clone(),
                    resource_attrs: resource_attrs.clone(),
                    scope_name: scope_name.clone(),
                    scope_version: scope_version.clone(),
                    ..Default::default()
                };
                append_points(m, &base, &mut rows);
            }
        }
    }

    rows
}

fn number_value(value: Option<&number_data_point::Value>) -> Option<f64> {
    match value {
        Some(number_data_point::Value::AsDouble(d)) => Some(*d),
        Some(number_data_point::Value::AsInt(i)) => Some(*i as f64),
        None => None,
    }
}

fn append_points(m: &Metric, base: &MetricRow, rows: &mut Vec<MetricRow>) {
    match &m.data {
        Some(metric::Data::Gauge(gauge)) => {
            for point in &gauge.data_points {
                rows.push(MetricRow {
                    timestamp: nanos_to_datetime(point.time_unix_nano),
                    attrs: extract_attributes(&point.attributes),
                    metric_type: MetricType::Gauge,
                    value: number_value(point.value.as_ref()),
                    ..base.clone()
                });
            }
        }
        Some(metric::Data::Sum(sum)) => {
            for point in &sum.data_points {
                rows.push(MetricRow {
                    timestamp: nanos_to_datetime(point.time_unix_nano),
                    attrs: extract_attributes(&point.attributes),
                    metric_type: MetricType::Sum,
                    value: number_value(point.value.as_ref()),
                    aggregation_temporality: AggregationTemporality::from_i32(
                        sum.aggregation_temporality,
                    ),
                    is_monotonic: Some(sum.is_monotonic),
                    ..base.clone()
                });
            }
        }
        Some(metric::Data::Histogram(histogram)) => {
            for point in &histogram.data_points {
                rows.push(MetricRow {
                    timestamp: nanos_to_datetime(point.time_unix_nano),
                    attrs: extract_attributes(&point.attributes),
                    metric_type: MetricType::Histogram,
                    aggregation_temporality: AggregationTemporality::from_i32(
                        histogram.aggregation_temporality,
                    ),
                    count: Some(point.count.min(i64::MAX as u64) as i64),
                    sum: point.sum,
                    bucket_counts: Some(
                        point
                            .bucket_counts
                            .iter()
                            .map(|&c| c.min(i64::MAX as u64) as i64)
                            .collect(),
                    ),
                    explicit_bounds: Some(point.explicit_bounds.clone()),
                    min: point.min,
                    max: point.max,
                    ..base.clone()
                });
            }
        }
        Some(metric::Data::ExponentialHistogram(histogram)) => {
            for point in &histogram.data_points {
                let positive = point.positive.as_ref();
                let negative = point.negative.as_ref();
                rows.push(MetricRow {
                    timestamp: nanos_to_datetime(point.time_unix_nano),
                    attrs: extract_attributes(&point.attributes),
                    metric_type: MetricType::ExponentialHistogram,
                    aggregation_temporality: AggregationTemporality::from_i32(
                        histogram.aggregation_temporality,
                    ),
                    count: Some(point.count.min(i64::MAX as u64) as i64),
                    sum: point.sum,
                    scale: Some(point.scale),
                    zero_count: Some(point.zero_count.min(i64::MAX as u64) as i64),
                    positive_offset: positive.map(|b| b.offset),
                    positive_bucket_counts: positive.map(|b| {
                        b.bucket_counts
                            .iter()
                            .map(|&c| c.min(i64::MAX as u64) as i64)
                            .collect()
                    }),
                    negative_offset: negative.map(|b| b.offset),
                    negative_bucket_counts: negative.map(|b| {
                        b.bucket_counts
                            .iter()
                            .map(|&c| c.min(i64::MAX as u64) as i64)
                            .collect()
                    }),
                    min: point.min,
                    max: point.max,
                    ..base.clone()
                });
            }
        }
        Some(metric::Data::Summary(summary)) => {
            for point in &summary.data_points {
                rows.push(MetricRow {
                    timestamp: nanos_to_datetime(point.time_unix_nano),
                    attrs: extract_attributes(&point.attributes),
                    metric_type: MetricType::Summary,
                    count: Some(point.count.min(i64::MAX as u64) as i64),
                    sum: Some(point.sum),
                    quantile_quantiles: Some(
                        point.quantile_values.iter().map(|q| q.quantile).collect(),
                    ),
                    quantile_values: Some(point.quantile_values.iter().map(|q| q.value).collect()),
                    ..base.clone()
                });
            }
        }
        None => {}
    }
}
