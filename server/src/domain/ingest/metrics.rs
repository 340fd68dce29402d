//! Metric ingestion: one stored row per OTLP metric
//!
//! Supports all 5 OTLP metric types for the time range. The full metric is
//! kept as JSON so data points can be served back unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{Metric, metric::Data};

use super::pipeline::IngestSink;
use crate::data::types::MetricRow;
use crate::data::{DataError, TelemetryRepository};
use crate::utils::otlp::{encode_attribute, extract_attributes};

pub struct MetricSink {
    repository: Arc<dyn TelemetryRepository>,
}

impl MetricSink {
    pub fn new(repository: Arc<dyn TelemetryRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl IngestSink for MetricSink {
    type Request = ExportMetricsServiceRequest;
    type Row = MetricRow;

    fn name(&self) -> &'static str {
        "metrics"
    }

    fn backend_name(&self) -> &'static str {
        self.repository.backend_name()
    }

    fn flatten(&self, requests: &[ExportMetricsServiceRequest]) -> Vec<MetricRow> {
        flatten_metrics(requests)
    }

    async fn persist(&self, chunk: &[MetricRow]) -> Result<(), DataError> {
        self.repository.insert_metrics(chunk).await
    }
}

pub fn flatten_metrics(requests: &[ExportMetricsServiceRequest]) -> Vec<MetricRow> {
    let mut rows = Vec::new();
    for request in requests {
        for resource_metrics in &request.resource_metrics {
            let resource = resource_metrics
                .resource
                .as_ref()
                .map(|r| extract_attributes(&r.attributes))
                .unwrap_or_default();
            for scope_metrics in &resource_metrics.scope_metrics {
                // Resource attributes win over scope attributes
                let mut attributes: BTreeMap<String, String> = scope_metrics
                    .scope
                    .as_ref()
                    .map(|s| extract_attributes(&s.attributes))
                    .unwrap_or_default();
                attributes.extend(resource.iter().map(|(k, v)| (k.clone(), v.clone())));
                let attribute_map: Vec<String> = attributes
                    .iter()
                    .map(|(k, v)| encode_attribute(k, v))
                    .collect();

                rows.extend(
                    scope_metrics
                        .metrics
                        .iter()
                        .map(|metric| metric_to_row(metric, attribute_map.clone())),
                );
            }
        }
    }
    rows
}

fn metric_to_row(metric: &Metric, attribute_map: Vec<String>) -> MetricRow {
    let times = data_point_times(metric);
    let data = match serde_json::to_value(metric) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, metric = %metric.name, "Failed to encode metric data");
            serde_json::Value::Null
        }
    };
    MetricRow {
        name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        start_time: times.iter().copied().min().unwrap_or(0),
        end_time: times.iter().copied().max().unwrap_or(0),
        attribute_map,
        data,
    }
}

fn data_point_times(metric: &Metric) -> Vec<u64> {
    match &metric.data {
        Some(Data::Gauge(g)) => g.data_points.iter().map(|dp| dp.time_unix_nano).collect(),
        Some(Data::Sum(s)) => s.data_points.iter().map(|dp| dp.time_unix_nano).collect(),
        Some(Data::Histogram(h)) => h.data_points.iter().map(|dp| dp.time_unix_nano).collect(),
        Some(Data::ExponentialHistogram(eh)) => {
            eh.data_points.iter().map(|dp| dp.time_unix_nano).collect()
        }
        Some(Data::Summary(s)) => s.data_points.iter().map(|dp| dp.time_unix_nano).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{
        AnyValue, InstrumentationScope, KeyValue, any_value,
    };
    use opentelemetry_proto::tonic::metrics::v1::{
        Gauge, Histogram, HistogramDataPoint, NumberDataPoint, ResourceMetrics, ScopeMetrics,
        number_data_point,
    };
    use opentelemetry_proto::tonic::resource::v1::Resource;

    use crate::data::MemoryRepository;

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue(value.to_string())),
            }),
        }
    }

    fn point(time: u64, value: f64) -> NumberDataPoint {
        NumberDataPoint {
            time_unix_nano: time,
            value: Some(number_data_point::Value::AsDouble(value)),
            ..Default::default()
        }
    }

    fn request(metrics: Vec<Metric>) -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                resource: Some(Resource {
                    attributes: vec![kv("service.name", "cart"), kv("host", "resource")],
                    ..Default::default()
                }),
                scope_metrics: vec![ScopeMetrics {
                    scope: Some(InstrumentationScope {
                        name: "meter".into(),
                        attributes: vec![kv("host", "scope"), kv("lib", "otel")],
                        ..Default::default()
                    }),
                    metrics,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_gauge_time_range_and_attributes() {
        let rows = flatten_metrics(&[request(vec![Metric {
            name: "queue.depth".into(),
            description: "Items waiting".into(),
            unit: "1".into(),
            data: Some(Data::Gauge(Gauge {
                data_points: vec![point(300, 1.0), point(100, 2.0), point(200, 3.0)],
            })),
            ..Default::default()
        }])]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.name, "queue.depth");
        assert_eq!(row.start_time, 100);
        assert_eq!(row.end_time, 300);
        assert_eq!(
            row.attribute_map,
            vec![
                encode_attribute("host", "resource"),
                encode_attribute("lib", "otel"),
                encode_attribute("service.name", "cart"),
            ]
        );
        assert_eq!(row.data["name"], "queue.depth");
    }

    #[test]
    fn test_metric_without_points_has_zero_range() {
        let rows = flatten_metrics(&[request(vec![
            Metric {
                name: "empty".into(),
                ..Default::default()
            },
            Metric {
                name: "latency".into(),
                data: Some(Data::Histogram(Histogram {
                    data_points: vec![HistogramDataPoint {
                        time_unix_nano: 42,
                        ..Default::default()
                    }],
                    ..Default::default()
                })),
                ..Default::default()
            },
        ])]);
        assert_eq!((rows[0].start_time, rows[0].end_time), (0, 0));
        assert_eq!((rows[1].start_time, rows[1].end_time), (42, 42));
    }

    #[tokio::test]
    async fn test_persisted_metrics_are_listed_by_name() {
        let repo = Arc::new(MemoryRepository::new(100));
        let sink = MetricSink::new(repo.clone());
        let rows = flatten_metrics(&[request(vec![Metric {
            name: "requests".into(),
            ..Default::default()
        }])]);
        sink.persist(&rows).await.unwrap();

        assert_eq!(repo.get_metric_names().await.unwrap(), vec!["requests"]);
        assert_eq!(repo.get_metrics("requests").await.unwrap().len(), 1);
    }
}
