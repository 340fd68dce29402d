//! Log ingestion: OTLP log records to stored log rows

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::logs::v1::LogRecord;

use super::pipeline::IngestSink;
use crate::data::types::{LogAttribute, LogAttributeSource, LogRow};
use crate::data::{DataError, TelemetryRepository};
use crate::utils::otlp::{any_value_to_string, extract_attribute_pairs, id_to_hex};
use crate::utils::time::now_nanos;

pub struct LogSink {
    repository: Arc<dyn TelemetryRepository>,
}

impl LogSink {
    pub fn new(repository: Arc<dyn TelemetryRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl IngestSink for LogSink {
    type Request = ExportLogsServiceRequest;
    type Row = LogRow;

    fn name(&self) -> &'static str {
        "logs"
    }

    fn backend_name(&self) -> &'static str {
        self.repository.backend_name()
    }

    fn flatten(&self, requests: &[ExportLogsServiceRequest]) -> Vec<LogRow> {
        flatten_logs(requests)
    }

    async fn persist(&self, chunk: &[LogRow]) -> Result<(), DataError> {
        self.repository.insert_logs(chunk).await
    }
}

pub fn flatten_logs(requests: &[ExportLogsServiceRequest]) -> Vec<LogRow> {
    let mut rows = Vec::new();
    for request in requests {
        for resource_logs in &request.resource_logs {
            let resource_attributes = resource_logs
                .resource
                .as_ref()
                .map(|r| extract_attribute_pairs(&r.attributes))
                .unwrap_or_default();
            for scope_logs in &resource_logs.scope_logs {
                rows.extend(
                    scope_logs
                        .log_records
                        .iter()
                        .map(|record| log_to_row(record, &resource_attributes)),
                );
            }
        }
    }
    rows
}

fn log_to_row(record: &LogRecord, resource_attributes: &[(String, String)]) -> LogRow {
    let record_attributes = extract_attribute_pairs(&record.attributes);
    let raw_body = record
        .body
        .as_ref()
        .map(any_value_to_string)
        .unwrap_or_default();
    let body = if raw_body.is_empty() {
        record_attributes
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        raw_body.clone()
    };

    let attributes = record_attributes
        .into_iter()
        .map(|(key, value)| LogAttribute {
            key,
            value,
            source: LogAttributeSource::Record,
        })
        .chain(resource_attributes.iter().map(|(k, v)| LogAttribute {
            key: k.clone(),
            value: v.clone(),
            source: LogAttributeSource::Resource,
        }))
        .collect();

    LogRow {
        trace_id: id_to_hex(&record.trace_id),
        span_id: id_to_hex(&record.span_id),
        timestamp: record_time(record),
        observed_timestamp: record.observed_time_unix_nano,
        severity_text: record.severity_text.clone(),
        severity_number: record.severity_number,
        body,
        raw_body,
        attributes,
    }
}

/// Event time, falling back to the observed time and then to now
fn record_time(record: &LogRecord) -> u64 {
    [record.time_unix_nano, record.observed_time_unix_nano]
        .into_iter()
        .find(|&t| t > 0)
        .unwrap_or_else(now_nanos)
}
