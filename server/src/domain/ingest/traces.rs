//! Trace ingestion: OTLP spans to stored span rows
//!
//! After a chunk is written, attribute pairs and service/span names not seen
//! recently are added to the search index.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::{Span as OtlpSpan, status};
use rustc_hash::FxHashSet;

use super::pipeline::IngestSink;
use crate::data::types::{SpanEventRow, SpanKind, SpanNameRow, SpanRow};
use crate::data::{DataError, SeenIndex, TelemetryRepository};
use crate::utils::otlp::{
    encode_attribute, extract_attribute_pairs, id_to_hex, is_blocked_index_attribute, keys,
    resource_service_name,
};

const STATUS_CODE_ERROR: &str = "STATUS_CODE_ERROR";

pub struct TraceSink {
    repository: Arc<dyn TelemetryRepository>,
    seen: Arc<SeenIndex>,
}

impl TraceSink {
    pub fn new(repository: Arc<dyn TelemetryRepository>, seen: Arc<SeenIndex>) -> Self {
        Self { repository, seen }
    }

    async fn index_attributes(&self, chunk: &[SpanRow]) -> Result<(), DataError> {
        let fresh = self.seen.unseen_attributes(
            chunk
                .iter()
                .flat_map(|s| s.attributes.iter())
                .filter(|(k, _)| !is_blocked_index_attribute(k))
                .cloned(),
        );
        if fresh.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.repository.index_span_attributes(&fresh).await {
            self.seen.forget_attributes(&fresh);
            return Err(e);
        }
        Ok(())
    }

    async fn index_span_names(&self, chunk: &[SpanRow]) -> Result<(), DataError> {
        let fresh = self.seen.unseen_span_names(chunk.iter().map(|s| SpanNameRow {
            service_name: s.service_name.clone(),
            name: s.operation_name.clone(),
        }));
        if fresh.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.repository.index_span_names(&fresh).await {
            self.seen.forget_span_names(&fresh);
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl IngestSink for TraceSink {
    type Request = ExportTraceServiceRequest;
    type Row = SpanRow;

    fn name(&self) -> &'static str {
        "traces"
    }

    fn backend_name(&self) -> &'static str {
        self.repository.backend_name()
    }

    fn flatten(&self, requests: &[ExportTraceServiceRequest]) -> Vec<SpanRow> {
        flatten_spans(requests)
    }

    async fn persist(&self, chunk: &[SpanRow]) -> Result<(), DataError> {
        self.repository.insert_spans(chunk).await?;
        self.index_attributes(chunk).await?;
        self.index_span_names(chunk).await
    }
}

/// All spans of a batch, each tagged with its resource service name
pub fn flatten_spans(requests: &[ExportTraceServiceRequest]) -> Vec<SpanRow> {
    let mut rows = Vec::new();
    for request in requests {
        for resource_spans in &request.resource_spans {
            let service_name = resource_service_name(resource_spans.resource.as_ref());
            for scope_spans in &resource_spans.scope_spans {
                rows.extend(
                    scope_spans
                        .spans
                        .iter()
                        .map(|span| span_to_row(&service_name, span)),
                );
            }
        }
    }
    rows
}

fn span_to_row(service_name: &str, span: &OtlpSpan) -> SpanRow {
    let mut attributes = first_wins(extract_attribute_pairs(&span.attributes));
    let is_error = span
        .status
        .as_ref()
        .is_some_and(|s| s.code == status::StatusCode::Error as i32);
    if is_error && !attributes.iter().any(|(k, _)| k == keys::STATUS_CODE) {
        attributes.push((keys::STATUS_CODE.to_string(), STATUS_CODE_ERROR.to_string()));
    }

    let attribute_map = attributes
        .iter()
        .map(|(k, v)| encode_attribute(k, v))
        .collect();

    SpanRow {
        trace_id: id_to_hex(&span.trace_id),
        span_id: id_to_hex(&span.span_id),
        parent_span_id: id_to_hex(&span.parent_span_id),
        service_name: service_name.to_string(),
        operation_name: span.name.clone(),
        start_time: span.start_time_unix_nano,
        end_time: span.end_time_unix_nano,
        kind: SpanKind::from_otlp(span.kind),
        attributes,
        attribute_map,
        events: span
            .events
            .iter()
            .map(|e| SpanEventRow {
                name: e.name.clone(),
                time: e.time_unix_nano,
                attributes: first_wins(extract_attribute_pairs(&e.attributes)),
            })
            .collect(),
    }
}

/// Drop repeated keys, keeping the first value in wire order
fn first_wins(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    pairs
        .into_iter()
        .filter(|(key, _)| seen.insert(key.clone()))
        .collect()
}
