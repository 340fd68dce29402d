//! Repository trait for telemetry storage
//!
//! The ingest pipelines write through this trait and the search service
//! reads through it. Backends implement it with their own storage logic.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{
    ComponentMetadataRow, LogQuery, LogRow, MetricRow, SearchData, SnapshotRow, SpanNameRow,
    SpanRow, TraceCandidate, TraceCandidateQuery,
};

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Backend name used in logs and errors
    fn backend_name(&self) -> &'static str;

    // ==================== Ingestion ====================

    async fn insert_spans(&self, spans: &[SpanRow]) -> Result<(), DataError>;

    async fn insert_logs(&self, logs: &[LogRow]) -> Result<(), DataError>;

    async fn insert_metrics(&self, metrics: &[MetricRow]) -> Result<(), DataError>;

    /// Add attribute key/value pairs to the tag search index (set semantics)
    async fn index_span_attributes(&self, attributes: &[(String, String)])
    -> Result<(), DataError>;

    /// Add service/span name pairs to the search index (set semantics)
    async fn index_span_names(&self, names: &[SpanNameRow]) -> Result<(), DataError>;

    // ==================== Search ====================

    /// Distinct service names, span names and tag keys, each sorted
    async fn get_search_data(&self) -> Result<SearchData, DataError>;

    /// Distinct sorted values recorded for a tag key
    async fn get_values_for_tag(&self, tag: &str) -> Result<Vec<String>, DataError>;

    /// Candidate traces ordered by earliest matching span start, descending
    async fn find_trace_candidates(
        &self,
        query: &TraceCandidateQuery,
    ) -> Result<Vec<TraceCandidate>, DataError>;

    async fn get_spans_for_traces(&self, trace_ids: &[String]) -> Result<Vec<SpanRow>, DataError>;

    async fn get_logs_for_traces(&self, query: &LogQuery) -> Result<Vec<LogRow>, DataError>;

    /// Distinct sorted service names of spans inside the time window
    async fn get_service_names(&self, start_time: u64, end_time: u64)
    -> Result<Vec<String>, DataError>;

    // ==================== Component Metadata ====================

    async fn list_component_metadata(&self) -> Result<Vec<ComponentMetadataRow>, DataError>;

    async fn get_component_metadata(
        &self,
        name_path: &str,
    ) -> Result<Option<ComponentMetadataRow>, DataError>;

    async fn upsert_component_metadata(&self, row: &ComponentMetadataRow)
    -> Result<(), DataError>;

    // ==================== Metrics ====================

    async fn get_metric_names(&self) -> Result<Vec<String>, DataError>;

    async fn get_metrics(&self, name: &str) -> Result<Vec<MetricRow>, DataError>;

    // ==================== Snapshots ====================

    async fn save_snapshot(&self, snapshot: &SnapshotRow) -> Result<(), DataError>;

    async fn get_snapshot(&self, id: &str) -> Result<Option<SnapshotRow>, DataError>;

    async fn list_snapshots(&self) -> Result<Vec<SnapshotRow>, DataError>;
}
