//! Shared data types for the storage layer
//!
//! Row types written by the ingest pipelines and read back by the trace
//! model and search services, plus the query parameter types the
//! repository trait accepts.

mod enums;
mod query;
mod telemetry;

pub use enums::{LogAttributeSource, SpanKind};
pub use query::{
    LogAttributePredicate, LogQuery, SearchData, TraceCandidate, TraceCandidateQuery,
};
pub use telemetry::{
    ComponentMetadataRow, LogAttribute, LogRow, MetricRow, SnapshotRow, SpanEventRow,
    SpanNameRow, SpanRow,
};
