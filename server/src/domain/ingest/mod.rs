//! Telemetry ingestion pipelines
//!
//! One pipeline per telemetry kind, each consuming its own topic:
//! - `traces` - spans plus search index entries
//! - `logs` - log records with record and resource attributes
//! - `metrics` - one row per metric with its time range

mod logs;
mod metrics;
mod pipeline;
mod traces;

pub use logs::{LogSink, flatten_logs};
pub use metrics::{MetricSink, flatten_metrics};
pub use pipeline::{IngestPipeline, IngestSettings, IngestSink};
pub use traces::{TraceSink, flatten_spans};

use opentelemetry_proto::tonic::collector::{
    logs::v1::ExportLogsServiceRequest, metrics::v1::ExportMetricsServiceRequest,
    trace::v1::ExportTraceServiceRequest,
};

use crate::data::topics::TopicMessage;

impl TopicMessage for ExportTraceServiceRequest {
    fn record_count(&self) -> usize {
        self.resource_spans
            .iter()
            .flat_map(|rs| &rs.scope_spans)
            .map(|ss| ss.spans.len())
            .sum()
    }
}

impl TopicMessage for ExportMetricsServiceRequest {
    fn record_count(&self) -> usize {
        self.resource_metrics
            .iter()
            .flat_map(|rm| &rm.scope_metrics)
            .map(|sm| sm.metrics.len())
            .sum()
    }
}

impl TopicMessage for ExportLogsServiceRequest {
    fn record_count(&self) -> usize {
        self.resource_logs
            .iter()
            .flat_map(|rl| &rl.scope_logs)
            .map(|sl| sl.log_records.len())
            .sum()
    }
}
