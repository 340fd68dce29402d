//! Stored telemetry rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{LogAttributeSource, SpanKind};

/// A persisted span.
///
/// `attributes` keeps the first value of every key in wire order;
/// `attribute_map` is the escaped `key:value` projection used for
/// attribute matching (see `utils::otlp::encode_attribute`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanRow {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub service_name: String,
    pub operation_name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub kind: SpanKind,
    pub attributes: Vec<(String, String)>,
    pub attribute_map: Vec<String>,
    pub events: Vec<SpanEventRow>,
}

impl SpanRow {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanEventRow {
    pub name: String,
    pub time: u64,
    pub attributes: Vec<(String, String)>,
}

/// Service/operation pair recorded for search suggestions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanNameRow {
    pub service_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAttribute {
    pub key: String,
    pub value: String,
    pub source: LogAttributeSource,
}

/// A persisted log record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub trace_id: String,
    pub span_id: String,
    pub timestamp: u64,
    pub observed_timestamp: u64,
    pub severity_text: String,
    pub severity_number: i32,
    /// Display body: the raw body, or the joined record attributes when empty
    pub body: String,
    pub raw_body: String,
    pub attributes: Vec<LogAttribute>,
}

impl LogRow {
    /// Record-level attributes as key/value pairs
    pub fn record_attributes(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .filter(|a| a.source == LogAttributeSource::Record)
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect()
    }
}

/// A persisted metric.
///
/// `data` holds the full OTLP metric as JSON so points can be served back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub start_time: u64,
    pub end_time: u64,
    pub attribute_map: Vec<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadataRow {
    pub name_path: String,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub model: serde_json::Value,
}
