//! Stored rows to model spans

use rustc_hash::FxHashMap;

use super::span::{LOG_SORT_DEFAULT, LogEntry, Span};
use super::trace::{ModelOptions, TraceLensModel};
use crate::data::types::{LogRow, SpanRow};
use crate::utils::json::expand_virtual_attributes;

const EVENT_LABEL: &str = "Event";

/// Convert a stored span, attaching its events and the logs emitted inside it.
///
/// JSON-valued event and log attributes gain virtual `key.path` entries;
/// span tags are kept as stored.
pub fn span_from_row(row: &SpanRow, logs: &[&LogRow]) -> Span {
    let mut entries: Vec<LogEntry> = row
        .events
        .iter()
        .map(|event| {
            let mut attrs = event.attributes.clone();
            expand_virtual_attributes(&mut attrs);
            LogEntry::new(event.time, EVENT_LABEL, &event.name, attrs, LOG_SORT_DEFAULT)
        })
        .collect();

    entries.extend(logs.iter().map(|log| {
        let mut attrs = log.record_attributes();
        expand_virtual_attributes(&mut attrs);
        LogEntry::new(
            log.timestamp,
            &log.severity_text,
            &log.raw_body,
            attrs,
            LOG_SORT_DEFAULT,
        )
    }));
    entries.sort_by_key(|e| e.time);

    Span {
        trace_id: row.trace_id.clone(),
        span_id: row.span_id.clone(),
        parent_span_id: row.parent_span_id.clone(),
        service_name: row.service_name.clone(),
        operation_name: row.operation_name.clone(),
        start_time: row.start_time,
        end_time: row.end_time,
        attributes: row.attributes.clone(),
        logs: entries,
        kind: row.kind,
    }
}

/// Build a model from stored spans and the logs of the same traces
pub fn build_model(spans: &[SpanRow], logs: &[LogRow], options: ModelOptions) -> TraceLensModel {
    let mut by_span: FxHashMap<&str, Vec<&LogRow>> = FxHashMap::default();
    for log in logs.iter().filter(|l| !l.span_id.is_empty()) {
        by_span.entry(log.span_id.as_str()).or_default().push(log);
    }

    let spans = spans
        .iter()
        .map(|row| {
            let attached = by_span
                .get(row.span_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            span_from_row(row, attached)
        })
        .collect();
    TraceLensModel::build(spans, options)
}
