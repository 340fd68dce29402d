//! Serializable projection of a model and its graph
//!
//! Served by the trace model endpoint and stored as snapshot payloads.

use serde::Serialize;

use super::description::{CallKind, Component, ComponentKind, Group};
use super::graph::{Call, ComponentGraph, GraphLevel};
use super::span::LogLevel;
use super::trace::TraceLensModel;
use crate::data::types::SpanKind;
use crate::utils::time::nanos_to_iso;

#[derive(Debug, Clone, Serialize)]
pub struct LogView {
    pub time: u64,
    /// RFC 3339 rendering of `time`
    pub timestamp: String,
    pub label: String,
    pub level: LogLevel,
    pub body: String,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanView {
    pub trace_id: String,
    pub span_id: String,
    /// Logical parent; the synthetic root shows as `root`
    pub parent_span_id: String,
    pub service_name: String,
    pub operation_name: String,
    pub kind: SpanKind,
    pub start_time: u64,
    pub end_time: u64,
    pub duration: u64,
    pub depth: i64,
    pub start_percent: f64,
    pub width_percent: f64,
    pub description_id: String,
    pub component: String,
    pub component_kind: ComponentKind,
    pub group: String,
    pub operation: String,
    pub response: String,
    pub call_kind: CallKind,
    pub is_client: bool,
    pub elided: bool,
    pub has_error: bool,
    pub attributes: Vec<(String, String)>,
    pub logs: Vec<LogView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentView {
    #[serde(flatten)]
    pub component: Component,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub level: GraphLevel,
    pub components: Vec<ComponentView>,
    pub groups: Vec<Group>,
    pub calls: Vec<Call>,
}

impl GraphView {
    pub fn from_graph(graph: &ComponentGraph) -> Self {
        Self {
            level: graph.level(),
            components: graph
                .components()
                .iter()
                .map(|c| ComponentView {
                    component: c.clone(),
                    annotation: graph.metadata_for_id(&c.id).map(|m| m.annotation.clone()),
                })
                .collect(),
            groups: graph.groups().to_vec(),
            calls: graph.calls().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceModelView {
    pub trace_id: String,
    pub flatten: bool,
    pub start_time: u64,
    pub end_time: u64,
    pub widest_child_duration: u64,
    pub spans: Vec<SpanView>,
    pub graph: GraphView,
}

impl TraceModelView {
    pub fn new(trace_id: &str, model: &TraceLensModel, graph: &ComponentGraph) -> Self {
        let spans = (1..model.len())
            .map(|i| {
                let span = model.span(i);
                let description = model.description(i);
                let parent = model
                    .logical_parent(i, model.flatten())
                    .map(|p| model.span(p).span_id.clone())
                    .unwrap_or_default();
                SpanView {
                    trace_id: span.trace_id.clone(),
                    span_id: span.span_id.clone(),
                    parent_span_id: parent,
                    service_name: span.service_name.clone(),
                    operation_name: span.operation_name.clone(),
                    kind: span.kind,
                    start_time: span.start_time,
                    end_time: span.end_time,
                    duration: span.duration(),
                    depth: model.depth(i),
                    start_percent: model.start_percent(i),
                    width_percent: model.width_percent(i),
                    description_id: description.id.clone(),
                    component: description.component.name.clone(),
                    component_kind: description.component.kind,
                    group: description.group.name.clone(),
                    operation: description.operation.clone(),
                    response: description.response.clone(),
                    call_kind: description.call_kind,
                    is_client: description.is_client,
                    elided: model.is_elided(i),
                    has_error: span.has_error(),
                    attributes: span.attributes.clone(),
                    logs: span
                        .logs
                        .iter()
                        .map(|l| LogView {
                            time: l.time,
                            timestamp: nanos_to_iso(l.time),
                            label: l.label.clone(),
                            level: l.level,
                            body: l.format(),
                            attributes: l.attributes.clone(),
                        })
                        .collect(),
                }
            })
            .collect();

        Self {
            trace_id: trace_id.to_string(),
            flatten: model.flatten(),
            start_time: model.start_time(),
            end_time: model.end_time(),
            widest_child_duration: model.widest_child_duration(),
            spans,
            graph: GraphView::from_graph(graph),
        }
    }
}
