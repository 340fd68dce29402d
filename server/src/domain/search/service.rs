//! Search and query service
//!
//! Answers trace searches, search suggestions, service map and metadata
//! queries, and builds trace models from stored spans.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::evaluate::{AttributeClauseMatch, ClauseMap, TraceContext, evaluate};
use super::filter::{FilterParseError, TraceFilterExpression, parse_limited};
use super::hoist::{collect_filter_hints, log_pushdown};
use crate::data::error::DataError;
use crate::data::traits::TelemetryRepository;
use crate::data::types::{
    ComponentMetadataRow, LogQuery, LogRow, MetricRow, SearchData, SnapshotRow, SpanRow,
    TraceCandidateQuery,
};
use crate::domain::model::{ComponentGraph, GraphLevel, ModelOptions, TraceModelView, build_model};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Candidate traces fetched per requested result
const CANDIDATE_FACTOR: usize = 3;
const STATUS_ERROR_ENTRY: &str = "status.code:STATUS_CODE_ERROR";

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub body_contains: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchTracesRequest {
    #[serde(default)]
    pub filter: Option<TraceFilterExpression>,
    #[serde(default)]
    pub log_filter: Option<LogFilter>,
    /// Unix nanos, 0 = unbounded
    #[serde(default)]
    pub start_time: u64,
    #[serde(default)]
    pub end_time: u64,
    /// 0 = service default
    #[serde(default)]
    pub limit: usize,
}

impl SearchTracesRequest {
    /// Parse a JSON request body with filter size and shape limits
    pub fn parse(body: &str) -> Result<Self, FilterParseError> {
        parse_limited(body, |r: &Self| r.filter.as_ref())
    }

    fn body_needle(&self) -> Option<String> {
        self.log_filter
            .as_ref()
            .and_then(|f| f.body_contains.as_deref())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanOverview {
    pub trace_id: String,
    pub service_name: String,
    pub operation_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceOverview {
    pub trace_id: String,
    /// Operation of the earliest span
    pub name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub has_error: bool,
    pub spans: Vec<SpanOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchTraceResult {
    pub trace: TraceOverview,
    pub spans: Vec<SpanRow>,
    pub logs: Vec<LogRow>,
    pub attribute_clauses: Vec<AttributeClauseMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogCount {
    pub raw_body: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanCount {
    pub span_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchTracesResponse {
    pub results: Vec<SearchTraceResult>,
    pub log_counts: Vec<LogCount>,
    pub span_counts: Vec<SpanCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMapComponent {
    pub id: String,
    pub group_name: String,
    pub component_name: String,
    pub component_kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentMetadataInfo {
    pub group_name: String,
    pub component_name: String,
    pub component_kind: String,
    pub annotation: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TraceModelOptions {
    #[serde(default)]
    pub flatten: bool,
    #[serde(default)]
    pub diagnostics: bool,
    #[serde(default)]
    pub level: GraphLevel,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct SearchService {
    repository: Arc<dyn TelemetryRepository>,
    default_limit: usize,
}

impl SearchService {
    pub fn new(repository: Arc<dyn TelemetryRepository>, default_limit: usize) -> Self {
        Self {
            repository,
            default_limit: if default_limit == 0 {
                DEFAULT_SEARCH_LIMIT
            } else {
                default_limit
            },
        }
    }

    /// Find traces matching the request filter, newest first
    pub async fn search_traces(
        &self,
        request: &SearchTracesRequest,
    ) -> Result<SearchTracesResponse, DataError> {
        let limit = if request.limit > 0 {
            request.limit
        } else {
            self.default_limit
        };
        let filter = request.filter.as_ref();
        let hints = collect_filter_hints(filter);

        let candidates = self
            .repository
            .find_trace_candidates(&TraceCandidateQuery {
                service_names: hints.service_names.into_iter().collect(),
                span_names: hints.span_names.into_iter().collect(),
                start_time: request.start_time,
                end_time: request.end_time,
                limit: limit.saturating_mul(CANDIDATE_FACTOR),
            })
            .await?;
        if candidates.is_empty() {
            return Ok(SearchTracesResponse::default());
        }

        let trace_ids: Vec<String> = candidates.iter().map(|c| c.trace_id.clone()).collect();
        let spans = self.repository.get_spans_for_traces(&trace_ids).await?;
        let logs = self
            .repository
            .get_logs_for_traces(&LogQuery {
                trace_ids: trace_ids.clone(),
                predicates: log_pushdown(filter),
                body_contains: request.body_needle(),
            })
            .await?;

        let mut spans_by_trace: FxHashMap<String, Vec<SpanRow>> = FxHashMap::default();
        for span in spans {
            spans_by_trace
                .entry(span.trace_id.clone())
                .or_default()
                .push(span);
        }
        let mut logs_by_trace: FxHashMap<&str, Vec<&LogRow>> = FxHashMap::default();
        for log in &logs {
            logs_by_trace.entry(log.trace_id.as_str()).or_default().push(log);
        }

        let mut response = SearchTracesResponse::default();
        let mut span_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut log_counts: BTreeMap<String, usize> = BTreeMap::new();

        for trace_id in &trace_ids {
            let Some(trace_spans) = spans_by_trace.get_mut(trace_id) else {
                continue;
            };
            if trace_spans.is_empty() {
                continue;
            }
            trace_spans.sort_by_key(|s| s.start_time);
            let trace_logs = logs_by_trace
                .get(trace_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut clauses = ClauseMap::new();
            let context = TraceContext {
                spans: trace_spans,
                logs: trace_logs,
            };
            if !evaluate(filter, context, &mut clauses) {
                continue;
            }

            for span in trace_spans.iter() {
                *span_counts.entry(span.operation_name.clone()).or_default() += 1;
            }
            for log in trace_logs {
                *log_counts.entry(log.raw_body.clone()).or_default() += 1;
            }

            response.results.push(SearchTraceResult {
                trace: overview(trace_id, trace_spans),
                spans: trace_spans.clone(),
                logs: trace_logs.iter().map(|l| (*l).clone()).collect(),
                attribute_clauses: clauses.into_values().collect(),
            });
            if response.results.len() == limit {
                break;
            }
        }

        response.log_counts = log_counts
            .into_iter()
            .map(|(raw_body, count)| LogCount { raw_body, count })
            .collect();
        response.span_counts = span_counts
            .into_iter()
            .map(|(span_name, count)| SpanCount { span_name, count })
            .collect();

        tracing::debug!(
            candidates = trace_ids.len(),
            results = response.results.len(),
            "Trace search complete"
        );
        Ok(response)
    }

    pub async fn search_data(&self) -> Result<SearchData, DataError> {
        self.repository.get_search_data().await
    }

    pub async fn values_for_tag(&self, tag: &str) -> Result<Vec<String>, DataError> {
        self.repository.get_values_for_tag(tag).await
    }

    /// One service component per non-blank service name in the window
    pub async fn service_map_components(
        &self,
        start_time: u64,
        end_time: u64,
    ) -> Result<Vec<ServiceMapComponent>, DataError> {
        let services = self
            .repository
            .get_service_names(start_time, end_time)
            .await?;
        Ok(services
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| ServiceMapComponent {
                id: format!("{}:{}", s, s),
                group_name: s.clone(),
                component_name: s,
                component_kind: "Service".to_string(),
            })
            .collect())
    }

    // ==================== Component Metadata ====================

    pub async fn component_metadata(&self) -> Result<Vec<ComponentMetadataRow>, DataError> {
        self.repository.list_component_metadata().await
    }

    pub async fn set_component_metadata(
        &self,
        name_path: &str,
        annotation: &str,
    ) -> Result<(), DataError> {
        self.repository
            .upsert_component_metadata(&ComponentMetadataRow {
                name_path: name_path.to_string(),
                annotation: annotation.to_string(),
            })
            .await
    }

    /// Resolve a `group:component` id and its annotation (empty when unset)
    pub async fn metadata_for_component(
        &self,
        component_id: &str,
    ) -> Result<ComponentMetadataInfo, DataError> {
        let (group_name, component_name) = parse_component_id(component_id);
        let annotation = match metadata_key(&group_name, &component_name) {
            Some(key) => self
                .repository
                .get_component_metadata(&key)
                .await?
                .map(|m| m.annotation)
                .unwrap_or_default(),
            None => String::new(),
        };
        let component_kind = if group_name.trim().is_empty() {
            String::new()
        } else {
            "Service".to_string()
        };
        Ok(ComponentMetadataInfo {
            group_name,
            component_name,
            component_kind,
            annotation,
        })
    }

    // ==================== Trace Model ====================

    /// Build the model and graph for one stored trace
    pub async fn trace_model(
        &self,
        trace_id: &str,
        options: TraceModelOptions,
    ) -> Result<TraceModelView, DataError> {
        let trace_ids = vec![trace_id.to_string()];
        let spans = self.repository.get_spans_for_traces(&trace_ids).await?;
        if spans.is_empty() {
            return Err(DataError::NotFound(format!("trace {}", trace_id)));
        }
        let logs = self
            .repository
            .get_logs_for_traces(&LogQuery {
                trace_ids,
                ..Default::default()
            })
            .await?;
        let metadata = self.repository.list_component_metadata().await?;

        let model = build_model(
            &spans,
            &logs,
            ModelOptions {
                flatten: options.flatten,
                diagnostics: options.diagnostics,
            },
        );
        let graph = ComponentGraph::build(&model, options.level, metadata);
        Ok(TraceModelView::new(trace_id, &model, &graph))
    }

    // ==================== Snapshots ====================

    /// Render a trace model and store it as a snapshot
    pub async fn save_snapshot(
        &self,
        trace_id: &str,
        options: TraceModelOptions,
    ) -> Result<SnapshotRow, DataError> {
        let view = self.trace_model(trace_id, options).await?;
        let snapshot = SnapshotRow {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            model: serde_json::to_value(&view)?,
        };
        self.repository.save_snapshot(&snapshot).await?;
        tracing::debug!(id = %snapshot.id, trace_id, "Snapshot saved");
        Ok(snapshot)
    }

    pub async fn snapshot(&self, id: &str) -> Result<SnapshotRow, DataError> {
        self.repository
            .get_snapshot(id)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("snapshot {}", id)))
    }

    pub async fn snapshots(&self) -> Result<Vec<SnapshotRow>, DataError> {
        self.repository.list_snapshots().await
    }

    // ==================== Metrics ====================

    pub async fn metric_names(&self) -> Result<Vec<String>, DataError> {
        self.repository.get_metric_names().await
    }

    pub async fn metrics(&self, name: &str) -> Result<Vec<MetricRow>, DataError> {
        self.repository.get_metrics(name).await
    }
}

fn overview(trace_id: &str, spans: &[SpanRow]) -> TraceOverview {
    TraceOverview {
        trace_id: trace_id.to_string(),
        name: spans
            .first()
            .map(|s| s.operation_name.clone())
            .unwrap_or_default(),
        start_time: spans.iter().map(|s| s.start_time).min().unwrap_or_default(),
        end_time: spans.iter().map(|s| s.end_time).max().unwrap_or_default(),
        has_error: spans.iter().any(span_has_error),
        spans: spans
            .iter()
            .map(|s| SpanOverview {
                trace_id: s.trace_id.clone(),
                service_name: s.service_name.clone(),
                operation_name: s.operation_name.clone(),
            })
            .collect(),
    }
}

/// Error status, or any attribute entry mentioning "error"
fn span_has_error(span: &SpanRow) -> bool {
    span.attribute_map
        .iter()
        .any(|entry| entry == STATUS_ERROR_ENTRY || entry.to_lowercase().contains("error"))
}

/// Split `group:component`; without a colon the id names both
pub fn parse_component_id(component_id: &str) -> (String, String) {
    if component_id.trim().is_empty() {
        return (String::new(), String::new());
    }
    match component_id.split_once(':') {
        Some((group, component)) => (group.trim().to_string(), component.trim().to_string()),
        None => (component_id.to_string(), component_id.to_string()),
    }
}

fn metadata_key(group: &str, component: &str) -> Option<String> {
    if group.trim().is_empty() && component.trim().is_empty() {
        None
    } else {
        Some(format!("{}:{}", group, component))
    }
}
