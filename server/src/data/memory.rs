//! In-memory telemetry repository
//!
//! Uses:
//! - `RwLock<TraceStore>` - spans and logs bucketed per trace, evicted oldest-first
//! - `DashMap` / `DashSet` - tag index, span names and component metadata
//! - `RwLock<FxHashMap>` - metrics grouped by name

use std::collections::{BTreeSet, VecDeque};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::data::error::DataError;
use crate::data::traits::TelemetryRepository;
use crate::data::types::{
    ComponentMetadataRow, LogAttributePredicate, LogQuery, LogRow, MetricRow, SearchData,
    SnapshotRow, SpanNameRow, SpanRow, TraceCandidate, TraceCandidateQuery,
};

const BACKEND: &str = "memory";

#[derive(Default)]
struct TraceBucket {
    spans: Vec<SpanRow>,
    logs: Vec<LogRow>,
}

#[derive(Default)]
struct TraceStore {
    buckets: FxHashMap<String, TraceBucket>,
    /// Trace ids in first-seen order
    order: VecDeque<String>,
    span_count: usize,
}

impl TraceStore {
    fn bucket_mut(&mut self, trace_id: &str) -> &mut TraceBucket {
        if !self.buckets.contains_key(trace_id) {
            self.order.push_back(trace_id.to_string());
        }
        self.buckets.entry(trace_id.to_string()).or_default()
    }

    /// Drop whole traces, oldest first, until under `max_spans` (0 = unbounded)
    fn evict(&mut self, max_spans: usize) -> usize {
        let mut evicted = 0;
        while max_spans > 0 && self.span_count > max_spans && self.order.len() > 1 {
            let Some(trace_id) = self.order.pop_front() else {
                break;
            };
            if let Some(bucket) = self.buckets.remove(&trace_id) {
                self.span_count -= bucket.spans.len();
                evicted += 1;
            }
        }
        evicted
    }
}

pub struct MemoryRepository {
    traces: RwLock<TraceStore>,
    tags: DashMap<String, FxHashSet<String>>,
    span_names: DashSet<SpanNameRow>,
    metrics: RwLock<FxHashMap<String, Vec<MetricRow>>>,
    metadata: DashMap<String, ComponentMetadataRow>,
    snapshots: RwLock<Vec<SnapshotRow>>,
    max_spans: usize,
}

impl MemoryRepository {
    /// Create a repository holding at most `max_spans` spans (0 = unbounded)
    pub fn new(max_spans: usize) -> Self {
        Self {
            traces: RwLock::new(TraceStore::default()),
            tags: DashMap::new(),
            span_names: DashSet::new(),
            metrics: RwLock::new(FxHashMap::default()),
            metadata: DashMap::new(),
            snapshots: RwLock::new(Vec::new()),
            max_spans,
        }
    }

    pub fn span_count(&self) -> usize {
        self.traces.read().span_count
    }
}

fn in_window(span: &SpanRow, start_time: u64, end_time: u64) -> bool {
    (start_time == 0 || span.start_time >= start_time) && (end_time == 0 || span.end_time <= end_time)
}

fn matches_hints(span: &SpanRow, query: &TraceCandidateQuery) -> bool {
    let by_service = || query.service_names.iter().any(|s| *s == span.service_name);
    let by_name = || query.span_names.iter().any(|n| *n == span.operation_name);
    match (query.service_names.is_empty(), query.span_names.is_empty()) {
        (true, true) => true,
        (false, true) => by_service(),
        (true, false) => by_name(),
        (false, false) => by_service() || by_name(),
    }
}

fn log_matches(log: &LogRow, predicates: &[LogAttributePredicate], needle: Option<&str>) -> bool {
    if let Some(needle) = needle
        && !log.raw_body.to_lowercase().contains(needle)
    {
        return false;
    }
    predicates.is_empty()
        || predicates.iter().any(|p| {
            log.attributes
                .iter()
                .any(|a| a.key == p.key && p.value.as_ref().is_none_or(|v| *v == a.value))
        })
}

#[async_trait]
impl TelemetryRepository for MemoryRepository {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn insert_spans(&self, spans: &[SpanRow]) -> Result<(), DataError> {
        let mut store = self.traces.write();
        for span in spans {
            store.bucket_mut(&span.trace_id).spans.push(span.clone());
        }
        store.span_count += spans.len();
        let evicted = store.evict(self.max_spans);
        if evicted > 0 {
            tracing::debug!(evicted, retained = store.span_count, "Evicted oldest traces");
        }
        Ok(())
    }

    async fn insert_logs(&self, logs: &[LogRow]) -> Result<(), DataError> {
        let mut store = self.traces.write();
        for log in logs {
            store.bucket_mut(&log.trace_id).logs.push(log.clone());
        }
        Ok(())
    }

    async fn insert_metrics(&self, metrics: &[MetricRow]) -> Result<(), DataError> {
        let mut by_name = self.metrics.write();
        for metric in metrics {
            by_name
                .entry(metric.name.clone())
                .or_default()
                .push(metric.clone());
        }
        Ok(())
    }

    async fn index_span_attributes(
        &self,
        attributes: &[(String, String)],
    ) -> Result<(), DataError> {
        for (key, value) in attributes {
            self.tags
                .entry(key.clone())
                .or_default()
                .insert(value.clone());
        }
        Ok(())
    }

    async fn index_span_names(&self, names: &[SpanNameRow]) -> Result<(), DataError> {
        for name in names {
            self.span_names.insert(name.clone());
        }
        Ok(())
    }

    async fn get_search_data(&self) -> Result<SearchData, DataError> {
        let service_names: BTreeSet<String> = {
            let store = self.traces.read();
            store
                .buckets
                .values()
                .flat_map(|b| b.spans.iter().map(|s| s.service_name.clone()))
                .collect()
        };
        let span_names: BTreeSet<String> =
            self.span_names.iter().map(|n| n.name.clone()).collect();
        let tag_names: BTreeSet<String> = self.tags.iter().map(|e| e.key().clone()).collect();

        Ok(SearchData {
            service_names: service_names.into_iter().collect(),
            span_names: span_names.into_iter().collect(),
            tag_names: tag_names.into_iter().collect(),
        })
    }

    async fn get_values_for_tag(&self, tag: &str) -> Result<Vec<String>, DataError> {
        let values: BTreeSet<String> = self
            .tags
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        Ok(values.into_iter().collect())
    }

    async fn find_trace_candidates(
        &self,
        query: &TraceCandidateQuery,
    ) -> Result<Vec<TraceCandidate>, DataError> {
        let store = self.traces.read();
        let mut candidates: Vec<TraceCandidate> = store
            .buckets
            .iter()
            .filter_map(|(trace_id, bucket)| {
                bucket
                    .spans
                    .iter()
                    .filter(|s| matches_hints(s, query))
                    .filter(|s| in_window(s, query.start_time, query.end_time))
                    .map(|s| s.start_time)
                    .min()
                    .map(|start_time| TraceCandidate {
                        trace_id: trace_id.clone(),
                        start_time,
                    })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| a.trace_id.cmp(&b.trace_id))
        });
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn get_spans_for_traces(&self, trace_ids: &[String]) -> Result<Vec<SpanRow>, DataError> {
        let store = self.traces.read();
        Ok(trace_ids
            .iter()
            .filter_map(|id| store.buckets.get(id))
            .flat_map(|b| b.spans.iter().cloned())
            .collect())
    }

    async fn get_logs_for_traces(&self, query: &LogQuery) -> Result<Vec<LogRow>, DataError> {
        let needle = query
            .body_contains
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_lowercase);
        let store = self.traces.read();
        Ok(query
            .trace_ids
            .iter()
            .filter_map(|id| store.buckets.get(id))
            .flat_map(|b| b.logs.iter())
            .filter(|log| log_matches(log, &query.predicates, needle.as_deref()))
            .cloned()
            .collect())
    }

    async fn get_service_names(
        &self,
        start_time: u64,
        end_time: u64,
    ) -> Result<Vec<String>, DataError> {
        let store = self.traces.read();
        let names: BTreeSet<String> = store
            .buckets
            .values()
            .flat_map(|b| b.spans.iter())
            .filter(|s| in_window(s, start_time, end_time))
            .map(|s| s.service_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn list_component_metadata(&self) -> Result<Vec<ComponentMetadataRow>, DataError> {
        let mut rows: Vec<ComponentMetadataRow> =
            self.metadata.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| a.name_path.cmp(&b.name_path));
        Ok(rows)
    }

    async fn get_component_metadata(
        &self,
        name_path: &str,
    ) -> Result<Option<ComponentMetadataRow>, DataError> {
        Ok(self.metadata.get(name_path).map(|e| e.value().clone()))
    }

    async fn upsert_component_metadata(
        &self,
        row: &ComponentMetadataRow,
    ) -> Result<(), DataError> {
        self.metadata.insert(row.name_path.clone(), row.clone());
        Ok(())
    }

    async fn get_metric_names(&self) -> Result<Vec<String>, DataError> {
        let mut names: Vec<String> = self.metrics.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_metrics(&self, name: &str) -> Result<Vec<MetricRow>, DataError> {
        Ok(self.metrics.read().get(name).cloned().unwrap_or_default())
    }

    async fn save_snapshot(&self, snapshot: &SnapshotRow) -> Result<(), DataError> {
        self.snapshots.write().push(snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<SnapshotRow>, DataError> {
        Ok(self.snapshots.read().iter().find(|s| s.id == id).cloned())
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotRow>, DataError> {
        Ok(self.snapshots.read().clone())
    }
}
