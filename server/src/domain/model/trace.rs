//! Trace model: a span forest under one synthetic root
//!
//! Spans live in an arena (index 0 is the synthetic root). Parent and child
//! links, depth, classification and widest duration are side tables filled
//! once during construction; the model is immutable afterwards.

use rustc_hash::{FxHashMap, FxHashSet};

use super::description::SpanDescription;
use super::extract::{self, SpanRef};
use super::span::{LogEntry, Span};
use crate::data::types::SpanKind;

pub const ROOT_TRACE_ID: &str = "root";
pub const ROOT_INDEX: usize = 0;

const ROOT_SERVICE: &str = "Start";
const ROOT_OPERATION: &str = "d";

const TIER_SELF: u8 = 0;
const TIER_CHILD_START: u8 = 0;
const TIER_SPAN_START: u8 = 1;
const TIER_SPAN_END: u8 = 3;
const TIER_CHILD_END: u8 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelOptions {
    /// Elide client spans from graphs and logical parents
    pub flatten: bool,
    /// Add synthetic start/end and child entries to span logs
    pub diagnostics: bool,
}

#[derive(Debug)]
pub struct TraceLensModel {
    spans: Vec<Span>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depth: Vec<i64>,
    descriptions: Vec<SpanDescription>,
    widest: Vec<u64>,
    start_span: Option<usize>,
    end_span: Option<usize>,
    flatten: bool,
}

impl TraceLensModel {
    /// Build a model from spans in any order.
    ///
    /// Duplicate span ids keep the first occurrence. Spans whose parent is
    /// missing (or themselves) become roots. Spans caught in a parent cycle
    /// are re-attached as roots so every span hangs off the synthetic root.
    pub fn build(spans: Vec<Span>, options: ModelOptions) -> Self {
        let mut seen = FxHashSet::default();
        let mut entries: Vec<Span> = spans
            .into_iter()
            .filter(|s| seen.insert(s.span_id.clone()))
            .collect();
        entries.sort_by_key(|s| s.start_time);

        let mut arena = Vec::with_capacity(entries.len() + 1);
        arena.push(root_span());
        arena.extend(entries);

        let by_id: FxHashMap<&str, usize> = arena
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, s)| (s.span_id.as_str(), i))
            .collect();

        let mut parents: Vec<Option<usize>> = vec![None; arena.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
        for (i, span) in arena.iter().enumerate().skip(1) {
            let parent = by_id
                .get(span.parent_span_id.as_str())
                .copied()
                .filter(|&p| p != i)
                .unwrap_or(ROOT_INDEX);
            parents[i] = Some(parent);
            children[parent].push(i);
        }
        drop(by_id);

        let depth = assign_depth(&mut parents, &mut children);

        if options.diagnostics {
            add_diagnostics(&mut arena, &children);
        }
        for span in arena.iter_mut() {
            span.logs
                .sort_by(|a, b| (a.time, a.sort_order).cmp(&(b.time, b.sort_order)));
        }

        let descriptions = (0..arena.len())
            .map(|i| extract::describe(SpanRef::new(&arena, &parents, i)))
            .collect();

        let widest = widest_durations(&arena, &children);

        let mut start_span: Option<usize> = None;
        let mut end_span: Option<usize> = None;
        for (i, span) in arena.iter().enumerate().skip(1) {
            if start_span.is_none_or(|s| span.start_time < arena[s].start_time) {
                start_span = Some(i);
            }
            if end_span.is_none_or(|e| span.end_time > arena[e].end_time) {
                end_span = Some(i);
            }
        }

        Self {
            spans: arena,
            parents,
            children,
            depth,
            descriptions,
            widest,
            start_span,
            end_span,
            flatten: options.flatten,
        }
    }

    /// Number of spans including the synthetic root
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.len() == 1
    }

    pub fn flatten(&self) -> bool {
        self.flatten
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span(&self, index: usize) -> &Span {
        &self.spans[index]
    }

    pub fn root(&self) -> &Span {
        &self.spans[ROOT_INDEX]
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    /// Depth below the synthetic root; real roots are 0 and the root is -1
    pub fn depth(&self, index: usize) -> i64 {
        self.depth[index]
    }

    pub fn description(&self, index: usize) -> &SpanDescription {
        &self.descriptions[index]
    }

    /// Client spans are elided when flattening
    pub fn is_elided(&self, index: usize) -> bool {
        self.flatten && self.descriptions[index].is_client
    }

    /// Nearest parent, skipping client parents when `flatten` is set
    pub fn logical_parent(&self, index: usize, flatten: bool) -> Option<usize> {
        let mut parent = self.parents[index];
        while let Some(p) = parent
            && flatten
            && self.descriptions[p].is_client
        {
            parent = self.parents[p];
        }
        parent
    }

    /// Widest cumulative duration below the synthetic root
    pub fn widest_child_duration(&self) -> u64 {
        self.widest[ROOT_INDEX]
    }

    pub fn widest_duration(&self, index: usize) -> u64 {
        self.widest[index]
    }

    pub fn start_span(&self) -> Option<&Span> {
        self.start_span.map(|i| &self.spans[i])
    }

    pub fn end_span(&self) -> Option<&Span> {
        self.end_span.map(|i| &self.spans[i])
    }

    pub fn start_time(&self) -> u64 {
        self.start_span().map(|s| s.start_time).unwrap_or_default()
    }

    pub fn end_time(&self) -> u64 {
        self.end_span().map(|s| s.end_time).unwrap_or_default()
    }

    /// Offset of the span start within the model, in percent
    pub fn start_percent(&self, index: usize) -> f64 {
        let Some(total) = self.total_duration() else {
            return 0.0;
        };
        let offset = self.spans[index].start_time as f64 - self.start_time() as f64;
        offset / total * 100.0
    }

    /// Span width relative to the model, in percent
    pub fn width_percent(&self, index: usize) -> f64 {
        let Some(total) = self.total_duration() else {
            return 0.0;
        };
        let span = &self.spans[index];
        (span.end_time as f64 - span.start_time as f64) / total * 100.0
    }

    fn total_duration(&self) -> Option<f64> {
        let total = self.end_time() as f64 - self.start_time() as f64;
        (total > 0.0).then_some(total)
    }
}

fn root_span() -> Span {
    Span {
        trace_id: ROOT_TRACE_ID.to_string(),
        span_id: ROOT_TRACE_ID.to_string(),
        parent_span_id: ROOT_TRACE_ID.to_string(),
        service_name: ROOT_SERVICE.to_string(),
        operation_name: ROOT_OPERATION.to_string(),
        start_time: 0,
        end_time: 0,
        attributes: Vec::new(),
        logs: Vec::new(),
        kind: SpanKind::Internal,
    }
}

/// Walk from the root assigning depth; spans left unreached sit on a
/// parent cycle and are promoted to roots in start order.
fn assign_depth(parents: &mut [Option<usize>], children: &mut [Vec<usize>]) -> Vec<i64> {
    let mut depth: Vec<Option<i64>> = vec![None; parents.len()];
    depth[ROOT_INDEX] = Some(-1);
    let mut stack = vec![ROOT_INDEX];

    let mut next_unreached = 1;
    loop {
        while let Some(node) = stack.pop() {
            let d = depth[node].unwrap_or_default();
            for &child in &children[node] {
                if depth[child].is_none() {
                    depth[child] = Some(d + 1);
                    stack.push(child);
                }
            }
        }

        while next_unreached < parents.len() && depth[next_unreached].is_some() {
            next_unreached += 1;
        }
        if next_unreached == parents.len() {
            break;
        }

        let orphan = next_unreached;
        if let Some(old) = parents[orphan] {
            children[old].retain(|&c| c != orphan);
        }
        parents[orphan] = Some(ROOT_INDEX);
        children[ROOT_INDEX].push(orphan);
        depth[orphan] = Some(0);
        stack.push(orphan);
    }

    depth.into_iter().map(Option::unwrap_or_default).collect()
}

fn add_diagnostics(arena: &mut [Span], children: &[Vec<usize>]) {
    for i in 1..arena.len() {
        let mut logs = Vec::with_capacity(children[i].len() * 2 + 3);
        let span = &arena[i];
        logs.push(LogEntry::new(
            span.start_time,
            "tag",
            format!("{} {} {}", span.service_name, span.operation_name, span.span_id),
            span.attributes.clone(),
            TIER_SELF,
        ));
        for &c in &children[i] {
            let child = &arena[c];
            let attrs = vec![("SpanId".to_string(), child.span_id.clone())];
            logs.push(LogEntry::new(
                child.start_time,
                "Diagnostics",
                "Child span {SpanId} starts",
                attrs.clone(),
                TIER_CHILD_START,
            ));
            logs.push(LogEntry::new(
                child.end_time,
                "Diagnostics",
                "Child span {SpanId} ends",
                attrs,
                TIER_CHILD_END,
            ));
        }
        let attrs = vec![("SpanId".to_string(), span.span_id.clone())];
        logs.push(LogEntry::new(
            span.start_time,
            "Diagnostics",
            "Span {SpanId} starts",
            attrs.clone(),
            TIER_SPAN_START,
        ));
        logs.push(LogEntry::new(
            span.end_time,
            "Diagnostics",
            "Span {SpanId} ends",
            attrs,
            TIER_SPAN_END,
        ));
        arena[i].logs.extend(logs);
    }
}

/// `max(own duration, sum of children)` per span, computed post-order
fn widest_durations(arena: &[Span], children: &[Vec<usize>]) -> Vec<u64> {
    let mut widest = vec![0u64; arena.len()];
    let mut stack = vec![(ROOT_INDEX, false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            let total: u64 = children[node]
                .iter()
                .fold(0u64, |acc, &c| acc.saturating_add(widest[c]));
            widest[node] = arena[node].duration().max(total);
        } else {
            stack.push((node, true));
            stack.extend(children[node].iter().map(|&c| (c, false)));
        }
    }
    widest
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::model::description::ComponentKind;
    use crate::domain::model::span::LogLevel;

    pub(crate) fn span(id: &str, parent: &str, start: u64, end: u64) -> Span {
        span_with(id, parent, start, end, "svc", "op", &[])
    }

    pub(crate) fn span_with(
        id: &str,
        parent: &str,
        start: u64,
        end: u64,
        service: &str,
        operation: &str,
        attrs: &[(&str, &str)],
    ) -> Span {
        Span {
            trace_id: "t1".into(),
            span_id: id.into(),
            parent_span_id: parent.into(),
            service_name: service.into(),
            operation_name: operation.into(),
            start_time: start,
            end_time: end,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            logs: Vec::new(),
            kind: SpanKind::Internal,
        }
    }

    fn index_of(model: &TraceLensModel, id: &str) -> usize {
        model
            .spans()
            .iter()
            .position(|s| s.span_id == id)
            .unwrap()
    }

    fn assert_tree_invariant(model: &TraceLensModel) {
        for i in 1..model.len() {
            let parent = model.parent(i).unwrap();
            assert_eq!(model.depth(i), model.depth(parent) + 1, "span {}", i);
            assert!(model.children(parent).contains(&i));
        }
    }

    #[test]
    fn test_tree_invariant_with_clock_skew() {
        // child starts before its parent
        let model = TraceLensModel::build(
            vec![
                span("c", "b", 5, 6),
                span("b", "a", 20, 30),
                span("a", "", 10, 40),
            ],
            ModelOptions::default(),
        );
        assert_tree_invariant(&model);
        assert_eq!(model.depth(index_of(&model, "a")), 0);
        assert_eq!(model.depth(index_of(&model, "c")), 2);
        assert_eq!(model.depth(ROOT_INDEX), -1);
    }

    #[test]
    fn test_multi_root() {
        let model = TraceLensModel::build(
            vec![
                span("a", "", 1, 2),
                span("b", "missing", 3, 4),
                span("c", "gone", 5, 6),
            ],
            ModelOptions::default(),
        );
        assert_eq!(model.children(ROOT_INDEX).len(), 3);
        assert_eq!(model.root().trace_id, ROOT_TRACE_ID);
        assert_eq!(model.description(ROOT_INDEX).component.kind, ComponentKind::Start);
        assert_tree_invariant(&model);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let mut dup = span("a", "", 100, 200);
        dup.operation_name = "second".into();
        let model = TraceLensModel::build(
            vec![span("a", "", 1, 2), dup],
            ModelOptions::default(),
        );
        assert_eq!(model.len(), 2);
        assert_eq!(model.span(1).operation_name, "op");
    }

    #[test]
    fn test_self_parent_and_cycle_become_roots() {
        let model = TraceLensModel::build(
            vec![
                span("self", "self", 1, 2),
                span("x", "y", 3, 4),
                span("y", "x", 5, 6),
            ],
            ModelOptions::default(),
        );
        assert_tree_invariant(&model);
        let x = index_of(&model, "x");
        let y = index_of(&model, "y");
        assert_eq!(model.parent(x), Some(ROOT_INDEX));
        assert_eq!(model.parent(y), Some(x));
        assert_eq!(model.children(ROOT_INDEX).len(), 2);
    }

    #[test]
    fn test_children_in_start_order() {
        let model = TraceLensModel::build(
            vec![
                span("late", "p", 30, 40),
                span("p", "", 0, 100),
                span("early", "p", 10, 20),
            ],
            ModelOptions::default(),
        );
        let p = index_of(&model, "p");
        let ids: Vec<_> = model
            .children(p)
            .iter()
            .map(|&c| model.span(c).span_id.as_str())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_start_end_and_percentages() {
        let model = TraceLensModel::build(
            vec![span("a", "", 100, 200), span("b", "a", 150, 300)],
            ModelOptions::default(),
        );
        assert_eq!(model.start_time(), 100);
        assert_eq!(model.end_time(), 300);
        let b = index_of(&model, "b");
        assert!((model.start_percent(b) - 25.0).abs() < 1e-9);
        assert!((model.width_percent(b) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_percentages() {
        let model = TraceLensModel::build(vec![span("a", "", 5, 5)], ModelOptions::default());
        assert_eq!(model.start_percent(1), 0.0);
        assert_eq!(model.width_percent(1), 0.0);

        let empty = TraceLensModel::build(Vec::new(), ModelOptions::default());
        assert!(empty.is_empty());
        assert!(empty.start_span().is_none());
        assert_eq!(empty.widest_child_duration(), 0);
    }

    #[test]
    fn test_widest_duration() {
        // two sequential children outlast their short parent
        let model = TraceLensModel::build(
            vec![
                span("p", "", 0, 10),
                span("c1", "p", 0, 8),
                span("c2", "p", 8, 16),
                span("r2", "", 0, 5),
            ],
            ModelOptions::default(),
        );
        assert_eq!(model.widest_duration(index_of(&model, "p")), 16);
        assert_eq!(model.widest_child_duration(), 21);
    }

    #[test]
    fn test_diagnostics_logs() {
        let mut parent = span("p", "", 0, 100);
        parent
            .logs
            .push(LogEntry::new(50, "Information", "hello", vec![], 2));
        let model = TraceLensModel::build(
            vec![parent, span("c", "p", 10, 20)],
            ModelOptions {
                flatten: false,
                diagnostics: true,
            },
        );
        let p = index_of(&model, "p");
        let bodies: Vec<String> = model.span(p).logs.iter().map(|l| l.format()).collect();
        assert_eq!(
            bodies,
            vec![
                "svc op p",
                "Span p starts",
                "Child span c starts",
                "Child span c ends",
                "hello",
                "Span p ends",
            ]
        );
        assert_eq!(model.span(p).logs[0].level, LogLevel::Span);
        assert_eq!(model.span(p).logs[1].level, LogLevel::Diagnostics);
        assert!(model.root().logs.is_empty());
    }

    #[test]
    fn test_logical_parent_skips_clients() {
        let mut client = span("client", "server", 1, 9);
        client.kind = SpanKind::Client;
        let model = TraceLensModel::build(
            vec![
                span("server", "", 0, 10),
                client,
                span("remote", "client", 2, 8),
            ],
            ModelOptions {
                flatten: true,
                diagnostics: false,
            },
        );
        let remote = index_of(&model, "remote");
        let client = index_of(&model, "client");
        let server = index_of(&model, "server");
        assert!(model.is_elided(client));
        assert_eq!(model.logical_parent(remote, false), Some(client));
        assert_eq!(model.logical_parent(remote, true), Some(server));
        assert_eq!(model.logical_parent(ROOT_INDEX, true), None);
    }
}
