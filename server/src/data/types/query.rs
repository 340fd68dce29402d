//! Repository query parameters and results

use serde::Serialize;

/// Candidate trace selection for search.
///
/// Name sets act as a prefilter: service names only, span names only, or
/// either when both are given. Zero time bounds are ignored.
#[derive(Debug, Clone, Default)]
pub struct TraceCandidateQuery {
    pub service_names: Vec<String>,
    pub span_names: Vec<String>,
    pub start_time: u64,
    pub end_time: u64,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceCandidate {
    pub trace_id: String,
    pub start_time: u64,
}

/// A log attribute condition; `None` value means the key must exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAttributePredicate {
    pub key: String,
    pub value: Option<String>,
}

/// Log retrieval for a set of traces.
///
/// A log is returned when any predicate holds (or none are given).
/// `body_contains` is matched case-insensitively against the raw body.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub trace_ids: Vec<String>,
    pub predicates: Vec<LogAttributePredicate>,
    pub body_contains: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchData {
    pub service_names: Vec<String>,
    pub span_names: Vec<String>,
    pub tag_names: Vec<String>,
}
