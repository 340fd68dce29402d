//! Trace search
//!
//! - `filter` - composite filter expressions and their JSON form
//! - `evaluate` - filter evaluation with clause evidence
//! - `hoist` - log filter pushdown and candidate hints
//! - `service` - search, metadata, trace model and snapshot queries

pub mod evaluate;
pub mod filter;
pub mod hoist;
pub mod service;

pub use filter::{FilterParseError, TraceFilterExpression};
pub use service::{SearchService, SearchTracesRequest, TraceModelOptions};
