//! Domain logic for trace analysis
//!
//! - `ingest` - OTLP ingestion pipelines
//! - `model` - Span classification, trace model and component graph
//! - `search` - Trace filters and the search service

pub mod ingest;
pub mod model;
pub mod search;
