//! TraceLens server: OTLP ingestion, trace search and trace analysis

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
