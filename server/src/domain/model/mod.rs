//! Trace model: span classification, the span forest and derived graphs

pub mod description;
pub mod extract;
pub mod graph;
pub mod span;
pub mod trace;
pub mod translate;
pub mod view;

pub use description::{CallKind, Component, ComponentKind, Group, SpanDescription};
pub use graph::{Call, ComponentGraph, GraphLevel};
pub use span::{LogEntry, LogLevel, Span};
pub use trace::{ModelOptions, ROOT_TRACE_ID, TraceLensModel};
pub use translate::build_model;
pub use view::TraceModelView;
