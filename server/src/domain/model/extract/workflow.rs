use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

const STACK: &str = "Temporal.IO";

/// Temporal workflows and activities, named `<Verb>:<Name>`
pub struct TemporalExtractor;

impl Extractor for TemporalExtractor {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        if span.attribute(keys::TEMPORAL_WORKFLOW_ID).is_empty() {
            return None;
        }

        let operation = span.operation_name();
        let (label, kind) = if operation.starts_with("RunWorkflow") {
            ("Run Workflow", ComponentKind::Workflow)
        } else if operation.starts_with("StartActivity") {
            ("Start Activity", ComponentKind::Activity)
        } else if operation.starts_with("RunActivity") {
            ("Run Activity", ComponentKind::Activity)
        } else {
            return None;
        };

        let name = operation.split(':').nth(1)?;
        Some(Extraction::direct(
            SpanDescription::new("Temporal", name, label, kind, CallKind::Sync).with_stack(STACK),
        ))
    }
}
