use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::domain::model::trace::ROOT_TRACE_ID;

/// The synthetic root of every model
pub struct RootExtractor;

impl Extractor for RootExtractor {
    fn name(&self) -> &'static str {
        "root"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        (span.trace_id() == ROOT_TRACE_ID).then(|| {
            Extraction::direct(SpanDescription::new(
                "",
                "Start",
                "",
                ComponentKind::Start,
                CallKind::Sync,
            ))
        })
    }
}
