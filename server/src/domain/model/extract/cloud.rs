//! Azure platform endpoints

use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

/// Calls made to Azure telemetry services, matched on the nearest `http.url`
pub struct AzureExtractor;

impl Extractor for AzureExtractor {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let (url, hops) = span.parent_tag(keys::HTTP_URL)?;
        let component = if url.contains("services.visualstudio.com") {
            "ApplicationInsights"
        } else if url.contains("opinsights.azure.com") {
            "Operations Management"
        } else {
            return None;
        };

        Some(Extraction::at(
            SpanDescription::new("Azure", component, "", ComponentKind::Service, CallKind::Sync)
                .with_stack(format!("Azure {}", component)),
            hops,
        ))
    }
}
