//! Spans running under a named test

use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

pub struct TestExtractor;

impl Extractor for TestExtractor {
    fn name(&self) -> &'static str {
        "test"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let (test_name, hops) = span.parent_tag(keys::TEST_NAME)?;
        if test_name.is_empty() {
            return None;
        }
        Some(Extraction::at(
            SpanDescription::new(
                "Test",
                test_name,
                span.operation_name(),
                ComponentKind::Service,
                CallKind::Sync,
            ),
            hops,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Chain;
    use super::*;

    #[test]
    fn test_named_test_span() {
        let d = Chain::new()
            .push("runner", "Execute", &[("test.name", "CheckoutTests.PlaceOrder")])
            .describe();
        assert_eq!(d.id, "Test:CheckoutTests.PlaceOrder");
        assert_eq!(d.operation, "Execute");
    }

    #[test]
    fn test_descendant_priority_is_distance() {
        let chain = Chain::new()
            .push("runner", "Execute", &[("test.name", "T")])
            .push("runner", "step", &[])
            .push("runner", "inner", &[]);
        let found = TestExtractor.extract(chain.leaf()).map(|e| e.priority);
        assert_eq!(found, Some(2));
        assert_eq!(chain.describe().id, "Test:T");
    }
}
