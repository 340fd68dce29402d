//! Span classification
//!
//! Each extractor recognizes one technology from a span's attributes (and,
//! for some, its ancestors'). Every extractor runs in registration order;
//! the match with the lowest priority wins and ties keep the earlier one.
//! Spans nobody recognizes are described as plain service operations.

mod actor;
mod cloud;
mod database;
mod http;
mod messaging;
mod root;
mod rpc;
mod test;
mod workflow;

use crate::data::types::SpanKind;

use super::description::{CallKind, ComponentKind, SpanDescription};
use super::span::Span;

/// Read access to a span and its ancestor chain during classification
#[derive(Clone, Copy)]
pub struct SpanRef<'a> {
    spans: &'a [Span],
    parents: &'a [Option<usize>],
    index: usize,
}

impl<'a> SpanRef<'a> {
    pub fn new(spans: &'a [Span], parents: &'a [Option<usize>], index: usize) -> Self {
        Self {
            spans,
            parents,
            index,
        }
    }

    pub fn span(&self) -> &'a Span {
        &self.spans[self.index]
    }

    pub fn attribute(&self, key: &str) -> &'a str {
        self.span().attribute(key)
    }

    pub fn service_name(&self) -> &'a str {
        &self.span().service_name
    }

    pub fn operation_name(&self) -> &'a str {
        &self.span().operation_name
    }

    pub fn kind(&self) -> SpanKind {
        self.span().kind
    }

    pub fn trace_id(&self) -> &'a str {
        &self.span().trace_id
    }

    /// Find `key` on this span or the nearest ancestor.
    ///
    /// Returns the value and the number of hops (0 = this span). The walk
    /// is bounded by the arena size so a parent cycle cannot hang it.
    pub fn parent_tag(&self, key: &str) -> Option<(&'a str, usize)> {
        let mut current = Some(self.index);
        let mut hops = 0;
        while let Some(idx) = current {
            if hops > self.spans.len() {
                break;
            }
            let span = &self.spans[idx];
            if span.has_attribute(key) {
                return Some((span.attribute(key), hops));
            }
            current = self.parents[idx];
            hops += 1;
        }
        None
    }
}

/// A successful match and its priority (lower wins)
pub struct Extraction {
    pub description: SpanDescription,
    pub priority: usize,
}

impl Extraction {
    /// Match on the span's own attributes
    pub fn direct(description: SpanDescription) -> Self {
        Self {
            description,
            priority: 0,
        }
    }

    pub fn at(description: SpanDescription, priority: usize) -> Self {
        Self {
            description,
            priority,
        }
    }
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction>;
}

static EXTRACTORS: &[&dyn Extractor] = &[
    &root::RootExtractor,
    &workflow::TemporalExtractor,
    &actor::OrleansExtractor,
    &rpc::RpcExtractor,
    &actor::ProtoActorEventExtractor,
    &actor::ProtoActorExtractor,
    &database::DbStatementExtractor,
    &database::DbExtractor,
    &messaging::QueueConsumerExtractor,
    &messaging::QueueExtractor,
    &cloud::AzureExtractor,
    &http::ExternalHttpEndpointExtractor,
    &http::HttpEndpointExtractor,
    &http::HttpRequestExtractor,
    &test::TestExtractor,
    &actor::ProtoActorChildExtractor,
];

/// Registered extractor names in evaluation order
pub fn extractor_names() -> Vec<&'static str> {
    EXTRACTORS.iter().map(|e| e.name()).collect()
}

/// Describe a span with the registered extractors
pub fn describe(span: SpanRef<'_>) -> SpanDescription {
    describe_with(EXTRACTORS, span)
}

pub(crate) fn describe_with(extractors: &[&dyn Extractor], span: SpanRef<'_>) -> SpanDescription {
    let mut best: Option<Extraction> = None;
    for extractor in extractors {
        if let Some(found) = extractor.extract(span)
            && best.as_ref().is_none_or(|b| found.priority < b.priority)
        {
            best = Some(found);
        }
    }

    match best {
        Some(found) => found.description,
        None => SpanDescription::new(
            "",
            span.service_name(),
            span.operation_name(),
            ComponentKind::Service,
            CallKind::Sync,
        )
        .client(span.kind() == SpanKind::Client),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Chain;
    use super::*;

    struct Fixed(&'static str, usize, &'static str);

    impl Extractor for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn extract(&self, _span: SpanRef<'_>) -> Option<Extraction> {
            Some(Extraction::at(
                SpanDescription::new("g", self.2, "", ComponentKind::Actor, CallKind::Sync),
                self.1,
            ))
        }
    }

    #[test]
    fn test_registration_order() {
        let names = extractor_names();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "root");
        assert_eq!(names[1], "temporal");
        assert_eq!(names[15], "proto_actor_child");
    }

    #[test]
    fn test_lowest_priority_wins() {
        let chain = Chain::new().push("svc", "op", &[]);
        let a = Fixed("a", 2, "A");
        let b = Fixed("b", 0, "B");
        let c = Fixed("c", 1, "C");
        let d = describe_with(&[&a, &b, &c], chain.leaf());
        assert_eq!(d.component.name, "B");
    }

    #[test]
    fn test_ties_keep_first_registered() {
        let chain = Chain::new().push("svc", "op", &[]);
        let a = Fixed("a", 0, "A");
        let b = Fixed("b", 0, "B");
        let d = describe_with(&[&a, &b], chain.leaf());
        assert_eq!(d.component.name, "A");
    }

    #[test]
    fn test_fallback_is_service() {
        let d = Chain::new().push("checkout", "DoWork", &[]).describe();
        assert_eq!(d.group.name, "checkout");
        assert_eq!(d.component.name, "Internal");
        assert_eq!(d.operation, "DoWork");
        assert_eq!(d.component.kind, ComponentKind::Service);
        assert!(!d.is_client);

        let client = Chain::new()
            .push_kind("checkout", "call", SpanKind::Client, &[])
            .describe();
        assert!(client.is_client);
    }

    #[test]
    fn test_parent_tag_hops() {
        let chain = Chain::new()
            .push("svc", "a", &[("test.name", "T1")])
            .push("svc", "b", &[])
            .push("svc", "c", &[]);
        assert_eq!(chain.leaf().parent_tag("test.name"), Some(("T1", 2)));
        assert_eq!(chain.leaf().parent_tag("missing"), None);
    }

    #[test]
    fn test_parent_tag_survives_cycle() {
        let mut chain = Chain::new().push("svc", "a", &[]).push("svc", "b", &[]);
        chain.parents[0] = Some(1);
        assert_eq!(chain.leaf().parent_tag("missing"), None);
    }

    #[test]
    fn test_ancestor_match_loses_to_direct_match() {
        // HTTP route on the span itself beats the test name two hops up
        let d = Chain::new()
            .push("svc", "test", &[("test.name", "T1")])
            .push("svc", "mid", &[])
            .push("api", "GET", &[("http.route", "/cart"), ("http.method", "get")])
            .describe();
        assert_eq!(d.component.kind, ComponentKind::Endpoint);
        assert_eq!(d.component.name, "/cart");
    }
}
