//! HTTP servers and clients

use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

/// Outbound HTTP calls to a named peer
pub struct ExternalHttpEndpointExtractor;

impl Extractor for ExternalHttpEndpointExtractor {
    fn name(&self) -> &'static str {
        "external_http_endpoint"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        if span.attribute(keys::HTTP_METHOD).is_empty() {
            return None;
        }
        let peer = span.attribute(keys::PEER_SERVICE);
        if peer.is_empty() {
            return None;
        }
        Some(Extraction::direct(
            SpanDescription::new("HTTP", peer, "", ComponentKind::Service, CallKind::Sync)
                .with_stack("HTTP"),
        ))
    }
}

/// Server endpoints, keyed by route or else by host
pub struct HttpEndpointExtractor;

impl Extractor for HttpEndpointExtractor {
    fn name(&self) -> &'static str {
        "http_endpoint"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        // Old and new semantic conventions; at most one is normally set
        let operation = format!(
            "HTTP {}{}",
            span.attribute(keys::HTTP_METHOD).to_uppercase(),
            span.attribute(keys::HTTP_REQUEST_METHOD).to_uppercase()
        );

        let route = span.attribute(keys::HTTP_ROUTE);
        if !route.is_empty() {
            return Some(Extraction::direct(
                SpanDescription::new(
                    span.service_name(),
                    route,
                    operation,
                    ComponentKind::Endpoint,
                    CallKind::Sync,
                )
                .with_stack("ASP.NET Core"),
            ));
        }

        if span.attribute(keys::HTTP_URL).is_empty() {
            return None;
        }
        Some(Extraction::direct(
            SpanDescription::new(
                span.service_name(),
                span.attribute(keys::HTTP_HOST),
                operation,
                ComponentKind::Endpoint,
                CallKind::Sync,
            )
            .with_response("Unknown HTTP Server"),
        ))
    }
}

/// HTTP client requests using the stable semantic conventions
pub struct HttpRequestExtractor;

impl Extractor for HttpRequestExtractor {
    fn name(&self) -> &'static str {
        "http_request"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let method = span.attribute(keys::HTTP_REQUEST_METHOD);
        if method.is_empty() {
            return None;
        }
        Some(Extraction::direct(
            SpanDescription::new(
                span.service_name(),
                "HTTP Client",
                format!("HTTP {} {}", method.to_uppercase(), span.attribute(keys::URL_FULL)),
                ComponentKind::Service,
                CallKind::Sync,
            )
            .client(true),
        ))
    }
}
