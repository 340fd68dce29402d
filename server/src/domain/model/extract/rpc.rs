use super::{Extraction, Extractor, SpanRef};
use crate::data::types::SpanKind;
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

/// Generic RPC: clients are services, everything else an endpoint
pub struct RpcExtractor;

impl Extractor for RpcExtractor {
    fn name(&self) -> &'static str {
        "rpc"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let system = span.attribute(keys::RPC_SYSTEM);
        if system.is_empty() {
            return None;
        }

        let is_client = span.kind() == SpanKind::Client;
        let kind = if is_client {
            ComponentKind::Service
        } else {
            ComponentKind::Endpoint
        };
        Some(Extraction::direct(
            SpanDescription::new(
                span.service_name(),
                span.attribute(keys::RPC_SERVICE),
                span.attribute(keys::RPC_METHOD),
                kind,
                CallKind::Sync,
            )
            .with_stack(system)
            .client(is_client),
        ))
    }
}
