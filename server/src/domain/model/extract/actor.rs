//! Actor frameworks: Microsoft Orleans and Proto.Actor

use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

const ORLEANS_STACK: &str = "Microsoft Orleans";
const PROTO_STACK: &str = "Proto.Actor";
const NO_ACTOR: &str = "<None>";
const ROOT_CONTEXT: &str = "RootContext";

/// Orleans grain calls; spans with a source id come from another grain
pub struct OrleansExtractor;

impl Extractor for OrleansExtractor {
    fn name(&self) -> &'static str {
        "orleans"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        if span.attribute(keys::RPC_SYSTEM) != "orleans" {
            return None;
        }

        let service = span.attribute(keys::RPC_SERVICE);
        let method = span.attribute(keys::RPC_METHOD);
        let description = if span.attribute(keys::RPC_ORLEANS_SOURCE_ID).is_empty() {
            SpanDescription::new(
                span.service_name(),
                format!("{}Client", service),
                method,
                ComponentKind::Service,
                CallKind::Sync,
            )
        } else {
            SpanDescription::new(
                span.service_name(),
                service,
                method,
                ComponentKind::Actor,
                CallKind::Sync,
            )
        };
        Some(Extraction::direct(description.with_stack(ORLEANS_STACK)))
    }
}

/// Proto.Actor event stream publishing and subscribers
pub struct ProtoActorEventExtractor;

impl Extractor for ProtoActorEventExtractor {
    fn name(&self) -> &'static str {
        "proto_actor_event"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let operation = span.operation_name();
        let component = if operation.contains("EventStream") {
            "EventStream".to_string()
        } else if operation.contains("Subscriber") {
            format!("Subscriber:{}", span.attribute(keys::PROTO_EVENT_SUBSCRIBER))
        } else {
            return None;
        };

        Some(Extraction::direct(
            SpanDescription::new(
                span.service_name(),
                component,
                span.attribute(keys::PROTO_MESSAGE_TYPE),
                ComponentKind::Service,
                CallKind::Sync,
            )
            .with_stack(PROTO_STACK),
        ))
    }
}

/// Proto.Actor message sends, requests and spawns
pub struct ProtoActorExtractor;

impl Extractor for ProtoActorExtractor {
    fn name(&self) -> &'static str {
        "proto_actor"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let actor = span.attribute(keys::PROTO_ACTOR_TYPE);
        if actor.is_empty() {
            return None;
        }

        let action = span.attribute(keys::PROTO_ACTION);
        if action == "SpawnNamed" || action == "Spawn" {
            return Some(Extraction::direct(
                SpanDescription::new(
                    span.service_name(),
                    actor,
                    action,
                    ComponentKind::Actor,
                    CallKind::Sync,
                )
                .with_stack(PROTO_STACK),
            ));
        }

        let (actor, kind, is_client) = if actor == NO_ACTOR {
            (ROOT_CONTEXT, ComponentKind::Service, true)
        } else {
            (actor, ComponentKind::Actor, false)
        };
        let call_kind = if span.operation_name().contains(".Send ") {
            CallKind::Async
        } else {
            CallKind::Sync
        };

        Some(Extraction::direct(
            SpanDescription::new(
                span.service_name(),
                actor,
                span.attribute(keys::PROTO_MESSAGE_TYPE),
                kind,
                call_kind,
            )
            .with_response(span.attribute(keys::PROTO_RESPONSE_MESSAGE_TYPE))
            .with_stack(PROTO_STACK)
            .client(is_client),
        ))
    }
}

/// Work done inside an actor, found through the nearest actor ancestor
pub struct ProtoActorChildExtractor;

impl Extractor for ProtoActorChildExtractor {
    fn name(&self) -> &'static str {
        "proto_actor_child"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let (actor, hops) = span.parent_tag(keys::PROTO_ACTOR_TYPE)?;
        if actor.is_empty() {
            return None;
        }
        let actor = if actor == NO_ACTOR { ROOT_CONTEXT } else { actor };
        Some(Extraction::at(
            SpanDescription::new(
                span.service_name(),
                actor,
                span.operation_name(),
                ComponentKind::Actor,
                CallKind::Sync,
            ),
            hops,
        ))
    }
}
