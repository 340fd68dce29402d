//! Message queue producers and consumers

use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

const AZURE_QUEUE_HOST: &str = ".queue.core.windows.net";

/// Consumers: Kafka consumer groups, then any system tagged `span.kind=consumer`
pub struct QueueConsumerExtractor;

impl Extractor for QueueConsumerExtractor {
    fn name(&self) -> &'static str {
        "queue_consumer"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let group = span.attribute(keys::MESSAGING_KAFKA_CONSUMER_GROUP);
        if !group.is_empty() {
            return Some(Extraction::direct(
                SpanDescription::new(
                    span.service_name(),
                    group,
                    span.operation_name(),
                    ComponentKind::QueueConsumer,
                    CallKind::Async,
                )
                .with_stack("Kafka"),
            ));
        }

        let system = span.attribute(keys::MESSAGING_SYSTEM);
        if system.is_empty() || span.attribute(keys::SPAN_KIND) != "consumer" {
            return None;
        }
        let destination = destination(span)?;

        Some(Extraction::direct(
            SpanDescription::new(
                span.service_name(),
                destination,
                "",
                ComponentKind::QueueConsumer,
                CallKind::Async,
            )
            .with_stack(system),
        ))
    }
}

/// Producers: Azure storage queues by URL, then any messaging system
pub struct QueueExtractor;

impl Extractor for QueueExtractor {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        let url = span.attribute(keys::HTTP_URL);
        if url.contains(AZURE_QUEUE_HOST) {
            let queue = first_path_segment(url)?;
            return Some(Extraction::direct(
                SpanDescription::new("Azure", queue, "", ComponentKind::Queue, CallKind::Async)
                    .with_stack("Azure Storage Queue"),
            ));
        }

        // Kafka consumers also carry a destination
        if !span.attribute(keys::MESSAGING_KAFKA_CONSUMER_GROUP).is_empty() {
            return None;
        }

        let system = span.attribute(keys::MESSAGING_SYSTEM);
        if system.is_empty() {
            return None;
        }
        let destination = destination(span)?;

        Some(Extraction::direct(
            SpanDescription::new(system, destination, "", ComponentKind::Queue, CallKind::Async)
                .with_stack(system),
        ))
    }
}

fn destination<'a>(span: SpanRef<'a>) -> Option<&'a str> {
    [keys::MESSAGING_DESTINATION, keys::MESSAGING_DESTINATION_NAME]
        .into_iter()
        .map(|key| span.attribute(key))
        .find(|value| !value.is_empty())
}

/// First path segment of an absolute URL, without slashes
fn first_path_segment(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (_, path) = rest.split_once('/')?;
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segment = path.split('/').next().unwrap_or_default();
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Chain;
    use super::*;

    #[test]
    fn test_first_path_segment() {
        assert_eq!(
            first_path_segment("https://acct.queue.core.windows.net/orders/messages"),
            Some("orders")
        );
        assert_eq!(
            first_path_segment("https://acct.queue.core.windows.net/orders?x=1"),
            Some("orders")
        );
        assert_eq!(first_path_segment("https://acct.queue.core.windows.net/"), None);
        assert_eq!(first_path_segment("https://acct.queue.core.windows.net"), None);
    }

    #[test]
    fn test_kafka_consumer() {
        let d = Chain::new()
            .push(
                "fraud",
                "orders process",
                &[
                    ("messaging.system", "kafka"),
                    ("messaging.destination.name", "orders"),
                    ("messaging.kafka.consumer.group", "frauddetection"),
                ],
            )
            .describe();
        assert_eq!(d.id, "fraud:frauddetection");
        assert_eq!(d.operation, "orders process");
        assert_eq!(d.component.kind, ComponentKind::QueueConsumer);
        assert_eq!(d.call_kind, CallKind::Async);
        assert_eq!(d.component.stack, "Kafka");
    }

    #[test]
    fn test_generic_consumer() {
        let d = Chain::new()
            .push(
                "billing",
                "receive",
                &[
                    ("messaging.system", "rabbitmq"),
                    ("span.kind", "consumer"),
                    ("messaging.destination", "invoices"),
                ],
            )
            .describe();
        assert_eq!(d.id, "billing:invoices");
        assert_eq!(d.component.kind, ComponentKind::QueueConsumer);
        assert_eq!(d.component.stack, "rabbitmq");
    }

    #[test]
    fn test_producer() {
        let d = Chain::new()
            .push(
                "checkout",
                "orders publish",
                &[
                    ("messaging.system", "kafka"),
                    ("messaging.destination.name", "orders"),
                ],
            )
            .describe();
        assert_eq!(d.id, "kafka:orders");
        assert_eq!(d.component.kind, ComponentKind::Queue);
        assert_eq!(d.call_kind, CallKind::Async);
    }

    #[test]
    fn test_producer_requires_destination() {
        let d = Chain::new()
            .push("checkout", "publish", &[("messaging.system", "kafka")])
            .describe();
        assert_eq!(d.component.kind, ComponentKind::Service);
    }

    #[test]
    fn test_azure_storage_queue() {
        let d = Chain::new()
            .push(
                "worker",
                "PUT",
                &[("http.url", "https://acct.queue.core.windows.net/jobs/messages")],
            )
            .describe();
        assert_eq!(d.id, "Azure:jobs");
        assert_eq!(d.component.kind, ComponentKind::Queue);
        assert_eq!(d.component.stack, "Azure Storage Queue");
    }
}
