//! OTLP utility functions
//!
//! Provides reusable functions for working with OTLP protobuf types:
//! - Attribute extraction and conversion
//! - Shared attribute keys used by ingestion and classification
//! - The escaped `key:value` projection used by the attribute index

use std::collections::BTreeMap;

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::resource::v1::Resource;

// ============================================================================
// SHARED ATTRIBUTE KEYS
// ============================================================================

/// Attribute keys read during ingestion and span classification
pub mod keys {
    pub const SERVICE_NAME: &str = "service.name";
    pub const STATUS_CODE: &str = "status.code";

    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_HOST: &str = "http.host";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_ROUTE: &str = "http.route";
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const URL_FULL: &str = "url.full";
    pub const PEER_SERVICE: &str = "peer.service";

    pub const RPC_SYSTEM: &str = "rpc.system";
    pub const RPC_SERVICE: &str = "rpc.service";
    pub const RPC_METHOD: &str = "rpc.method";
    pub const RPC_ORLEANS_SOURCE_ID: &str = "rpc.orleans.source_id";

    pub const DB_SYSTEM: &str = "db.system";
    pub const DB_NAME: &str = "db.name";
    pub const DB_STATEMENT: &str = "db.statement";
    pub const TRACELENS_KIND: &str = "tracelens.kind";

    pub const MESSAGING_SYSTEM: &str = "messaging.system";
    pub const MESSAGING_DESTINATION: &str = "messaging.destination";
    pub const MESSAGING_DESTINATION_NAME: &str = "messaging.destination.name";
    pub const MESSAGING_KAFKA_CONSUMER_GROUP: &str = "messaging.kafka.consumer.group";
    pub const SPAN_KIND: &str = "span.kind";

    pub const PROTO_ACTOR_TYPE: &str = "proto.actortype";
    pub const PROTO_ACTION: &str = "proto.action";
    pub const PROTO_MESSAGE_TYPE: &str = "proto.messagetype";
    pub const PROTO_RESPONSE_MESSAGE_TYPE: &str = "proto.responsemessagetype";
    pub const PROTO_EVENT_SUBSCRIBER: &str = "proto.eventsubscriber";

    pub const TEMPORAL_WORKFLOW_ID: &str = "temporalWorkflowID";
    pub const TEST_NAME: &str = "test.name";
}

/// Attributes that are never written to the tag search index.
///
/// Actor process ids are unique per message and would flood the index.
pub const BLOCKED_INDEX_ATTRIBUTES: &[&str] =
    &["proto.actorpid", "proto.senderpid", "proto.targetpid"];

pub fn is_blocked_index_attribute(key: &str) -> bool {
    BLOCKED_INDEX_ATTRIBUTES.contains(&key)
}

// ============================================================================
// ATTRIBUTE EXTRACTION
// ============================================================================

/// Extract attributes from KeyValue array into an ordered map.
///
/// The first occurrence of a duplicated key wins.
pub fn extract_attributes(attrs: &[KeyValue]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for kv in attrs {
        if let Some(v) = kv.value.as_ref() {
            map.entry(kv.key.clone())
                .or_insert_with(|| any_value_to_string(v));
        }
    }
    map
}

/// Extract attributes preserving wire order (duplicates kept)
pub fn extract_attribute_pairs(attrs: &[KeyValue]) -> Vec<(String, String)> {
    attrs
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| (kv.key.clone(), any_value_to_string(v)))
        })
        .collect()
}

/// Convert AnyValue to string representation
pub fn any_value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::ArrayValue(arr)) => {
            let values: Vec<String> = arr.values.iter().map(any_value_to_string).collect();
            serde_json::to_string(&values).unwrap_or_default()
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: BTreeMap<String, String> = kvlist
                .values
                .iter()
                .filter_map(|kv| {
                    kv.value
                        .as_ref()
                        .map(|v| (kv.key.clone(), any_value_to_string(v)))
                })
                .collect();
            serde_json::to_string(&map).unwrap_or_default()
        }
        Some(any_value::Value::BytesValue(b)) => hex::encode(b),
        None => String::new(),
    }
}

/// Service name from resource attributes, empty when absent
pub fn resource_service_name(resource: Option<&Resource>) -> String {
    resource
        .and_then(|r| r.attributes.iter().find(|kv| kv.key == keys::SERVICE_NAME))
        .and_then(|kv| kv.value.as_ref())
        .map(any_value_to_string)
        .unwrap_or_default()
}

/// Hex-encode a trace or span id (lowercase, empty for empty ids)
pub fn id_to_hex(id: &[u8]) -> String {
    hex::encode(id)
}

// ============================================================================
// ATTRIBUTE INDEX ENCODING
// ============================================================================

/// Encode an attribute as `key:value`.
///
/// `\` and `:` inside the key are backslash-escaped so the entry always
/// splits at the first unescaped colon. Values are stored verbatim.
pub fn encode_attribute(key: &str, value: &str) -> String {
    let mut out = String::with_capacity(key.len() + value.len() + 1);
    for c in key.chars() {
        if c == '\\' || c == ':' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(':');
    out.push_str(value);
    out
}

/// Decode an entry produced by [`encode_attribute`].
///
/// Returns `None` when no unescaped colon is present.
pub fn decode_attribute(entry: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut chars = entry.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    key.push(escaped);
                }
            }
            ':' => return Some((key, entry[idx + 1..].to_string())),
            _ => key.push(c),
        }
    }
    None
}
