//! Filter evaluation over one trace's stored spans and logs
//!
//! Composites fold every child without short-circuiting so that each
//! attribute clause records its evidence even when the outcome is known.

use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::{
    AttributeFilter, AttributeOperator, AttributeTarget, CompositeFilter, CompositeOperator,
    TraceFilterExpression,
};
use crate::data::types::{LogRow, SpanRow};
use crate::utils::otlp::{decode_attribute, encode_attribute};

/// Spans and logs of a single trace
#[derive(Clone, Copy)]
pub struct TraceContext<'a> {
    pub spans: &'a [SpanRow],
    pub logs: &'a [&'a LogRow],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeMatch {
    pub span_id: String,
    pub key: String,
    pub value: String,
}

/// Evidence recorded for one attribute clause
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeClauseMatch {
    pub clause: String,
    pub satisfied: bool,
    pub matches: Vec<AttributeMatch>,
}

/// Clauses keyed by their text; iteration is in ordinal key order
pub type ClauseMap = BTreeMap<String, AttributeClauseMatch>;

/// Evaluate `expression` against a trace; a missing filter matches everything
pub fn evaluate(
    expression: Option<&TraceFilterExpression>,
    trace: TraceContext<'_>,
    clauses: &mut ClauseMap,
) -> bool {
    let Some(expression) = expression else {
        return true;
    };
    match expression {
        TraceFilterExpression::Service { name } => {
            !name.trim().is_empty() && trace.spans.iter().any(|s| s.service_name == *name)
        }
        TraceFilterExpression::SpanName { name } => {
            !name.trim().is_empty() && trace.spans.iter().any(|s| s.operation_name == *name)
        }
        TraceFilterExpression::Attribute(filter) => evaluate_attribute(filter, trace, clauses),
        TraceFilterExpression::Composite(composite) => {
            evaluate_composite(composite, trace, clauses)
        }
    }
}

fn evaluate_composite(
    composite: &CompositeFilter,
    trace: TraceContext<'_>,
    clauses: &mut ClauseMap,
) -> bool {
    let use_or = match composite.operator {
        CompositeOperator::And => false,
        CompositeOperator::Or => true,
        CompositeOperator::Unknown => return false,
    };
    if composite.expressions.is_empty() {
        return true;
    }
    composite
        .expressions
        .iter()
        .fold(!use_or, |acc, child| {
            let result = evaluate(Some(child), trace, clauses);
            if use_or { acc | result } else { acc & result }
        })
}

fn evaluate_attribute(
    filter: &AttributeFilter,
    trace: TraceContext<'_>,
    clauses: &mut ClauseMap,
) -> bool {
    if filter.key.trim().is_empty() {
        return false;
    }
    let operator = filter.effective_operator();
    if operator == AttributeOperator::Unknown || filter.target == AttributeTarget::Unknown {
        return false;
    }
    if operator == AttributeOperator::Equals && filter.value.is_empty() {
        return false;
    }

    let key = clause_key(filter, operator);
    let matches = match filter.target {
        AttributeTarget::Span => span_matches(trace.spans, filter, operator),
        AttributeTarget::Log => log_matches(trace.logs, filter, operator),
        AttributeTarget::Unknown => Vec::new(),
    };

    let clause = clauses
        .entry(key.clone())
        .or_insert_with(|| AttributeClauseMatch {
            clause: key,
            ..Default::default()
        });
    if matches.is_empty() {
        return false;
    }
    clause.satisfied = true;
    clause.matches.extend(matches);
    true
}

/// `tag:key=value` / `log:key=value` for Equals, `tag:key` / `log:key` otherwise
pub fn clause_key(filter: &AttributeFilter, operator: AttributeOperator) -> String {
    let prefix = match filter.target {
        AttributeTarget::Span => "tag",
        AttributeTarget::Log => "log",
        AttributeTarget::Unknown => "unknown",
    };
    if operator == AttributeOperator::Equals && !filter.value.is_empty() {
        format!("{}:{}={}", prefix, filter.key, filter.value)
    } else {
        format!("{}:{}", prefix, filter.key)
    }
}

fn span_matches(
    spans: &[SpanRow],
    filter: &AttributeFilter,
    operator: AttributeOperator,
) -> Vec<AttributeMatch> {
    let mut matches = Vec::new();
    match operator {
        AttributeOperator::Equals => {
            let target = encode_attribute(&filter.key, &filter.value);
            for span in spans {
                if span.attribute_map.contains(&target) {
                    matches.push(AttributeMatch {
                        span_id: span.span_id.clone(),
                        key: filter.key.clone(),
                        value: filter.value.clone(),
                    });
                }
            }
        }
        _ => {
            for span in spans {
                for entry in &span.attribute_map {
                    if let Some((key, value)) = decode_attribute(entry)
                        && key == filter.key
                    {
                        matches.push(AttributeMatch {
                            span_id: span.span_id.clone(),
                            key,
                            value,
                        });
                    }
                }
            }
        }
    }
    matches
}

fn log_matches(
    logs: &[&LogRow],
    filter: &AttributeFilter,
    operator: AttributeOperator,
) -> Vec<AttributeMatch> {
    logs.iter()
        .flat_map(|log| {
            log.attributes
                .iter()
                .filter(|a| a.key == filter.key)
                .filter(|a| operator != AttributeOperator::Equals || a.value == filter.value)
                .map(|a| AttributeMatch {
                    span_id: log.span_id.clone(),
                    key: filter.key.clone(),
                    value: a.value.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::types::{LogAttribute, LogAttributeSource};

    pub(crate) fn stored_span(span_id: &str, service: &str, op: &str, attrs: &[(&str, &str)]) -> SpanRow {
        SpanRow {
            trace_id: "t1".into(),
            span_id: span_id.into(),
            service_name: service.into(),
            operation_name: op.into(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            attribute_map: attrs.iter().map(|(k, v)| encode_attribute(k, v)).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn stored_log(span_id: &str, body: &str, attrs: &[(&str, &str)]) -> LogRow {
        LogRow {
            trace_id: "t1".into(),
            span_id: span_id.into(),
            body: body.into(),
            raw_body: body.into(),
            attributes: attrs
                .iter()
                .map(|(k, v)| LogAttribute {
                    key: k.to_string(),
                    value: v.to_string(),
                    source: LogAttributeSource::Record,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn fixture() -> (Vec<SpanRow>, Vec<LogRow>) {
        (
            vec![
                stored_span("s1", "frontend", "GET /cart", &[("http.route", "/cart")]),
                stored_span(
                    "s2",
                    "cart",
                    "load",
                    &[("db.system", "redis"), ("url", "http://a:1/b")],
                ),
            ],
            vec![stored_log("s2", "loaded", &[("user.id", "42")])],
        )
    }

    fn run(expr: Option<&TraceFilterExpression>) -> (bool, ClauseMap) {
        let (spans, logs) = fixture();
        let log_refs: Vec<&LogRow> = logs.iter().collect();
        let mut clauses = ClauseMap::new();
        let ok = evaluate(
            expr,
            TraceContext {
                spans: &spans,
                logs: &log_refs,
            },
            &mut clauses,
        );
        (ok, clauses)
    }

    fn service(name: &str) -> TraceFilterExpression {
        TraceFilterExpression::Service { name: name.into() }
    }

    fn tag(key: &str, value: &str, op: AttributeOperator) -> TraceFilterExpression {
        TraceFilterExpression::attribute(AttributeTarget::Span, key, value, op)
    }

    #[test]
    fn test_no_filter_matches() {
        assert!(run(None).0);
        assert!(run(Some(&TraceFilterExpression::and(vec![]))).0);
    }

    #[test]
    fn test_service_and_span_name() {
        assert!(run(Some(&service("cart"))).0);
        assert!(!run(Some(&service("billing"))).0);
        assert!(!run(Some(&service("  "))).0);
        assert!(
            run(Some(&TraceFilterExpression::SpanName {
                name: "GET /cart".into()
            }))
            .0
        );
    }

    #[test]
    fn test_span_equals_records_match() {
        let (ok, clauses) = run(Some(&tag("http.route", "/cart", AttributeOperator::Equals)));
        assert!(ok);
        let clause = &clauses["tag:http.route=/cart"];
        assert!(clause.satisfied);
        assert_eq!(
            clause.matches,
            vec![AttributeMatch {
                span_id: "s1".into(),
                key: "http.route".into(),
                value: "/cart".into(),
            }]
        );
    }

    #[test]
    fn test_span_exists_keeps_colons_in_value() {
        let (ok, clauses) = run(Some(&tag("url", "", AttributeOperator::Unspecified)));
        assert!(ok);
        assert_eq!(clauses["tag:url"].matches[0].value, "http://a:1/b");
    }

    #[test]
    fn test_equals_with_empty_value_is_false() {
        let (ok, clauses) = run(Some(&tag("http.route", "", AttributeOperator::Equals)));
        assert!(!ok);
        assert!(clauses.is_empty());
    }

    #[test]
    fn test_unsatisfied_clause_is_still_recorded() {
        let (ok, clauses) = run(Some(&tag("http.route", "/nope", AttributeOperator::Equals)));
        assert!(!ok);
        assert!(!clauses["tag:http.route=/nope"].satisfied);
    }

    #[test]
    fn test_log_attribute() {
        let filter = TraceFilterExpression::attribute(
            AttributeTarget::Log,
            "user.id",
            "42",
            AttributeOperator::Unspecified,
        );
        let (ok, clauses) = run(Some(&filter));
        assert!(ok);
        assert_eq!(clauses["log:user.id=42"].matches[0].span_id, "s2");
    }

    #[test]
    fn test_and_or_without_short_circuit() {
        let and = TraceFilterExpression::and(vec![
            service("billing"),
            tag("http.route", "/cart", AttributeOperator::Equals),
        ]);
        let (ok, clauses) = run(Some(&and));
        assert!(!ok);
        // evaluated despite the failed first child
        assert!(clauses["tag:http.route=/cart"].satisfied);

        let or = TraceFilterExpression::or(vec![
            service("billing"),
            tag("db.system", "redis", AttributeOperator::Equals),
        ]);
        assert!(run(Some(&or)).0);

        let none = TraceFilterExpression::or(vec![service("billing"), service("ads")]);
        assert!(!run(Some(&none)).0);
    }

    #[test]
    fn test_unknown_operator_leaf_is_no_match() {
        let unknown = tag("http.route", "/cart", AttributeOperator::Unknown);
        let (ok, clauses) = run(Some(&unknown));
        assert!(!ok);
        assert!(clauses.is_empty());

        let or = TraceFilterExpression::or(vec![unknown, service("cart")]);
        assert!(run(Some(&or)).0);

        let xor = TraceFilterExpression::Composite(CompositeFilter {
            operator: CompositeOperator::Unknown,
            expressions: vec![service("cart")],
        });
        assert!(!run(Some(&xor)).0);
    }

    #[test]
    fn test_clauses_sorted_by_key() {
        let expr = TraceFilterExpression::and(vec![
            tag("url", "", AttributeOperator::Exists),
            tag("db.system", "redis", AttributeOperator::Equals),
        ]);
        let (_, clauses) = run(Some(&expr));
        let keys: Vec<_> = clauses.keys().cloned().collect();
        assert_eq!(keys, vec!["tag:db.system=redis", "tag:url"]);
    }
}
