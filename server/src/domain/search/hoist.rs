//! Query pushdown derived from a filter
//!
//! Only conditions every match must satisfy narrow a query: service and span
//! names on the And path from the root prefilter candidate traces, and log
//! attribute leaves select which logs are loaded for evaluation.

use std::collections::BTreeSet;

use super::filter::{
    AttributeFilter, AttributeOperator, AttributeTarget, CompositeOperator, TraceFilterExpression,
};
use crate::data::types::LogAttributePredicate;

/// Walk `expression` depth-first, flagging nodes reachable from the root
/// through And composites only
fn walk<'a>(
    expression: Option<&'a TraceFilterExpression>,
    mut visit: impl FnMut(&'a TraceFilterExpression, bool),
) {
    let mut stack: Vec<(&TraceFilterExpression, bool)> =
        expression.map(|e| (e, true)).into_iter().collect();
    while let Some((expr, required)) = stack.pop() {
        visit(expr, required);
        if let TraceFilterExpression::Composite(composite) = expr {
            let child_required = required && composite.operator == CompositeOperator::And;
            stack.extend(
                composite
                    .expressions
                    .iter()
                    .rev()
                    .map(|e| (e, child_required)),
            );
        }
    }
}

fn log_predicate(filter: &AttributeFilter) -> Option<LogAttributePredicate> {
    if filter.target != AttributeTarget::Log || filter.key.trim().is_empty() {
        return None;
    }
    let value = match filter.effective_operator() {
        AttributeOperator::Exists => None,
        AttributeOperator::Unknown => return None,
        _ => Some(filter.value.clone()),
    };
    Some(LogAttributePredicate {
        key: filter.key.clone(),
        value,
    })
}

/// Log attribute filters reachable from the root through And composites only
pub fn required_log_filters(
    expression: Option<&TraceFilterExpression>,
) -> Vec<LogAttributePredicate> {
    let mut out = Vec::new();
    walk(expression, |expr, required| {
        if let TraceFilterExpression::Attribute(filter) = expr
            && required
            && let Some(predicate) = log_predicate(filter)
        {
            out.push(predicate);
        }
    });
    out
}

/// Predicates for loading logs; a log is kept when any one holds.
///
/// Empty unless some log filter is required. Otherwise every log leaf of the
/// tree is included so that each leaf still sees all logs it could match.
pub fn log_pushdown(expression: Option<&TraceFilterExpression>) -> Vec<LogAttributePredicate> {
    if required_log_filters(expression).is_empty() {
        return Vec::new();
    }
    let mut out: Vec<LogAttributePredicate> = Vec::new();
    walk(expression, |expr, _| {
        if let TraceFilterExpression::Attribute(filter) = expr
            && let Some(predicate) = log_predicate(filter)
            && !out.contains(&predicate)
        {
            out.push(predicate);
        }
    });
    out
}

/// Non-blank service and span names used as a candidate prefilter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterHints {
    pub service_names: BTreeSet<String>,
    pub span_names: BTreeSet<String>,
}

/// Names on the And path from the root; names under Or branches are ignored
pub fn collect_filter_hints(expression: Option<&TraceFilterExpression>) -> FilterHints {
    let mut hints = FilterHints::default();
    walk(expression, |expr, required| match expr {
        TraceFilterExpression::Service { name } if required && !name.trim().is_empty() => {
            hints.service_names.insert(name.clone());
        }
        TraceFilterExpression::SpanName { name } if required && !name.trim().is_empty() => {
            hints.span_names.insert(name.clone());
        }
        _ => {}
    });
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(key: &str, value: &str) -> TraceFilterExpression {
        TraceFilterExpression::attribute(
            AttributeTarget::Log,
            key,
            value,
            AttributeOperator::Unspecified,
        )
    }

    #[test]
    fn test_and_tree_is_hoisted() {
        let expr = TraceFilterExpression::and(vec![
            log("user.id", "42"),
            TraceFilterExpression::and(vec![log("tenant", "")]),
            TraceFilterExpression::attribute(
                AttributeTarget::Span,
                "http.route",
                "/cart",
                AttributeOperator::Equals,
            ),
        ]);
        assert_eq!(
            required_log_filters(Some(&expr)),
            vec![
                LogAttributePredicate {
                    key: "user.id".into(),
                    value: Some("42".into()),
                },
                LogAttributePredicate {
                    key: "tenant".into(),
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn test_or_branches_are_not_hoisted() {
        let expr = TraceFilterExpression::or(vec![
            log("a", "1"),
            TraceFilterExpression::and(vec![log("b", "2")]),
        ]);
        assert!(required_log_filters(Some(&expr)).is_empty());

        let nested = TraceFilterExpression::and(vec![
            log("kept", "1"),
            TraceFilterExpression::or(vec![log("dropped", "2")]),
        ]);
        let hoisted = required_log_filters(Some(&nested));
        assert_eq!(hoisted.len(), 1);
        assert_eq!(hoisted[0].key, "kept");
    }

    #[test]
    fn test_single_leaf_and_blank_key() {
        assert_eq!(required_log_filters(Some(&log("a", "1"))).len(), 1);
        assert!(required_log_filters(Some(&log(" ", "1"))).is_empty());
        assert!(required_log_filters(None).is_empty());
    }

    #[test]
    fn test_hints_follow_and_path_only() {
        let expr = TraceFilterExpression::and(vec![
            TraceFilterExpression::Service {
                name: "checkout".into(),
            },
            TraceFilterExpression::and(vec![
                TraceFilterExpression::SpanName { name: "GET /".into() },
                TraceFilterExpression::Service { name: " ".into() },
            ]),
            TraceFilterExpression::or(vec![TraceFilterExpression::Service {
                name: "billing".into(),
            }]),
        ]);
        let hints = collect_filter_hints(Some(&expr));
        assert_eq!(
            hints.service_names.into_iter().collect::<Vec<_>>(),
            vec!["checkout"]
        );
        assert_eq!(hints.span_names.into_iter().collect::<Vec<_>>(), vec!["GET /"]);
    }

    #[test]
    fn test_or_root_yields_no_hints() {
        let expr = TraceFilterExpression::or(vec![
            TraceFilterExpression::Service { name: "A".into() },
            TraceFilterExpression::attribute(
                AttributeTarget::Span,
                "k",
                "v",
                AttributeOperator::Equals,
            ),
        ]);
        assert_eq!(collect_filter_hints(Some(&expr)), FilterHints::default());
    }

    #[test]
    fn test_unknown_operator_not_hoisted() {
        let expr = TraceFilterExpression::and(vec![
            TraceFilterExpression::attribute(
                AttributeTarget::Log,
                "a",
                "1",
                AttributeOperator::Unknown,
            ),
            log("b", "2"),
        ]);
        let hoisted = required_log_filters(Some(&expr));
        assert_eq!(hoisted.len(), 1);
        assert_eq!(hoisted[0].key, "b");
    }

    #[test]
    fn test_pushdown_includes_optional_log_leaves() {
        let expr = TraceFilterExpression::and(vec![
            log("a", "1"),
            TraceFilterExpression::or(vec![log("b", "2"), log("a", "1")]),
        ]);
        let keys: Vec<_> = log_pushdown(Some(&expr))
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);

        let optional_only = TraceFilterExpression::or(vec![log("a", "1")]);
        assert!(log_pushdown(Some(&optional_only)).is_empty());
    }
}
