//! Trace filter expressions
//!
//! JSON form is internally tagged:
//!
//! ```json
//! {"type": "composite", "operator": "and", "expressions": [
//!     {"type": "service", "name": "checkout"},
//!     {"type": "attribute", "key": "http.route", "value": "/cart", "operator": "equals"}
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted search request body
pub const MAX_FILTER_BYTES: usize = 64 * 1024;
/// Deepest accepted expression nesting (a single leaf is depth 1)
pub const MAX_FILTER_DEPTH: usize = 16;
/// Most expression nodes in one filter
pub const MAX_FILTER_NODES: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeOperator {
    /// Exists when the value is empty, otherwise Equals
    #[default]
    Unspecified,
    Equals,
    Exists,
    /// Unrecognized operator; the leaf never matches
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeTarget {
    #[default]
    Span,
    Log,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOperator {
    #[default]
    And,
    Or,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub operator: AttributeOperator,
    #[serde(default)]
    pub target: AttributeTarget,
}

impl AttributeFilter {
    /// Operator after resolving `Unspecified`
    pub fn effective_operator(&self) -> AttributeOperator {
        match self.operator {
            AttributeOperator::Unspecified if self.value.is_empty() => AttributeOperator::Exists,
            AttributeOperator::Unspecified => AttributeOperator::Equals,
            op => op,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeFilter {
    #[serde(default)]
    pub operator: CompositeOperator,
    #[serde(default)]
    pub expressions: Vec<TraceFilterExpression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceFilterExpression {
    Service { name: String },
    SpanName { name: String },
    Attribute(AttributeFilter),
    Composite(CompositeFilter),
}

impl TraceFilterExpression {
    pub fn and(expressions: Vec<TraceFilterExpression>) -> Self {
        Self::Composite(CompositeFilter {
            operator: CompositeOperator::And,
            expressions,
        })
    }

    pub fn or(expressions: Vec<TraceFilterExpression>) -> Self {
        Self::Composite(CompositeFilter {
            operator: CompositeOperator::Or,
            expressions,
        })
    }

    pub fn attribute(
        target: AttributeTarget,
        key: &str,
        value: &str,
        operator: AttributeOperator,
    ) -> Self {
        Self::Attribute(AttributeFilter {
            key: key.to_string(),
            value: value.to_string(),
            operator,
            target,
        })
    }

    /// Nesting depth and node count, walked without recursion
    pub fn shape(&self) -> (usize, usize) {
        let mut depth = 0;
        let mut nodes = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((expr, level)) = stack.pop() {
            nodes += 1;
            depth = depth.max(level);
            if let Self::Composite(composite) = expr {
                stack.extend(composite.expressions.iter().map(|e| (e, level + 1)));
            }
        }
        (depth, nodes)
    }

    /// Reject filters beyond the depth and node limits
    pub fn check_limits(&self) -> Result<(), FilterParseError> {
        let (depth, nodes) = self.shape();
        if depth > MAX_FILTER_DEPTH {
            return Err(FilterParseError::TooDeep {
                depth,
                max: MAX_FILTER_DEPTH,
            });
        }
        if nodes > MAX_FILTER_NODES {
            return Err(FilterParseError::TooManyNodes {
                nodes,
                max: MAX_FILTER_NODES,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FilterParseError {
    #[error("Filter body is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Filter nesting depth {depth} exceeds {max}")]
    TooDeep { depth: usize, max: usize },

    #[error("Filter has {nodes} expressions, limit is {max}")]
    TooManyNodes { nodes: usize, max: usize },

    #[error("Invalid filter: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse a JSON document, enforcing the size limit before and the shape
/// limits after deserialization
pub fn parse_limited<T, F>(body: &str, filter_of: F) -> Result<T, FilterParseError>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(&T) -> Option<&TraceFilterExpression>,
{
    if body.len() > MAX_FILTER_BYTES {
        return Err(FilterParseError::TooLarge {
            size: body.len(),
            max: MAX_FILTER_BYTES,
        });
    }
    let value: T = serde_json::from_str(body)?;
    if let Some(filter) = filter_of(&value) {
        filter.check_limits()?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged() {
        let json = r#"{"type":"composite","operator":"or","expressions":[
            {"type":"service","name":"checkout"},
            {"type":"span_name","name":"GET /"},
            {"type":"attribute","key":"http.route","value":"/cart","operator":"equals","target":"span"}
        ]}"#;
        let expr: TraceFilterExpression = serde_json::from_str(json).unwrap();
        let TraceFilterExpression::Composite(c) = &expr else {
            panic!("expected composite");
        };
        assert_eq!(c.operator, CompositeOperator::Or);
        assert_eq!(c.expressions.len(), 3);
        assert_eq!(
            c.expressions[2],
            TraceFilterExpression::attribute(
                AttributeTarget::Span,
                "http.route",
                "/cart",
                AttributeOperator::Equals
            )
        );
    }

    #[test]
    fn test_attribute_defaults() {
        let expr: TraceFilterExpression =
            serde_json::from_str(r#"{"type":"attribute","key":"user.id"}"#).unwrap();
        let TraceFilterExpression::Attribute(a) = expr else {
            panic!("expected attribute");
        };
        assert_eq!(a.target, AttributeTarget::Span);
        assert_eq!(a.operator, AttributeOperator::Unspecified);
        assert_eq!(a.effective_operator(), AttributeOperator::Exists);

        let with_value = AttributeFilter {
            value: "1".into(),
            ..a
        };
        assert_eq!(with_value.effective_operator(), AttributeOperator::Equals);
    }

    #[test]
    fn test_unknown_enum_values_deserialize() {
        let json = r#"{"type":"composite","operator":"xor","expressions":[
            {"type":"attribute","key":"k","value":"v","operator":"contains","target":"metric"}
        ]}"#;
        let expr: TraceFilterExpression = serde_json::from_str(json).unwrap();
        let TraceFilterExpression::Composite(c) = &expr else {
            panic!("expected composite");
        };
        assert_eq!(c.operator, CompositeOperator::Unknown);
        let TraceFilterExpression::Attribute(a) = &c.expressions[0] else {
            panic!("expected attribute");
        };
        assert_eq!(a.operator, AttributeOperator::Unknown);
        assert_eq!(a.effective_operator(), AttributeOperator::Unknown);
        assert_eq!(a.target, AttributeTarget::Unknown);
    }

    #[test]
    fn test_shape() {
        let expr = TraceFilterExpression::and(vec![
            TraceFilterExpression::Service { name: "a".into() },
            TraceFilterExpression::or(vec![TraceFilterExpression::SpanName { name: "b".into() }]),
        ]);
        assert_eq!(expr.shape(), (3, 4));
    }

    #[test]
    fn test_too_deep_rejected() {
        let mut expr = TraceFilterExpression::Service { name: "x".into() };
        for _ in 0..MAX_FILTER_DEPTH {
            expr = TraceFilterExpression::and(vec![expr]);
        }
        assert!(matches!(
            expr.check_limits(),
            Err(FilterParseError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_parse_limited() {
        let ok: TraceFilterExpression =
            parse_limited(r#"{"type":"service","name":"a"}"#, |f| Some(f)).unwrap();
        assert_eq!(ok, TraceFilterExpression::Service { name: "a".into() });

        let big = format!(r#"{{"type":"service","name":"{}"}}"#, "x".repeat(MAX_FILTER_BYTES));
        assert!(matches!(
            parse_limited::<TraceFilterExpression, _>(&big, |f| Some(f)),
            Err(FilterParseError::TooLarge { .. })
        ));
        assert!(matches!(
            parse_limited::<TraceFilterExpression, _>("{", |f| Some(f)),
            Err(FilterParseError::Invalid(_))
        ));
        assert!(matches!(
            parse_limited::<TraceFilterExpression, _>(r#"{"type":"bogus"}"#, |f| Some(f)),
            Err(FilterParseError::Invalid(_))
        ));
    }
}
