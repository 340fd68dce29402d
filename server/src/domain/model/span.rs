//! Spans and log entries as seen by the trace model

use serde::Serialize;

use crate::data::types::SpanKind;

/// Severity of a log entry shown on a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Diagnostics,
    Span,
    Event,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Classify a severity label.
    ///
    /// A body of exactly `exception` is always an error; otherwise the
    /// lowercase label prefix decides and unknown labels are debug.
    pub fn parse(label: &str, body: &str) -> Self {
        if body == "exception" {
            return Self::Error;
        }
        let label = label.to_lowercase();
        const PREFIXES: &[(&str, LogLevel)] = &[
            ("inf", LogLevel::Info),
            ("war", LogLevel::Warning),
            ("err", LogLevel::Error),
            ("deb", LogLevel::Debug),
            ("eve", LogLevel::Event),
            ("diag", LogLevel::Diagnostics),
            ("tag", LogLevel::Span),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| label.starts_with(prefix))
            .map(|(_, level)| *level)
            .unwrap_or(Self::Debug)
    }
}

/// Sort tier for regular logs and events; diagnostics use the others
pub const LOG_SORT_DEFAULT: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: u64,
    pub label: String,
    pub level: LogLevel,
    pub body: String,
    pub attributes: Vec<(String, String)>,
    pub sort_order: u8,
}

impl LogEntry {
    pub fn new(
        time: u64,
        label: impl Into<String>,
        body: impl Into<String>,
        attributes: Vec<(String, String)>,
        sort_order: u8,
    ) -> Self {
        let label = label.into();
        let body = body.into();
        Self {
            time,
            level: LogLevel::parse(&label, &body),
            label,
            body,
            attributes,
            sort_order,
        }
    }

    /// Body with every `{key}` placeholder replaced by its attribute value
    pub fn format(&self) -> String {
        self.attributes
            .iter()
            .fold(self.body.clone(), |body, (key, value)| {
                body.replace(&format!("{{{}}}", key), value)
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub service_name: String,
    pub operation_name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub attributes: Vec<(String, String)>,
    pub logs: Vec<LogEntry>,
    pub kind: SpanKind,
}

impl Span {
    /// Attribute value, empty when missing
    pub fn attribute(&self, key: &str) -> &str {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k == key)
    }

    pub fn duration(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    pub fn has_error(&self) -> bool {
        self.logs.iter().any(|l| l.level == LogLevel::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_prefixes() {
        assert_eq!(LogLevel::parse("Information", "x"), LogLevel::Info);
        assert_eq!(LogLevel::parse("WARN", "x"), LogLevel::Warning);
        assert_eq!(LogLevel::parse("error", "x"), LogLevel::Error);
        assert_eq!(LogLevel::parse("Debug", "x"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("Event", "x"), LogLevel::Event);
        assert_eq!(LogLevel::parse("Diagnostics", "x"), LogLevel::Diagnostics);
        assert_eq!(LogLevel::parse("tag", "x"), LogLevel::Span);
        assert_eq!(LogLevel::parse("", "x"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("trace", "x"), LogLevel::Debug);
    }

    #[test]
    fn test_exception_body_is_error() {
        assert_eq!(LogLevel::parse("Event", "exception"), LogLevel::Error);
        assert_eq!(LogLevel::parse("Event", "Exception"), LogLevel::Event);
    }

    #[test]
    fn test_format_replaces_placeholders() {
        let entry = LogEntry::new(
            0,
            "Information",
            "Order {OrderId} shipped to {City}",
            vec![
                ("OrderId".into(), "42".into()),
                ("City".into(), "Oslo".into()),
                ("Unused".into(), "x".into()),
            ],
            LOG_SORT_DEFAULT,
        );
        assert_eq!(entry.format(), "Order 42 shipped to Oslo");
    }

    #[test]
    fn test_span_has_error() {
        let mut span = Span {
            trace_id: "t".into(),
            span_id: "s".into(),
            parent_span_id: String::new(),
            service_name: "svc".into(),
            operation_name: "op".into(),
            start_time: 10,
            end_time: 5,
            attributes: vec![("a".into(), "1".into())],
            logs: vec![LogEntry::new(0, "Info", "fine", vec![], LOG_SORT_DEFAULT)],
            kind: SpanKind::Internal,
        };
        assert!(!span.has_error());
        assert_eq!(span.duration(), 0);
        assert_eq!(span.attribute("a"), "1");
        assert_eq!(span.attribute("missing"), "");

        span.logs
            .push(LogEntry::new(1, "Error", "boom", vec![], LOG_SORT_DEFAULT));
        assert!(span.has_error());
    }
}
