//! Database calls and statements

use std::sync::OnceLock;

use super::{Extraction, Extractor, SpanRef};
use crate::domain::model::description::{CallKind, ComponentKind, SpanDescription};
use crate::utils::otlp::keys;

const SHORT_STATEMENT_LEN: usize = 10;

/// Statement spans emitted by the TraceLens SQL instrumentation
pub struct DbStatementExtractor;

impl Extractor for DbStatementExtractor {
    fn name(&self) -> &'static str {
        "db_statement"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        if span.attribute(keys::TRACELENS_KIND).is_empty() {
            return None;
        }
        Some(Extraction::direct(SpanDescription::new(
            "mssql",
            span.attribute(keys::DB_STATEMENT),
            "",
            ComponentKind::DatabaseStatement,
            CallKind::Sync,
        )))
    }
}

/// Database clients, with Azure CosmosDB recognized by URL
pub struct DbExtractor;

impl Extractor for DbExtractor {
    fn name(&self) -> &'static str {
        "db"
    }

    fn extract(&self, span: SpanRef<'_>) -> Option<Extraction> {
        if span.attribute(keys::HTTP_URL).contains("documents.azure.com") {
            return Some(Extraction::direct(
                SpanDescription::new("Azure", "CosmosDB", "", ComponentKind::Database, CallKind::Sync)
                    .with_stack("Azure CosmosDB"),
            ));
        }

        let system = span.attribute(keys::DB_SYSTEM);
        if system.is_empty() {
            return None;
        }

        let statement = span.attribute(keys::DB_STATEMENT);
        let name = created_database_name(statement).unwrap_or(span.attribute(keys::DB_NAME));
        let component = if name.is_empty() { system } else { name };

        Some(Extraction::direct(
            SpanDescription::new(
                system,
                component,
                short_statement(statement),
                ComponentKind::Database,
                CallKind::Sync,
            )
            .with_stack(system),
        ))
    }
}

/// Database name from a `CREATE DATABASE <name>;` statement
fn created_database_name(statement: &str) -> Option<&str> {
    static RE_CREATE_DB: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE_CREATE_DB.get_or_init(|| {
        regex::Regex::new(r"(?i)CREATE DATABASE\s+(\w+);").expect("Invalid regex")
    });
    re.captures(statement)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First statement token cut to ten characters; `create` keeps its object type
fn short_statement(statement: &str) -> String {
    let mut parts = statement.split([' ', '\n']);
    let first = parts.next().unwrap_or_default();
    let mut short: String = first.chars().take(SHORT_STATEMENT_LEN).collect();
    if short.to_lowercase() == "create"
        && let Some(next) = parts.next()
    {
        short.push(' ');
        short.push_str(next);
    }
    short
}
