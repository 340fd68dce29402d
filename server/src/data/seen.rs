//! Bounded "already indexed" tracking for ingestion
//!
//! The tag and span-name search indexes have set semantics, so writing an
//! entry twice is harmless. This cache only suppresses repeated writes of
//! hot entries; once it evicts an entry the next occurrence is written again.

use moka::sync::Cache;

use crate::data::types::SpanNameRow;

pub struct SeenIndex {
    attributes: Cache<(String, String), ()>,
    span_names: Cache<SpanNameRow, ()>,
}

impl SeenIndex {
    pub fn new(max_entries: u64) -> Self {
        let initial = (max_entries as usize / 4).min(10_000);
        Self {
            attributes: Cache::builder()
                .max_capacity(max_entries)
                .initial_capacity(initial)
                .build(),
            span_names: Cache::builder()
                .max_capacity(max_entries)
                .initial_capacity(initial)
                .build(),
        }
    }

    /// Keep only attributes not seen before and mark them as seen
    pub fn unseen_attributes(
        &self,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<(String, String)> {
        attributes
            .into_iter()
            .filter(|attr| self.attributes.entry(attr.clone()).or_insert(()).is_fresh())
            .collect()
    }

    /// Keep only span names not seen before and mark them as seen
    pub fn unseen_span_names(
        &self,
        names: impl IntoIterator<Item = SpanNameRow>,
    ) -> Vec<SpanNameRow> {
        names
            .into_iter()
            .filter(|name| self.span_names.entry(name.clone()).or_insert(()).is_fresh())
            .collect()
    }

    /// Forget attributes whose index write failed so they are retried later
    pub fn forget_attributes(&self, attributes: &[(String, String)]) {
        for attr in attributes {
            self.attributes.invalidate(attr);
        }
    }

    pub fn forget_span_names(&self, names: &[SpanNameRow]) {
        for name in names {
            self.span_names.invalidate(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_unseen_attributes_dedups_across_calls() {
        let seen = SeenIndex::new(100);
        let first = seen.unseen_attributes(vec![attr("a", "1"), attr("b", "2")]);
        assert_eq!(first.len(), 2);

        let second = seen.unseen_attributes(vec![attr("a", "1"), attr("a", "2")]);
        assert_eq!(second, vec![attr("a", "2")]);
    }

    #[test]
    fn test_unseen_attributes_dedups_within_call() {
        let seen = SeenIndex::new(100);
        let fresh = seen.unseen_attributes(vec![attr("a", "1"), attr("a", "1")]);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_forget_allows_rewrite() {
        let seen = SeenIndex::new(100);
        let fresh = seen.unseen_attributes(vec![attr("a", "1")]);
        seen.forget_attributes(&fresh);
        assert_eq!(seen.unseen_attributes(vec![attr("a", "1")]).len(), 1);
    }

    #[test]
    fn test_unseen_span_names() {
        let seen = SeenIndex::new(100);
        let name = SpanNameRow {
            service_name: "cart".into(),
            name: "GET /cart".into(),
        };
        assert_eq!(seen.unseen_span_names(vec![name.clone()]).len(), 1);
        assert!(seen.unseen_span_names(vec![name.clone()]).is_empty());
        seen.forget_span_names(&[name.clone()]);
        assert_eq!(seen.unseen_span_names(vec![name]).len(), 1);
    }
}
