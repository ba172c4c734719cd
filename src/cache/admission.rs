//! In-memory set of admissible ticket ids.

use crate::protocol::models::{ticket_id, Record};
use std::collections::HashSet;

/// Set of ticket ids known to be valid for this event.
///
/// Within a process run the set only grows through [`merge`](Self::merge);
/// [`rebuild`](Self::rebuild) is reserved for the initial full sync.
#[derive(Debug, Default, Clone)]
pub struct AdmissionCache {
    known_ids: HashSet<String>,
}

impl AdmissionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the ticket ids present in `records`.
    ///
    /// Records without a usable `relationships.ticket.id` are skipped.
    pub fn extract_ids<'a, I>(records: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .filter_map(ticket_id)
            .map(String::from)
            .collect()
    }

    /// Replace the known ids with those found in `records`.
    pub fn rebuild<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a Record>,
    {
        self.known_ids = Self::extract_ids(records);
    }

    /// Add the ids found in `records`, returning how many were new.
    pub fn merge<'a, I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let before = self.known_ids.len();
        self.known_ids.extend(Self::extract_ids(records));
        self.known_ids.len() - before
    }

    /// Whether `id` is a known ticket.
    pub fn contains(&self, id: &str) -> bool {
        self.known_ids.contains(id)
    }

    /// Number of known ids.
    pub fn len(&self) -> usize {
        self.known_ids.len()
    }

    /// Whether no ids are known.
    pub fn is_empty(&self) -> bool {
        self.known_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> Record {
        json!({"id": format!("checkin-{}", id), "relationships": {"ticket": {"id": id}}})
    }

    #[test]
    fn test_extract_skips_records_without_ticket() {
        let records = vec![
            record("T1"),
            json!({"relationships": {"ticket": null}}),
            json!({"relationships": {"order": {"id": "O1"}}}),
            json!(42),
            record("T2"),
        ];

        let ids = AdmissionCache::extract_ids(&records);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("T1"));
        assert!(ids.contains("T2"));
        assert!(!ids.contains("O1"));
    }

    #[test]
    fn test_extract_collapses_duplicates() {
        let records = vec![record("T1"), record("T1"), record("T1")];
        let ids = AdmissionCache::extract_ids(&records);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_rebuild_replaces() {
        let mut cache = AdmissionCache::new();
        cache.rebuild(&vec![record("A"), record("B")]);
        cache.rebuild(&vec![record("C")]);

        assert_eq!(cache.len(), 1);
        assert!(cache.contains("C"));
        assert!(!cache.contains("A"));
    }

    #[test]
    fn test_rebuild_then_merge_is_idempotent() {
        let records = vec![record("A"), record("B"), json!({}), record("A")];
        let mut cache = AdmissionCache::new();
        cache.rebuild(&records);
        let snapshot = cache.known_ids.clone();

        let added = cache.merge(&records);
        assert_eq!(added, 0);
        assert_eq!(cache.known_ids, snapshot);
    }

    #[test]
    fn test_merge_is_monotonic() {
        let mut cache = AdmissionCache::new();
        cache.rebuild(&vec![record("A"), record("B")]);

        assert_eq!(cache.merge(&Vec::<Record>::new()), 0);
        assert_eq!(cache.merge(&vec![json!({"broken": true})]), 0);
        assert_eq!(cache.merge(&vec![record("C"), record("A")]), 1);

        for id in ["A", "B", "C"] {
            assert!(cache.contains(id));
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_empty_cache() {
        let cache = AdmissionCache::new();
        assert!(cache.is_empty());
        assert!(!cache.contains(""));
    }
}
