//! Short-lived memory of codes that were still unknown after a resync.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Negative cache with a fixed TTL.
///
/// A zero TTL disables it: nothing is remembered and every miss resyncs.
/// Entries only ever cause denials, so a stale entry cannot admit anyone.
#[derive(Debug)]
pub struct MissCache {
    ttl: chrono::Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl MissCache {
    /// Create a miss cache remembering codes for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            entries: HashMap::new(),
        }
    }

    /// Whether the cache remembers anything at all.
    pub fn is_enabled(&self) -> bool {
        self.ttl > chrono::Duration::zero()
    }

    /// Remember that `code` was unknown at the current time.
    pub fn record(&mut self, code: &str, clock: &dyn Clock) {
        if !self.is_enabled() {
            return;
        }
        let now = clock.now_utc();
        self.entries.retain(|_, expires| *expires > now);
        let expires = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(code.to_string(), expires);
    }

    /// Whether `code` was recorded and its entry has not expired.
    pub fn is_fresh(&self, code: &str, clock: &dyn Clock) -> bool {
        self.entries
            .get(code)
            .is_some_and(|expires| *expires > clock.now_utc())
    }

    /// Forget `code`.
    pub fn forget(&mut self, code: &str) {
        self.entries.remove(code);
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn clock() -> MockClock {
        MockClock::from_rfc3339("2025-06-01T18:00:00Z")
    }

    #[test]
    fn test_disabled_remembers_nothing() {
        let clock = clock();
        let mut misses = MissCache::new(Duration::ZERO);
        misses.record("T9", &clock);

        assert!(!misses.is_enabled());
        assert!(!misses.is_fresh("T9", &clock));
        assert!(misses.is_empty());
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = clock();
        let mut misses = MissCache::new(Duration::from_secs(10));
        misses.record("T9", &clock);

        assert!(misses.is_fresh("T9", &clock));
        assert!(!misses.is_fresh("T8", &clock));

        clock.advance(chrono::Duration::seconds(9));
        assert!(misses.is_fresh("T9", &clock));

        clock.advance(chrono::Duration::seconds(1));
        assert!(!misses.is_fresh("T9", &clock));
    }

    #[test]
    fn test_expired_entries_are_pruned_on_record() {
        let clock = clock();
        let mut misses = MissCache::new(Duration::from_secs(5));
        misses.record("A", &clock);
        clock.advance(chrono::Duration::seconds(6));
        misses.record("B", &clock);

        assert_eq!(misses.len(), 1);
        assert!(misses.is_fresh("B", &clock));
    }

    #[test]
    fn test_forget() {
        let clock = clock();
        let mut misses = MissCache::new(Duration::from_secs(60));
        misses.record("T9", &clock);
        misses.forget("T9");
        assert!(!misses.is_fresh("T9", &clock));
    }
}
