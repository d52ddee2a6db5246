//! Time-windowed set of recently accepted capture hashes.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Maps content hash to the time it was accepted.
///
/// Expired entries are pruned lazily, before every lookup.
#[derive(Debug, Clone)]
pub struct RecentHashes {
    window: Duration,
    accepted: HashMap<String, DateTime<Utc>>,
}

impl RecentHashes {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            accepted: HashMap::new(),
        }
    }

    /// Returns true when `hash` was accepted within the window ending at `now`.
    pub fn seen_within_window(&mut self, hash: &str, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.accepted.contains_key(hash)
    }

    pub fn record(&mut self, hash: String, now: DateTime<Utc>) {
        self.accepted.insert(hash, now);
    }

    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.accepted
            .retain(|_, accepted_at| now.signed_duration_since(*accepted_at) <= window);
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_seen_inside_window() {
        let now = Utc::now();
        let mut recent = RecentHashes::new(Duration::minutes(8));
        recent.record("abc".to_string(), now);

        assert!(recent.seen_within_window("abc", now + Duration::minutes(7)));
        assert!(!recent.seen_within_window("def", now));
    }

    #[test]
    fn hash_expires_after_window() {
        let now = Utc::now();
        let mut recent = RecentHashes::new(Duration::minutes(8));
        recent.record("abc".to_string(), now);

        assert!(!recent.seen_within_window("abc", now + Duration::minutes(9)));
        assert!(recent.is_empty());
    }

    #[test]
    fn prune_keeps_fresh_entries() {
        let now = Utc::now();
        let mut recent = RecentHashes::new(Duration::seconds(60));
        recent.record("old".to_string(), now - Duration::seconds(120));
        recent.record("new".to_string(), now - Duration::seconds(10));

        recent.prune(now);
        assert_eq!(recent.len(), 1);
        assert!(recent.seen_within_window("new", now));
    }
}
