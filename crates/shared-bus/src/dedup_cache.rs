//! # Trx Dedup Cache
//!
//! `pubsub-conn` delivers at-least-once: the same `Trx` can arrive twice
//! (e.g. after a transport-level retry, or because a node re-joined a
//! channel). The router rejects a trx whose id it has already applied,
//! so a trx replayed from the wire is a no-op rather than a double-apply.
//!
//! Entries are kept for `retention_secs` (keyed off the trx's own
//! `timestamp` field, not wall-clock-at-receipt) and garbage collected
//! periodically to bound memory.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time-bounded cache of seen trx ids.
pub struct TrxDedupCache {
    /// Map of trx id -> timestamp when first seen.
    seen: HashMap<String, i64>,

    /// How long a trx id is remembered, in seconds.
    retention_secs: i64,

    /// Last garbage collection timestamp.
    last_gc: i64,

    /// Garbage collection interval in seconds.
    gc_interval_secs: i64,
}

impl TrxDedupCache {
    /// Default retention window: long enough to outlast any reasonable
    /// republish/retry interval.
    pub const DEFAULT_RETENTION_SECS: i64 = 300;

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL_SECS: i64 = 30;

    /// Create a new dedup cache with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_RETENTION_SECS, Self::DEFAULT_GC_INTERVAL_SECS)
    }

    /// Create a dedup cache with custom settings.
    #[must_use]
    pub fn with_config(retention_secs: i64, gc_interval_secs: i64) -> Self {
        Self {
            seen: HashMap::new(),
            retention_secs,
            last_gc: Self::now(),
            gc_interval_secs,
        }
    }

    /// Returns `true` if `trx_id` had not been seen before and was just
    /// recorded; `false` if it is a duplicate.
    pub fn insert_if_new(&mut self, trx_id: &str, trx_timestamp: i64) -> bool {
        let now = Self::now();
        if now.saturating_sub(self.last_gc) > self.gc_interval_secs {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if self.seen.contains_key(trx_id) {
            return false;
        }
        self.seen.insert(trx_id.to_string(), trx_timestamp);
        true
    }

    /// Check if a trx id has been seen without recording it.
    #[must_use]
    pub fn contains(&self, trx_id: &str) -> bool {
        self.seen.contains_key(trx_id)
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn garbage_collect(&mut self, now: i64) {
        let expiry_threshold = now.saturating_sub(self.retention_secs);
        self.seen.retain(|_, &mut ts| ts > expiry_threshold);
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl Default for TrxDedupCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new() {
        let mut cache = TrxDedupCache::new();
        assert!(cache.insert_if_new("t1", 100));
        assert!(cache.contains("t1"));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut cache = TrxDedupCache::new();
        assert!(cache.insert_if_new("t1", 100));
        assert!(!cache.insert_if_new("t1", 100));
    }

    #[test]
    fn distinct_ids_both_accepted() {
        let mut cache = TrxDedupCache::new();
        assert!(cache.insert_if_new("t1", 100));
        assert!(cache.insert_if_new("t2", 100));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn garbage_collection_evicts_expired_entries() {
        let mut cache = TrxDedupCache::with_config(10, 0);
        let now = TrxDedupCache::now();
        cache.insert_if_new("old", now - 100);
        // Next insert triggers GC since gc_interval_secs is 0.
        cache.insert_if_new("new", now);
        assert!(!cache.contains("old"));
        assert!(cache.contains("new"));
    }

    #[test]
    fn empty_cache_reports_empty() {
        let cache = TrxDedupCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }
}
