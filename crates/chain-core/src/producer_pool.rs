//! The in-memory set of currently-authorized producers for a group (§3).

use shared_types::ProducerItem;
use std::collections::HashMap;

/// Snapshot of a group's registered producers, keyed by signing pubkey.
///
/// Rebuilt wholesale from `DbMgr` on `Chain::update_producer_list`; never
/// mutated incrementally, per the "read-only between updates" invariant.
#[derive(Debug, Clone, Default)]
pub struct ProducerPool {
    producers: HashMap<String, ProducerItem>,
}

impl ProducerPool {
    /// An empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pool's contents with `items`.
    pub fn rebuild(&mut self, items: Vec<ProducerItem>) {
        self.producers = items
            .into_iter()
            .map(|item| (item.producer_pubkey.clone(), item))
            .collect();
    }

    /// Whether `pubkey` is a currently-registered producer.
    #[must_use]
    pub fn contains(&self, pubkey: &str) -> bool {
        self.producers.contains_key(pubkey)
    }

    /// Look up a producer's registration record.
    #[must_use]
    pub fn get(&self, pubkey: &str) -> Option<&ProducerItem> {
        self.producers.get(pubkey)
    }

    /// All registered producer pubkeys.
    pub fn pubkeys(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    /// Number of registered producers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Whether the pool has no registered producers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}
