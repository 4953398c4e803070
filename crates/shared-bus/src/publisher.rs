//! # Chain Event Publisher
//!
//! Defines the publishing side of the chain event bus.

use crate::dedup_cache::TrxDedupCache;
use crate::events::{ChainEvent, EventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
///
/// This is the interface a `Chain` uses to announce state transitions to
/// anything in-process that cares (query layers, `Syncer`s waiting on a
/// sibling group, tests).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// Returns the number of active subscribers that received it.
    async fn publish(&self, event: ChainEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the chain event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics. Scoped to a single node process.
pub struct ChainEventBus {
    sender: broadcast::Sender<ChainEvent>,
    dedup_cache: Arc<RwLock<TrxDedupCache>>,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    events_published: AtomicU64,
    capacity: usize,
}

impl ChainEventBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            dedup_cache: Arc::new(RwLock::new(TrxDedupCache::new())),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}/{:?}", filter.topics, filter.group_ids);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, groups = ?filter.group_ids, "new subscription");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get access to the trx dedup cache shared with the router.
    pub fn dedup_cache(&self) -> Arc<RwLock<TrxDedupCache>> {
        self.dedup_cache.clone()
    }
}

impl Default for ChainEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for ChainEventBus {
    async fn publish(&self, event: ChainEvent) -> usize {
        let topic = event.topic();
        let group_id = event.group_id().to_string();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(topic = ?topic, group_id, receivers = receiver_count, "event published");
                receiver_count
            }
            Err(e) => {
                warn!(topic = ?topic, group_id, error = %e, "event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_no_subscribers() {
        let bus = ChainEventBus::new();
        let event = ChainEvent::GroupJoined {
            group_id: "g1".into(),
        };

        let receivers = bus.publish(event).await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn publish_with_subscriber() {
        let bus = ChainEventBus::new();
        let _sub = bus.subscribe(EventFilter::all());

        let event = ChainEvent::GroupJoined {
            group_id: "g1".into(),
        };
        let receivers = bus.publish(event).await;

        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = ChainEventBus::new();

        let _sub1 = bus.subscribe(EventFilter::all());
        let _sub2 = bus.subscribe(EventFilter::all());
        let _sub3 = bus.subscribe(EventFilter::for_group("g1"));

        let event = ChainEvent::GroupJoined {
            group_id: "g1".into(),
        };
        let receivers = bus.publish(event).await;

        assert_eq!(receivers, 3);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[tokio::test]
    async fn custom_capacity() {
        let bus = ChainEventBus::with_capacity(100);
        assert_eq!(bus.capacity(), 100);
    }

    #[test]
    fn default_bus() {
        let bus = ChainEventBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.events_published(), 0);
    }
}
