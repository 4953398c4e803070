//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{ChainEvent, EventFilter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("event bus closed")]
    Closed,
}

/// Trait for subscribing to events from the bus.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to events matching a filter.
    fn subscribe(&self, filter: EventFilter) -> Subscription;
}

/// A subscription handle for receiving events.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    receiver: broadcast::Receiver<ChainEvent>,
    filter: EventFilter,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    topic_key: String,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<ChainEvent>,
        filter: EventFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            topic_key,
        }
    }

    /// Receive the next event that matches the filter.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "subscriber lagged, some events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive the next event without blocking.
    pub fn try_recv(&mut self) -> Result<Option<ChainEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.topic_key) else {
            debug!(topic = %self.topic_key, "subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.topic_key);
        }
        debug!(topic = %self.topic_key, "subscription dropped");
    }
}

/// A stream wrapper for subscriptions, for use with stream combinators.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        self.subscription.filter()
    }
}

impl Stream for EventStream {
    type Item = ChainEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(event)) => Poll::Ready(Some(event)),
            Ok(None) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::ChainEventBus;
    use crate::EventPublisher;
    use std::time::Duration;
    use tokio::time::timeout;

    fn joined(group_id: &str) -> ChainEvent {
        ChainEvent::GroupJoined {
            group_id: group_id.into(),
        }
    }

    #[tokio::test]
    async fn subscription_recv() {
        let bus = ChainEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.publish(joined("g1")).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert!(matches!(received, ChainEvent::GroupJoined { .. }));
    }

    #[tokio::test]
    async fn subscription_filter_by_topic() {
        let bus = ChainEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Sync]));

        bus.publish(joined("g1")).await;
        bus.publish(ChainEvent::SyncStarted {
            group_id: "g1".into(),
        })
        .await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert!(matches!(received, ChainEvent::SyncStarted { .. }));
    }

    #[tokio::test]
    async fn subscription_drop_cleanup() {
        let bus = ChainEventBus::new();

        {
            let _sub1 = bus.subscribe(EventFilter::all());
            let _sub2 = bus.subscribe(EventFilter::all());
            assert_eq!(bus.subscriber_count(), 2);
        }

        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn try_recv_empty() {
        let bus = ChainEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        let result = sub.try_recv();
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn try_recv_event() {
        let bus = ChainEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.publish(joined("g1")).await;

        let result = sub.try_recv();
        assert!(matches!(result, Ok(Some(ChainEvent::GroupJoined { .. }))));
    }

    #[test]
    fn event_stream_filter() {
        let bus = ChainEventBus::new();
        let filter = EventFilter::topics(vec![EventTopic::Sync]);
        let stream = bus.event_stream(filter);

        assert_eq!(stream.filter().topics.len(), 1);
        assert_eq!(stream.filter().topics[0], EventTopic::Sync);
    }
}
