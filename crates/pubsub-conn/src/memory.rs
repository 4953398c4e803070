//! In-memory `PubSubConn` adapter.
//!
//! Several `InMemoryPubSubConn` handles sharing one [`PubSubHub`] behave
//! like several nodes on the same gossip topic: a publish from any handle
//! is delivered to every handle (including the publisher) currently
//! joined to that channel, matching the at-least-once, echo-including
//! delivery the real transport exhibits (`Chain::handle_trx` explicitly
//! drops its own `ReqBlockForward`/`ReqBlockBackward` echo for exactly
//! this reason).

use crate::ports::{MessageHandler, PubSubConn, PubSubError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

type SubscriberId = u64;

/// Shared routing table for a set of `InMemoryPubSubConn` handles.
#[derive(Default)]
pub struct PubSubHub {
    channels: RwLock<HashMap<String, Vec<(SubscriberId, MessageHandler)>>>,
    next_id: AtomicU64,
}

impl PubSubHub {
    /// Create a new, empty hub.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn allocate_id(&self) -> SubscriberId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// One node's connection to a [`PubSubHub`].
pub struct InMemoryPubSubConn {
    hub: Arc<PubSubHub>,
    joined: RwLock<HashMap<String, SubscriberId>>,
}

impl InMemoryPubSubConn {
    /// Create a connection bound to `hub`.
    #[must_use]
    pub fn new(hub: Arc<PubSubHub>) -> Self {
        Self {
            hub,
            joined: RwLock::new(HashMap::new()),
        }
    }

    /// Create a connection on a fresh, unshared hub (single-node tests).
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(PubSubHub::new())
    }
}

#[async_trait]
impl PubSubConn for InMemoryPubSubConn {
    async fn join_channel(
        &self,
        channel_id: &str,
        handler: MessageHandler,
    ) -> Result<(), PubSubError> {
        let previous = self
            .joined
            .read()
            .map_err(|_| PubSubError::Transport("connection lock poisoned".into()))?
            .get(channel_id)
            .copied();

        let id = self.hub.allocate_id();
        {
            let mut channels = self
                .hub
                .channels
                .write()
                .map_err(|_| PubSubError::Transport("hub lock poisoned".into()))?;
            if let Some(previous_id) = previous {
                if let Some(subs) = channels.get_mut(channel_id) {
                    subs.retain(|(sub_id, _)| *sub_id != previous_id);
                }
            }
            channels
                .entry(channel_id.to_string())
                .or_default()
                .push((id, handler));
        }
        let mut joined = self
            .joined
            .write()
            .map_err(|_| PubSubError::Transport("connection lock poisoned".into()))?;
        joined.insert(channel_id.to_string(), id);
        debug!(channel_id, "joined channel");
        Ok(())
    }

    async fn leave_channel(&self, channel_id: &str) -> Result<(), PubSubError> {
        let Some(id) = self
            .joined
            .write()
            .map_err(|_| PubSubError::Transport("connection lock poisoned".into()))?
            .remove(channel_id)
        else {
            return Ok(());
        };

        if let Ok(mut channels) = self.hub.channels.write() {
            if let Some(subs) = channels.get_mut(channel_id) {
                subs.retain(|(sub_id, _)| *sub_id != id);
                if subs.is_empty() {
                    channels.remove(channel_id);
                }
            }
        }
        debug!(channel_id, "left channel");
        Ok(())
    }

    async fn publish(&self, channel_id: &str, data: Vec<u8>) -> Result<(), PubSubError> {
        if !self.is_joined(channel_id) {
            return Err(PubSubError::NotJoined(channel_id.to_string()));
        }

        let subscribers: Vec<MessageHandler> = {
            let channels = self
                .hub
                .channels
                .read()
                .map_err(|_| PubSubError::Transport("hub lock poisoned".into()))?;
            channels
                .get(channel_id)
                .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        for handler in subscribers {
            handler(data.clone());
        }
        Ok(())
    }

    fn is_joined(&self, channel_id: &str) -> bool {
        self.joined
            .read()
            .map(|j| j.contains_key(channel_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_handler() -> (MessageHandler, Arc<Mutex<Vec<Vec<u8>>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let handler: MessageHandler = Arc::new(move |data| sink.lock().unwrap().push(data));
        (handler, received)
    }

    #[tokio::test]
    async fn publish_delivers_to_self() {
        let conn = InMemoryPubSubConn::standalone();
        let (handler, received) = collecting_handler();
        conn.join_channel("c1", handler).await.unwrap();

        conn.publish("c1", b"hello".to_vec()).await.unwrap();

        assert_eq!(received.lock().unwrap().as_slice(), [b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn publish_delivers_across_connections_sharing_a_hub() {
        let hub = PubSubHub::new();
        let a = InMemoryPubSubConn::new(hub.clone());
        let b = InMemoryPubSubConn::new(hub.clone());

        let (handler_a, received_a) = collecting_handler();
        let (handler_b, received_b) = collecting_handler();
        a.join_channel("c1", handler_a).await.unwrap();
        b.join_channel("c1", handler_b).await.unwrap();

        a.publish("c1", b"msg".to_vec()).await.unwrap();

        assert_eq!(received_a.lock().unwrap().len(), 1);
        assert_eq!(received_b.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_without_join_fails() {
        let conn = InMemoryPubSubConn::standalone();
        let result = conn.publish("c1", b"x".to_vec()).await;
        assert!(matches!(result, Err(PubSubError::NotJoined(_))));
    }

    #[tokio::test]
    async fn leave_channel_stops_delivery() {
        let conn = InMemoryPubSubConn::standalone();
        let (handler, received) = collecting_handler();
        conn.join_channel("c1", handler).await.unwrap();
        conn.leave_channel("c1").await.unwrap();

        assert!(!conn.is_joined("c1"));
        let result = conn.publish("c1", b"x".to_vec()).await;
        assert!(matches!(result, Err(PubSubError::NotJoined(_))));
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn leave_channel_not_joined_is_a_noop() {
        let conn = InMemoryPubSubConn::standalone();
        assert!(conn.leave_channel("never-joined").await.is_ok());
    }

    #[tokio::test]
    async fn rejoin_replaces_handler() {
        let conn = InMemoryPubSubConn::standalone();
        let (handler1, received1) = collecting_handler();
        let (handler2, received2) = collecting_handler();

        conn.join_channel("c1", handler1).await.unwrap();
        conn.join_channel("c1", handler2).await.unwrap();
        conn.publish("c1", b"x".to_vec()).await.unwrap();

        assert!(received1.lock().unwrap().is_empty());
        assert_eq!(received2.lock().unwrap().len(), 1);
    }
}
