//! Outbound port this crate's adapters implement, and the port `chain-core`
//! programs against.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a `PubSubConn` implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PubSubError {
    /// `publish`/`leave_channel` called on a channel this connection never joined.
    #[error("not joined to channel {0}")]
    NotJoined(String),

    /// The underlying transport rejected the operation.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Callback invoked with the raw bytes of an inbound message on a joined
/// channel. Delivery is at-least-once; the caller (`TrxMgr`) is
/// responsible for deduplicating by `TrxId`.
pub type MessageHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Join/leave named channels; publish and deliver opaque byte messages.
///
/// This is the only interface `chain-core` has to the peer-to-peer
/// transport. Framing, peer discovery, and wire compatibility are the
/// concern of whatever implements this port; `chain-core` only needs
/// "join this topic, get bytes, publish bytes".
#[async_trait]
pub trait PubSubConn: Send + Sync {
    /// Join a channel, registering `handler` to be invoked for every
    /// message subsequently delivered on it. Joining an already-joined
    /// channel replaces its handler.
    async fn join_channel(
        &self,
        channel_id: &str,
        handler: MessageHandler,
    ) -> Result<(), PubSubError>;

    /// Leave a channel. A no-op (not an error) if not currently joined,
    /// matching `Chain::leave_channel`'s "leave whichever of the three
    /// are currently joined" semantics.
    async fn leave_channel(&self, channel_id: &str) -> Result<(), PubSubError>;

    /// Publish opaque bytes on a channel.
    ///
    /// # Errors
    ///
    /// Returns `PubSubError::NotJoined` if this connection has not
    /// joined `channel_id`.
    async fn publish(&self, channel_id: &str, data: Vec<u8>) -> Result<(), PubSubError>;

    /// Whether this connection currently has `channel_id` joined.
    fn is_joined(&self, channel_id: &str) -> bool;
}

impl fmt::Debug for dyn PubSubConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<dyn PubSubConn>")
    }
}
