//! Wire envelope published/received on a group's pubsub channels.
//!
//! The original implementation protobuf-encodes a single message type per
//! channel and distinguishes trx vs. block by a oneof field. This port
//! uses `bincode` (already a `shared-types` dependency) over a tagged
//! enum instead (§10.5).

use serde::{Deserialize, Serialize};
use shared_types::{Block, Trx};

/// Everything a `TrxMgr` publishes or receives on a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainMessage {
    /// A transaction (any `TrxType`).
    Trx(Trx),
    /// A block, broadcast directly by its producer.
    Block(Block),
}

/// Errors decoding/encoding a [`ChainMessage`].
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// `bincode` failed to serialize the message.
    #[error("failed to encode chain message: {0}")]
    Encode(String),
    /// `bincode` failed to deserialize the bytes.
    #[error("failed to decode chain message: {0}")]
    Decode(String),
}

impl ChainMessage {
    /// Encode to the bytes published on a pubsub channel.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serialize(self).map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Decode bytes received off a pubsub channel.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Block, TrxType};

    #[test]
    fn trx_roundtrips() {
        let trx = Trx {
            trx_id: "t1".into(),
            group_id: "g1".into(),
            sender_pubkey: "p1".into(),
            trx_type: TrxType::Post,
            version: 1,
            data: vec![1, 2, 3],
            signature: vec![4, 5, 6],
            timestamp: 42,
        };
        let msg = ChainMessage::Trx(trx);
        let bytes = msg.encode().unwrap();
        let decoded = ChainMessage::decode(&bytes).unwrap();
        assert!(matches!(decoded, ChainMessage::Trx(t) if t.trx_id == "t1"));
    }

    #[test]
    fn block_roundtrips() {
        let block = Block {
            block_id: "b1".into(),
            producer_pubkey: "p1".into(),
            prev_block_id: "b0".into(),
            trxs: vec![],
            producer_sign: vec![7, 8],
        };
        let msg = ChainMessage::Block(block);
        let bytes = msg.encode().unwrap();
        let decoded = ChainMessage::decode(&bytes).unwrap();
        assert!(matches!(decoded, ChainMessage::Block(b) if b.block_id == "b1"));
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(ChainMessage::decode(&[0xff, 0x00, 0x01]).is_err());
    }
}
