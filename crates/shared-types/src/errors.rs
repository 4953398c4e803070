//! # Chain Error Taxonomy
//!
//! The error variants described in §7 of the chain subsystem design. Router
//! paths (`HandleTrx`/`HandleBlock` and their callees) classify a failure
//! into one of these, log it, and continue — per the propagation policy,
//! a single bad message never aborts the node.

use thiserror::Error;

/// Errors surfaced by the per-group chain subsystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A trx carries a protocol version this node does not implement.
    #[error("trx version mismatch: trx has {trx_version}, node has {node_version}")]
    VersionMismatch {
        /// Version carried by the rejected trx.
        trx_version: u16,
        /// This node's protocol version.
        node_version: u16,
    },

    /// A trx type this node does not recognize.
    #[error("unsupported trx type")]
    UnsupportedMsgType,

    /// A block or sync response from a producer not in the `ProducerPool`.
    #[error("producer {0} is not registered for this group")]
    UnauthorizedProducer(String),

    /// A block whose `prev_block_id` is unknown locally.
    #[error("parent block {0} does not exist locally")]
    ParentNotExist(String),

    /// Signature verification, AES decryption, or asymmetric decryption failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),

    /// The persistence layer (`DbMgr`) returned an error.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// `StartSync` was called while the syncer was already busy.
    #[error("group is syncing, refusing to start another sync")]
    AlreadySyncing,

    /// API-side: the referenced group id is not registered with `GroupMgr`.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// The pubsub transport reported an error joining, leaving, or
    /// publishing on a channel.
    #[error("pubsub error: {0}")]
    PubSubError(String),
}
