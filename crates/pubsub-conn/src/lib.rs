//! # Pubsub Connection
//!
//! The transport `chain-core` sits on top of: join/leave named channels,
//! publish opaque bytes, get opaque bytes delivered. Peer discovery, wire
//! framing, and gossip fanout are someone else's problem; this crate only
//! specifies and (for tests and single-process deployments) implements
//! the contract.

pub mod memory;
pub mod ports;

pub use memory::{InMemoryPubSubConn, PubSubHub};
pub use ports::{MessageHandler, PubSubConn, PubSubError};
