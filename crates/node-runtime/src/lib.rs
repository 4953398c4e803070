//! # Node Runtime
//!
//! Wires the per-group chain subsystem ([`chain_core`]) to a node's
//! storage, transport, and key-management adapters, and exposes the
//! resulting [`Node`] so integration tests and the `main` binary share
//! one startup path.

pub mod adapters;
pub mod node;

pub use node::{Node, NodeError};
