//! Top-level node: loads persisted options, builds the chain-core
//! collaborators, and owns the [`GroupMgr`] for the process lifetime.

use crate::adapters::{self, Ports};
use chain_core::GroupMgr;
use node_options::{NodeOptionsError, NodeOptionsHandle};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Protocol version this build speaks; trx whose `version` field doesn't
/// match are rejected by `Chain::route_trx`.
pub const NODE_VERSION: u16 = 1;

/// Errors raised while starting a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The persisted config couldn't be loaded.
    #[error("failed to load node options: {0}")]
    Options(#[from] NodeOptionsError),

    /// Reloading persisted groups at startup failed.
    #[error("failed to reload groups: {0}")]
    GroupReload(#[from] chain_core::GroupError),
}

/// A running node: its persisted options and its group registry.
pub struct Node {
    /// Persisted, mutation-serializing node configuration.
    pub options: NodeOptionsHandle,
    /// Every group this node participates in.
    pub groups: Arc<GroupMgr>,
}

impl Node {
    /// Load `<config_dir>/<peername>_options.toml`, build fresh
    /// in-memory ports, and reload any persisted groups.
    pub async fn start(config_dir: &Path, peername: &str) -> Result<Self, NodeError> {
        Self::start_with_ports(config_dir, peername, adapters::in_memory_ports()).await
    }

    /// Same as [`Node::start`], but against caller-supplied ports (e.g. a
    /// `PubSubHub` shared with other nodes in the same process).
    pub async fn start_with_ports(config_dir: &Path, peername: &str, ports: Ports) -> Result<Self, NodeError> {
        let options = NodeOptionsHandle::load(config_dir, peername)?;
        info!(peername, network = %options.get().network_name, "node options loaded");

        let groups = Arc::new(GroupMgr::new(NODE_VERSION, ports.db, ports.pubsub, ports.keystore));
        groups.load().await?;

        Ok(Self { options, groups })
    }
}
