//! # Chain Core
//!
//! The per-group chain subsystem of a content-publishing node: owns one
//! group's channels, trx managers, producer pool, consensus roles, and
//! block sync, and exposes the facade (`Group`/`GroupMgr`) an API layer
//! programs against.
//!
//! ## Layout
//!
//! - [`group_mgr`] / [`group`] — the process-wide registry and per-group
//!   facade.
//! - [`chain`] — owns one group's channels, routing, and lifecycle.
//! - [`consensus`] — `UserRole` (write path, block application) and
//!   `ProducerRole` (block minting, sync-request answering).
//! - [`syncer`] — the forward/backward catch-up state machine.
//! - [`trx_mgr`] — signs, encrypts, and publishes outbound trx; decodes
//!   and hands off inbound wire messages.
//! - [`chain_handle`] / [`inbound`] — the two callback traits that let
//!   `syncer`/`consensus`/`trx_mgr` call back into `chain` without
//!   owning it.
//! - [`producer_pool`], [`scheduled_task`], [`wire`], [`errors`] —
//!   supporting data structures.
//! - [`seed`] — join-group invitation signature verification.
//!
//! This crate never opens a socket or touches a disk directly: transport
//! is [`pubsub_conn::PubSubConn`], persistence is [`db_mgr::DbMgr`], and
//! key material is [`keystore::Keystore`] — all injected.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod chain;
pub mod chain_handle;
pub mod consensus;
pub mod errors;
pub mod group;
pub mod group_mgr;
pub mod inbound;
pub mod producer_pool;
pub mod scheduled_task;
pub mod seed;
pub mod syncer;
pub mod trx_mgr;
pub mod wire;

pub use chain::Chain;
pub use chain_handle::{ChainHandle, SyncOutcome};
pub use consensus::{ProducerRole, Role, UserRole};
pub use errors::{ConsensusError, GroupError, SyncerError, TrxMgrError};
pub use group::Group;
pub use group_mgr::GroupMgr;
pub use inbound::ChainInbound;
pub use producer_pool::ProducerPool;
pub use seed::verify_seed;
pub use syncer::Syncer;
pub use trx_mgr::TrxMgr;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
