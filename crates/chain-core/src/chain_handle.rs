//! The façade [`crate::syncer::Syncer`] and the consensus roles use to call
//! back into [`crate::chain::Chain`] without owning it.
//!
//! Grounded on the original `ChainMolassesIface`: the minimal set of calls
//! the role/syncer layer needs back from the chain they're attached to.
//! `Syncer`/`ProducerRole`/`UserRole` are generic over `H: ChainHandle`
//! rather than holding a `Chain` directly, resolving the cyclic
//! `Chain ↔ Syncer`/`Chain ↔ Consensus` back-reference without a `Weak`
//! pointer (§9).

use crate::trx_mgr::TrxMgr;
use async_trait::async_trait;
use shared_types::{Block, ChainError};
use std::sync::Arc;

/// What the `Syncer` should do next after a block it requested arrives.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Keep the round going, next requesting the block referenced by this
    /// id (forward: the new tip; backward: the still-missing parent).
    Continue {
        /// The block id to name in the next `REQ_BLOCK_FORWARD`/`BACKWARD`.
        next_reference_block_id: String,
    },
    /// The gap has been closed (backward sync reached a locally known
    /// parent); the round is over.
    Done,
}

/// Non-owning callback surface from Syncer/consensus roles back to Chain.
#[async_trait]
pub trait ChainHandle: Send + Sync {
    /// The group this chain belongs to.
    fn group_id(&self) -> &str;

    /// This node's protocol version, used to reject stale/future trx.
    fn node_version(&self) -> u16;

    /// This node's signing pubkey for the group (identifies "own echo").
    fn user_sign_pubkey(&self) -> &str;

    /// The `TrxMgr` bound to the user channel.
    async fn get_user_trx_mgr(&self) -> Arc<TrxMgr>;

    /// The `TrxMgr` bound to this node's sync channel
    /// (`sync_channel_<gid>_<usersignpubkey>`), always joined (§4.3).
    async fn get_sync_trx_mgr(&self) -> Arc<TrxMgr>;

    /// The `TrxMgr` bound to the producer channel, joining it (and arming
    /// the auto-close timer) on demand for non-producer callers (§4.7).
    async fn get_producer_trx_mgr(&self) -> Arc<TrxMgr>;

    /// Persist new chain height/tip and advance `GroupItem.last_update`.
    async fn upd_chain_info(&self, height: i64, block_id: &str) -> Result<(), ChainError>;

    /// Rebuild the in-memory producer pool from `DbMgr` and reconcile
    /// announcement-match results (§10.5).
    async fn upd_producer_list(&self) -> Result<(), ChainError>;

    /// Build this chain's `Consensus` (producer+user or user-only) and join
    /// the channels that role requires.
    async fn create_consensus(&self) -> Result<(), ChainError>;

    /// True while the syncer is mid-round or has given up this round
    /// (`SyncingForward | SyncingBackward | SyncFailed`). Named for the
    /// historical `IsSyncerReady` predicate it preserves byte-for-byte in
    /// behavior (§9): it answers "busy", not "ready".
    fn is_syncer_busy(&self) -> bool;

    /// Kick off a backward sync to fill the gap before `block`.
    async fn sync_backward(&self, block: Block) -> Result<(), ChainError>;

    /// Persist a block delivered by the `Syncer` through the user role's
    /// `AddBlock`, advance chain height/tip, and report whether the round
    /// should continue (§4.6 `AddBlockSynced`).
    async fn add_synced_block(&self, block: Block) -> Result<SyncOutcome, ChainError>;
}
