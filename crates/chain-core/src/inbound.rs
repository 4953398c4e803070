//! The callback surface [`crate::trx_mgr::TrxMgr`] uses to hand decoded
//! wire messages back up to [`crate::chain::Chain`].
//!
//! `TrxMgr` holds this as a `Weak<dyn ChainInbound>` rather than an `Arc`:
//! `Chain` owns its `TrxMgr`s, so an `Arc` back-reference would be a
//! strong cycle neither side would ever drop (§9).

use async_trait::async_trait;
use shared_types::{Block, Trx};

/// Receives trx/block payloads decoded off the wire by a `TrxMgr`.
#[async_trait]
pub trait ChainInbound: Send + Sync {
    /// Route an inbound transaction through `HandleTrx` (§4.4).
    async fn handle_trx(&self, trx: Trx);

    /// Route an inbound block through `HandleBlock` (§4.4).
    async fn handle_block(&self, block: Block);
}
