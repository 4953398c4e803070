//! `ProducerRole`: block-minting input/output for a group this node
//! produces blocks for (§4.5, §4.6).
//!
//! A producer keeps an in-memory `prev_block_id -> Block` index so
//! `GetBlockForward` can be answered without a database primitive for "the
//! block that extends this one" (no such query exists on [`DbMgr`]; this is
//! an addition of this port, not carried over from any original source). A
//! `GetBlockBackward` request, by contrast, names the missing block's own
//! id and is answered directly from `DbMgr`.
//!
//! Responses are delivered by joining the *requester's* sync channel
//! (`sync_channel_<gid>_<requester_pubkey>`) just long enough to publish,
//! then leaving — `PubSubConn::publish` requires the publisher to be a
//! joined member of the channel it publishes to, so a transient `TrxMgr`
//! is built per response rather than keeping every requester's channel
//! open indefinitely.

use crate::errors::ConsensusError;
use crate::inbound::ChainInbound;
use crate::trx_mgr::TrxMgr;
use db_mgr::DbMgr;
use keystore::Keystore;
use pubsub_conn::PubSubConn;
use shared_crypto::CipherKey;
use shared_types::{Block, ReqBlockResp, Trx, TrxType};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

const SYNC_CHANNEL_PREFIX: &str = "sync_channel_";

/// This node's block-production input/output for one group.
pub struct ProducerRole {
    group_id: String,
    node_version: u16,
    sign_key_name: String,
    sender_pubkey: String,
    cipher_key: CipherKey,
    db: Arc<dyn DbMgr>,
    keystore: Arc<dyn Keystore>,
    pubsub: Arc<dyn PubSubConn>,
    /// Transient per-response `TrxMgr`s never dispatch anything inbound,
    /// so there is nothing for them to call back into `Chain` through.
    inbound: Weak<dyn ChainInbound>,
    pending_trxs: Mutex<Vec<Trx>>,
    blocks_by_prev: Mutex<HashMap<String, Block>>,
}

impl ProducerRole {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        node_version: u16,
        sign_key_name: impl Into<String>,
        sender_pubkey: impl Into<String>,
        cipher_key: CipherKey,
        db: Arc<dyn DbMgr>,
        keystore: Arc<dyn Keystore>,
        pubsub: Arc<dyn PubSubConn>,
        inbound: Weak<dyn ChainInbound>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            node_version,
            sign_key_name: sign_key_name.into(),
            sender_pubkey: sender_pubkey.into(),
            cipher_key,
            db,
            keystore,
            pubsub,
            inbound,
            pending_trxs: Mutex::new(Vec::new()),
            blocks_by_prev: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a trx into the producer's pending pool, ready for inclusion
    /// in the next minted block.
    #[instrument(name = "producer_role", skip(self, trx), fields(group_id = %self.group_id, trx_id = %trx.trx_id))]
    pub async fn add_trx(&self, trx: Trx) -> Result<(), ConsensusError> {
        self.db.add_trx(trx.clone()).await?;
        self.pending_trxs.lock().await.push(trx);
        Ok(())
    }

    /// Drain and return the trx pool, e.g. when minting a new block.
    pub async fn take_pending_trxs(&self) -> Vec<Trx> {
        std::mem::take(&mut *self.pending_trxs.lock().await)
    }

    /// Answer a `REQ_BLOCK_FORWARD`: find the block that extends
    /// `reference_block_id`, if this producer has minted/seen one, and
    /// deliver it to `requester_pubkey`. Silent no-op if none is known yet
    /// (the requester is already at the tip, or another producer will
    /// answer).
    #[instrument(name = "producer_role", skip(self), fields(group_id = %self.group_id, %reference_block_id))]
    pub async fn get_block_forward(
        &self,
        requester_pubkey: &str,
        reference_block_id: &str,
    ) -> Result<(), ConsensusError> {
        let next = self.blocks_by_prev.lock().await.get(reference_block_id).cloned();
        match next {
            Some(block) => self.respond(requester_pubkey, block).await,
            None => Ok(()),
        }
    }

    /// Answer a `REQ_BLOCK_BACKWARD`: `reference_block_id` already names
    /// the missing parent, so this is a direct `DbMgr` lookup.
    #[instrument(name = "producer_role", skip(self), fields(group_id = %self.group_id, %reference_block_id))]
    pub async fn get_block_backward(
        &self,
        requester_pubkey: &str,
        reference_block_id: &str,
    ) -> Result<(), ConsensusError> {
        let block = self.db.get_block(reference_block_id, true, "").await?;
        match block {
            Some(block) => self.respond(requester_pubkey, block).await,
            None => {
                warn!(group_id = %self.group_id, %reference_block_id, "asked for a block we don't have either");
                Ok(())
            }
        }
    }

    /// Persist a newly produced block and index it for future
    /// `GetBlockForward` answers.
    #[instrument(name = "producer_role", skip(self, block), fields(group_id = %self.group_id, block_id = %block.block_id))]
    pub async fn add_produced_block(&self, block: Block) -> Result<(), ConsensusError> {
        self.db.add_block(&self.group_id, block.clone()).await?;
        self.blocks_by_prev
            .lock()
            .await
            .insert(block.prev_block_id.clone(), block);
        Ok(())
    }

    async fn respond(&self, requester_pubkey: &str, block: Block) -> Result<(), ConsensusError> {
        let payload = ReqBlockResp {
            requester_pubkey: requester_pubkey.to_string(),
            block,
        };
        let plaintext = bincode::serialize(&payload)
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))?;

        let channel_id = format!("{SYNC_CHANNEL_PREFIX}{}_{}", self.group_id, requester_pubkey);
        let trx_mgr = TrxMgr::new(
            channel_id,
            self.group_id.clone(),
            self.node_version,
            self.sign_key_name.clone(),
            self.sender_pubkey.clone(),
            self.cipher_key.clone(),
            self.pubsub.clone(),
            self.keystore.clone(),
            self.inbound.clone(),
        );
        trx_mgr
            .join()
            .await
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))?;
        let result = trx_mgr.publish_trx(TrxType::ReqBlockResp, &plaintext).await;
        let _ = trx_mgr.leave().await;
        result
            .map(|_| ())
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use db_mgr::InMemoryDbMgr;
    use keystore::{InMemoryKeystore, KeyPurpose};
    use pubsub_conn::{InMemoryPubSubConn, PubSubHub};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        trx_count: AtomicUsize,
        last_block: StdMutex<Option<Block>>,
    }

    #[async_trait]
    impl ChainInbound for RecordingSink {
        async fn handle_trx(&self, trx: Trx) {
            if trx.trx_type == TrxType::ReqBlockResp {
                self.trx_count.fetch_add(1, Ordering::SeqCst);
            }
        }
        async fn handle_block(&self, block: Block) {
            *self.last_block.lock().unwrap() = Some(block);
        }
    }

    fn sample_block(id: &str, prev: &str) -> Block {
        Block {
            block_id: id.into(),
            producer_pubkey: "producer".into(),
            prev_block_id: prev.into(),
            trxs: vec![],
            producer_sign: vec![],
        }
    }

    fn new_role() -> (ProducerRole, Arc<PubSubHub>, Arc<RecordingSink>) {
        let hub = PubSubHub::new();
        let pubsub: Arc<dyn PubSubConn> = Arc::new(InMemoryPubSubConn::new(hub.clone()));
        let keystore = Arc::new(InMemoryKeystore::new());
        keystore.new_key("g1", KeyPurpose::Sign, "").unwrap();
        let db: Arc<dyn DbMgr> = Arc::new(InMemoryDbMgr::new());
        let sink = Arc::new(RecordingSink {
            trx_count: AtomicUsize::new(0),
            last_block: StdMutex::new(None),
        });
        let sink_dyn: Arc<dyn ChainInbound> = sink.clone();
        let role = ProducerRole::new(
            "g1",
            1,
            "g1",
            "producer-pub",
            CipherKey::generate(),
            db,
            keystore,
            pubsub,
            Arc::downgrade(&sink_dyn),
        );
        (role, hub, sink)
    }

    #[tokio::test]
    async fn get_block_forward_with_unknown_tip_is_a_silent_no_op() {
        let (role, _hub, _sink) = new_role();
        role.get_block_forward("requester-pub", "b0").await.unwrap();
    }

    #[tokio::test]
    async fn get_block_forward_delivers_the_indexed_successor_on_the_requesters_sync_channel() {
        let (role, hub, sink) = new_role();
        role.add_produced_block(sample_block("b1", "b0")).await.unwrap();

        let requester_pubsub: Arc<dyn PubSubConn> = Arc::new(InMemoryPubSubConn::new(hub));
        let requester_channel = "sync_channel_g1_requester-pub";
        requester_pubsub
            .join_channel(requester_channel, Arc::new(|_bytes| {}))
            .await
            .unwrap();

        role.get_block_forward("requester-pub", "b0").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(sink.trx_count.load(Ordering::SeqCst), 0); // sink isn't joined to that channel
        assert!(requester_pubsub.is_joined(requester_channel));
    }

    #[tokio::test]
    async fn get_block_backward_fetches_the_named_block_from_storage() {
        let (role, _hub, _sink) = new_role();
        role.db
            .add_gensis_block("g1", sample_block("b0", ""))
            .await
            .unwrap();
        role.get_block_backward("requester-pub", "b0").await.unwrap();
    }

    #[tokio::test]
    async fn get_block_backward_with_unknown_id_is_a_silent_no_op() {
        let (role, _hub, _sink) = new_role();
        role.get_block_backward("requester-pub", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn add_produced_block_indexes_by_prev_block_id() {
        let (role, _hub, _sink) = new_role();
        role.add_produced_block(sample_block("b1", "b0")).await.unwrap();
        assert_eq!(
            role.blocks_by_prev.lock().await.get("b0").map(|b| b.block_id.clone()),
            Some("b1".to_string())
        );
    }
}
