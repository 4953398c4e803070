//! `Chain`: owns one group's channels, trx managers, producer pool,
//! consensus roles, and syncer, and routes every inbound trx/block to them
//! (§3, §4.3, §4.4).
//!
//! Implements both [`ChainHandle`] (the callback surface `Syncer`/consensus
//! roles use to call back in) and [`ChainInbound`] (the callback surface
//! `TrxMgr` uses to hand decoded wire messages up). Built with
//! `Arc::new_cyclic` so it can hand a `Weak<Chain>`/`Arc<Chain>` to the
//! components it owns without a strong reference cycle (§9).

use crate::chain_handle::{ChainHandle, SyncOutcome};
use crate::consensus::{ProducerRole, Role, UserRole};
use crate::inbound::ChainInbound;
use crate::producer_pool::ProducerPool;
use crate::scheduled_task::ScheduledTask;
use crate::syncer::{Syncer, SyncerState};
use crate::trx_mgr::TrxMgr;
use async_trait::async_trait;
use db_mgr::DbMgr;
use keystore::Keystore;
use parking_lot::RwLock;
use pubsub_conn::PubSubConn;
use shared_bus::TrxDedupCache;
use shared_crypto::CipherKey;
use shared_types::{
    Block, ChainError, GroupItem, ProducerItem, ReqBlockResp, Trx, TrxType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{instrument, warn};

const USER_CHANNEL_PREFIX: &str = "user_channel_";
const PRODUCER_CHANNEL_PREFIX: &str = "prod_channel_";
const SYNC_CHANNEL_PREFIX: &str = "sync_channel_";

/// How long a non-producer node keeps its on-demand producer-channel join
/// open before auto-leaving (§4.7). Not given an explicit value anywhere
/// in the surface this was ported from; picked to comfortably cover one
/// announce-then-wait-for-match round-trip.
pub const PRODUCER_CHANNEL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// One group's chain: channels, trx managers, producer pool, consensus,
/// and syncer.
pub struct Chain {
    group_id: String,
    node_version: u16,
    user_sign_pubkey: String,
    user_channel_id: String,
    producer_channel_id: String,
    sync_channel_id: String,
    cipher_key: CipherKey,
    group_item: RwLock<GroupItem>,
    db: Arc<dyn DbMgr>,
    pubsub: Arc<dyn PubSubConn>,
    keystore: Arc<dyn Keystore>,
    trx_mgrs: RwLock<HashMap<String, Arc<TrxMgr>>>,
    producer_pool: RwLock<ProducerPool>,
    consensus: RwLock<Option<Role<Chain>>>,
    syncer: RwLock<Option<Arc<Syncer<Chain>>>>,
    /// Set once `create_consensus` finds this node in the producer pool:
    /// the producer channel is permanently joined, and the idle timer
    /// never auto-closes it.
    producer_channel_permanent: AtomicBool,
    producer_channel_timer: ScheduledTask,
    /// Blocks received mid backward-fill, deepest-known-gap-first once
    /// drained. Not part of any original surface in this pack: filling a
    /// gap requires holding blocks whose parent isn't yet persisted,
    /// which `UserRole::add_block`'s parent-must-exist invariant forbids,
    /// so the fill path stages them here instead and connects them with a
    /// direct `DbMgr::add_block` once the gap closes.
    backward_buffer: tokio::sync::Mutex<Vec<Block>>,
    /// The block whose missing parent triggered the in-progress backward
    /// sync, re-applied once the gap closes.
    pending_orphan: tokio::sync::Mutex<Option<Block>>,
    /// Guards against double-applying a trx delivered twice by the
    /// at-least-once pubsub transport (§6).
    dedup: tokio::sync::Mutex<TrxDedupCache>,
    self_handle: Weak<Chain>,
}

impl Chain {
    /// Build a `Chain` for `group_item`. Wires channel ids but does not
    /// join anything; call [`ChainHandle::create_consensus`] to join and
    /// construct the consensus role and syncer (§4.3).
    ///
    /// # Errors
    ///
    /// Returns `ChainError::CryptoFailure` if `group_item.cipher_key` is
    /// not valid hex.
    pub fn new(
        group_item: GroupItem,
        node_version: u16,
        db: Arc<dyn DbMgr>,
        pubsub: Arc<dyn PubSubConn>,
        keystore: Arc<dyn Keystore>,
    ) -> Result<Arc<Self>, ChainError> {
        let cipher_key = CipherKey::from_hex(&group_item.cipher_key)
            .map_err(|e| ChainError::CryptoFailure(e.to_string()))?;
        let group_id = group_item.group_id.clone();
        let user_sign_pubkey = group_item.user_sign_pubkey.clone();

        Ok(Arc::new_cyclic(|weak| Chain {
            user_channel_id: format!("{USER_CHANNEL_PREFIX}{group_id}"),
            producer_channel_id: format!("{PRODUCER_CHANNEL_PREFIX}{group_id}"),
            sync_channel_id: format!("{SYNC_CHANNEL_PREFIX}{group_id}_{user_sign_pubkey}"),
            group_id,
            node_version,
            user_sign_pubkey,
            cipher_key,
            group_item: RwLock::new(group_item),
            db,
            pubsub,
            keystore,
            trx_mgrs: RwLock::new(HashMap::new()),
            producer_pool: RwLock::new(ProducerPool::new()),
            consensus: RwLock::new(None),
            syncer: RwLock::new(None),
            producer_channel_permanent: AtomicBool::new(false),
            producer_channel_timer: ScheduledTask::new(),
            backward_buffer: tokio::sync::Mutex::new(Vec::new()),
            pending_orphan: tokio::sync::Mutex::new(None),
            dedup: tokio::sync::Mutex::new(TrxDedupCache::new()),
            self_handle: weak.clone(),
        }))
    }

    /// Snapshot of the current group record.
    #[must_use]
    pub fn group_item(&self) -> GroupItem {
        self.group_item.read().clone()
    }

    /// Shared handle to this chain's persistence layer, for the read
    /// accessors `Group` exposes directly.
    #[must_use]
    pub fn db(&self) -> Arc<dyn DbMgr> {
        self.db.clone()
    }

    /// Shared handle to this chain's keystore, for `Group::create_grp`'s
    /// owner-registers-first-producer signature.
    #[must_use]
    pub fn keystore(&self) -> Arc<dyn Keystore> {
        self.keystore.clone()
    }

    /// Whether `pubkey` is a currently-registered producer for this chain.
    #[must_use]
    pub fn is_producer(&self, pubkey: &str) -> bool {
        self.producer_pool.read().contains(pubkey)
    }

    /// The consensus role, if `create_consensus` has run.
    #[must_use]
    pub fn consensus(&self) -> Option<Role<Chain>> {
        self.consensus.read().clone()
    }

    /// Leave every channel currently joined (§4.3, `LeaveGrp`).
    pub async fn leave_channel(&self) -> Result<(), ChainError> {
        let channel_ids: Vec<String> = self.trx_mgrs.read().keys().cloned().collect();
        for channel_id in channel_ids {
            let mgr = self.trx_mgrs.write().remove(&channel_id);
            if let Some(mgr) = mgr {
                mgr.leave().await?;
            }
        }
        self.producer_channel_timer.cancel();
        Ok(())
    }

    /// Kick off a forward-catchup round from `top_block`'s own id.
    pub async fn start_initial_sync(&self, top_block: Block) -> Result<(), ChainError> {
        let syncer = self
            .syncer
            .read()
            .clone()
            .ok_or_else(|| ChainError::PersistenceError("syncer not initialized".into()))?;
        syncer.sync_forward(top_block.block_id).await.map_err(Into::into)
    }

    /// Cancel the current sync round, if any.
    pub fn stop_sync(&self) {
        if let Some(syncer) = self.syncer.read().as_ref() {
            syncer.reset();
        }
    }

    async fn ensure_trx_mgr_joined(&self, channel_id: String) -> Result<(), ChainError> {
        if self.trx_mgrs.read().contains_key(&channel_id) {
            return Ok(());
        }
        let mgr = Arc::new(self.build_trx_mgr(channel_id.clone()));
        mgr.join().await?;
        self.trx_mgrs.write().insert(channel_id, mgr);
        Ok(())
    }

    fn build_trx_mgr(&self, channel_id: String) -> TrxMgr {
        let inbound: Weak<dyn ChainInbound> = self.self_handle.clone();
        TrxMgr::new(
            channel_id,
            self.group_id.clone(),
            self.node_version,
            self.group_id.clone(),
            self.user_sign_pubkey.clone(),
            self.cipher_key.clone(),
            self.pubsub.clone(),
            self.keystore.clone(),
            inbound,
        )
    }

    fn rearm_producer_channel_timer(&self) {
        if self.producer_channel_permanent.load(Ordering::SeqCst) {
            return;
        }
        let Some(chain) = self.self_handle.upgrade() else {
            return;
        };
        let channel_id = self.producer_channel_id.clone();
        self.producer_channel_timer.reset(PRODUCER_CHANNEL_IDLE_TIMEOUT, move || {
            tokio::spawn(async move {
                let mgr = chain.trx_mgrs.write().remove(&channel_id);
                if let Some(mgr) = mgr {
                    let _ = mgr.leave().await;
                }
            });
        });
    }

    /// Decrypt `trx.data` under the group's `CipherKey`, then verify that
    /// `trx.signature` is `trx.sender_pubkey`'s signature over a BLAKE3
    /// hash of the recovered plaintext (§4.8: every trx is signed by the
    /// sender's group signing key, and that signature is checked before
    /// any dispatch effect — `TrxMgr::publish_trx` signs the same hash of
    /// the same plaintext before AES-encrypting it).
    fn decrypt_and_verify(&self, trx: &Trx) -> Result<Vec<u8>, ChainError> {
        let plain = self.keystore.aes_decrypt(&self.cipher_key, &trx.data)?;
        let hash = shared_crypto::hashing::blake3_hash(&plain);
        if !self.keystore.verify(&trx.sender_pubkey, &hash, &trx.signature)? {
            return Err(ChainError::CryptoFailure(format!(
                "signature verification failed for trx {}",
                trx.trx_id
            )));
        }
        Ok(plain)
    }

    fn decrypt_utf8(&self, trx: &Trx) -> Result<String, ChainError> {
        let plain = self.decrypt_and_verify(trx)?;
        String::from_utf8(plain).map_err(|e| ChainError::CryptoFailure(e.to_string()))
    }

    fn decrypt_bincode<T: serde::de::DeserializeOwned>(&self, trx: &Trx) -> Result<T, ChainError> {
        let plain = self.decrypt_and_verify(trx)?;
        bincode::deserialize(&plain).map_err(|e| ChainError::CryptoFailure(e.to_string()))
    }

    /// Hand a trx to the producer role's pending pool, a no-op on a node
    /// that isn't a registered producer for this group. Mirrors the
    /// original `producerAddTrx`: AUTH/POST/ANNOUNCE/PRODUCER/SCHEMA trx
    /// are never persisted directly by a plain member on receipt — only
    /// the producer queues them, for inclusion in the next minted block.
    async fn producer_add_trx(&self, trx: Trx) -> Result<(), ChainError> {
        if let Some(producer) = self.consensus.read().clone().as_ref().and_then(Role::producer) {
            producer.add_trx(trx).await?;
        }
        Ok(())
    }

    #[instrument(name = "chain", skip(self, trx), fields(group_id = %self.group_id, trx_type = ?trx.trx_type))]
    async fn route_trx(&self, trx: Trx) -> Result<(), ChainError> {
        if trx.version != self.node_version {
            return Err(ChainError::VersionMismatch {
                trx_version: trx.version,
                node_version: self.node_version,
            });
        }

        if matches!(trx.trx_type, TrxType::ReqBlockForward | TrxType::ReqBlockBackward)
            && trx.sender_pubkey == self.user_sign_pubkey
        {
            return Ok(());
        }

        if !self.dedup.lock().await.insert_if_new(&trx.trx_id, trx.timestamp) {
            return Ok(());
        }

        match trx.trx_type {
            TrxType::Auth | TrxType::Post | TrxType::Announce | TrxType::Producer | TrxType::Schema => {
                self.decrypt_and_verify(&trx)?;
                self.producer_add_trx(trx).await?;
            }
            TrxType::ReqBlockForward => {
                let reference_block_id = self.decrypt_utf8(&trx)?;
                if let Some(producer) = self.consensus.read().clone().as_ref().and_then(Role::producer) {
                    producer.get_block_forward(&trx.sender_pubkey, &reference_block_id).await?;
                }
            }
            TrxType::ReqBlockBackward => {
                let reference_block_id = self.decrypt_utf8(&trx)?;
                if let Some(producer) = self.consensus.read().clone().as_ref().and_then(Role::producer) {
                    producer.get_block_backward(&trx.sender_pubkey, &reference_block_id).await?;
                }
            }
            TrxType::ReqBlockResp => {
                let resp: ReqBlockResp = self.decrypt_bincode(&trx)?;
                if resp.requester_pubkey != self.user_sign_pubkey {
                    return Ok(());
                }
                if !self.producer_pool.read().contains(&resp.block.producer_pubkey) {
                    warn!(group_id = %self.group_id, producer = %resp.block.producer_pubkey, "dropping sync response from unregistered producer");
                    return Ok(());
                }
                let syncer = self.syncer.read().clone();
                if let Some(syncer) = syncer {
                    syncer.add_block_synced(resp.block).await?;
                }
            }
            TrxType::BlockProduced => {
                let block: Block = self.decrypt_bincode(&trx)?;
                if let Some(producer) = self.consensus.read().clone().as_ref().and_then(Role::producer) {
                    producer.add_produced_block(block).await?;
                }
            }
        }
        Ok(())
    }

    #[instrument(name = "chain", skip(self, block), fields(group_id = %self.group_id, block_id = %block.block_id))]
    async fn route_block(&self, block: Block) -> Result<(), ChainError> {
        let role = self
            .consensus
            .read()
            .clone()
            .expect("create_consensus is always called before a chain can receive blocks");

        if role.producer().is_some() {
            // A producer saves its own minted blocks directly; a copy
            // arriving back over pubsub is its own echo.
            return Ok(());
        }

        if !self.producer_pool.read().contains(&block.producer_pubkey) {
            return Err(ChainError::UnauthorizedProducer(block.producer_pubkey));
        }

        match role.user().add_block(block.clone()).await {
            Ok(()) => Ok(()),
            Err(crate::errors::ConsensusError::ParentNotExist(_)) => self.sync_backward(block).await,
            Err(other) => Err(other.into()),
        }
    }

    async fn handle_forward_synced_block(&self, block: Block) -> Result<SyncOutcome, ChainError> {
        let next_reference_block_id = block.block_id.clone();
        let role = self
            .consensus
            .read()
            .clone()
            .expect("create_consensus is always called before a chain can receive synced blocks");
        role.user().add_block(block).await?;
        Ok(SyncOutcome::Continue { next_reference_block_id })
    }

    async fn handle_backward_synced_block(&self, block: Block) -> Result<SyncOutcome, ChainError> {
        let gap_closed = block.prev_block_id.is_empty()
            || self.db.get_block(&block.prev_block_id, false, "").await?.is_some();
        let reference_for_continue = block.prev_block_id.clone();

        self.backward_buffer.lock().await.push(block);

        if !gap_closed {
            return Ok(SyncOutcome::Continue { next_reference_block_id: reference_for_continue });
        }

        let mut connected: Vec<Block> = self.backward_buffer.lock().await.drain(..).collect();
        connected.reverse();
        let mut connected_count = connected.len() as i64;

        let mut newest_block_id = String::new();
        for b in connected {
            newest_block_id = b.block_id.clone();
            self.db.add_block(&self.group_id, b).await?;
        }
        if let Some(orphan) = self.pending_orphan.lock().await.take() {
            newest_block_id = orphan.block_id.clone();
            connected_count += 1;
            self.db.add_block(&self.group_id, orphan).await?;
        }

        let current_height = self.group_item.read().highest_height;
        self.upd_chain_info(current_height + connected_count, &newest_block_id).await?;
        Ok(SyncOutcome::Done)
    }
}

#[async_trait]
impl ChainHandle for Chain {
    fn group_id(&self) -> &str {
        &self.group_id
    }

    fn node_version(&self) -> u16 {
        self.node_version
    }

    fn user_sign_pubkey(&self) -> &str {
        &self.user_sign_pubkey
    }

    async fn get_user_trx_mgr(&self) -> Arc<TrxMgr> {
        self.trx_mgrs
            .read()
            .get(&self.user_channel_id)
            .cloned()
            .expect("create_consensus always builds the user trx mgr before this is called")
    }

    async fn get_sync_trx_mgr(&self) -> Arc<TrxMgr> {
        self.trx_mgrs
            .read()
            .get(&self.sync_channel_id)
            .cloned()
            .expect("create_consensus always builds the sync trx mgr before this is called")
    }

    async fn get_producer_trx_mgr(&self) -> Arc<TrxMgr> {
        if let Some(existing) = self.trx_mgrs.read().get(&self.producer_channel_id).cloned() {
            self.rearm_producer_channel_timer();
            return existing;
        }
        let mgr = Arc::new(self.build_trx_mgr(self.producer_channel_id.clone()));
        if let Err(err) = mgr.join().await {
            warn!(group_id = %self.group_id, %err, "failed to join producer channel on demand");
        }
        self.trx_mgrs.write().insert(self.producer_channel_id.clone(), mgr.clone());
        self.rearm_producer_channel_timer();
        mgr
    }

    async fn upd_chain_info(&self, height: i64, block_id: &str) -> Result<(), ChainError> {
        let mut item = self.group_item.read().clone();
        item.highest_height = height;
        item.highest_block_id = block_id.to_string();
        item.last_update = now_ns();
        self.db.upd_group(item.clone()).await?;
        *self.group_item.write() = item;
        Ok(())
    }

    async fn upd_producer_list(&self) -> Result<(), ChainError> {
        let producers = self.db.get_producers(&self.group_id).await?;
        self.producer_pool.write().rebuild(producers.clone());
        for producer in &producers {
            if self
                .db
                .is_producer_announced(&self.group_id, &producer.producer_pubkey)
                .await?
            {
                self.db
                    .update_producer_announce_result(&self.group_id, &producer.producer_pubkey, true)
                    .await?;
            }
        }
        Ok(())
    }

    async fn create_consensus(&self) -> Result<(), ChainError> {
        let handle = self
            .self_handle
            .upgrade()
            .expect("Chain is always constructed behind an Arc");

        let is_producer = self.producer_pool.read().contains(&self.user_sign_pubkey);
        if is_producer {
            self.producer_channel_permanent.store(true, Ordering::SeqCst);
            self.ensure_trx_mgr_joined(self.producer_channel_id.clone()).await?;
        }
        self.ensure_trx_mgr_joined(self.user_channel_id.clone()).await?;
        self.ensure_trx_mgr_joined(self.sync_channel_id.clone()).await?;

        let group_item = self.group_item.read().clone();
        let user = Arc::new(
            UserRole::new(&group_item, self.db.clone(), self.keystore.clone(), handle.clone())
                .map_err(|e| ChainError::CryptoFailure(e.to_string()))?,
        );

        let role = if is_producer {
            let inbound: Weak<dyn ChainInbound> = self.self_handle.clone();
            let producer = Arc::new(ProducerRole::new(
                self.group_id.clone(),
                self.node_version,
                self.group_id.clone(),
                self.user_sign_pubkey.clone(),
                self.cipher_key.clone(),
                self.db.clone(),
                self.keystore.clone(),
                self.pubsub.clone(),
                inbound,
            ));
            Role::ProducerAndUser { producer, user }
        } else {
            Role::UserOnly { user }
        };
        *self.consensus.write() = Some(role);

        if self.syncer.read().is_none() {
            *self.syncer.write() = Some(Arc::new(Syncer::new(handle)));
        }
        Ok(())
    }

    fn is_syncer_busy(&self) -> bool {
        self.syncer.read().as_ref().map(|s| s.is_busy()).unwrap_or(false)
    }

    async fn sync_backward(&self, block: Block) -> Result<(), ChainError> {
        *self.pending_orphan.lock().await = Some(block.clone());
        let syncer = self
            .syncer
            .read()
            .clone()
            .ok_or_else(|| ChainError::PersistenceError("syncer not initialized".into()))?;
        syncer.sync_backward(block).await.map_err(Into::into)
    }

    async fn add_synced_block(&self, block: Block) -> Result<SyncOutcome, ChainError> {
        let backward = matches!(
            self.syncer.read().as_ref().map(|s| s.state()),
            Some(SyncerState::SyncingBackward)
        );
        if backward {
            self.handle_backward_synced_block(block).await
        } else {
            self.handle_forward_synced_block(block).await
        }
    }
}

#[async_trait]
impl ChainInbound for Chain {
    async fn handle_trx(&self, trx: Trx) {
        if let Err(err) = self.route_trx(trx).await {
            warn!(group_id = %self.group_id, %err, "dropping trx");
        }
    }

    async fn handle_block(&self, block: Block) {
        if let Err(err) = self.route_block(block).await {
            warn!(group_id = %self.group_id, %err, "dropping block");
        }
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
