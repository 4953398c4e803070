//! `Group`: the per-group facade a node's API layer programs against
//! (§4.1, §4.2). Owns the group's [`Chain`] and exposes group lifecycle
//! (`create_grp`, `init`, `leave_grp`, `clear_group`), sync control, and
//! read/write content accessors, all delegating to `Chain`/`DbMgr`/the
//! active consensus role.

use crate::chain::Chain;
use crate::chain_handle::ChainHandle;
use crate::errors::GroupError;
use db_mgr::{ContentFilter, DbMgr};
use keystore::Keystore;
use pubsub_conn::PubSubConn;
use shared_crypto::hashing::blake3_hash_many;
use shared_types::{AnnounceItem, Block, GroupItem, ProducerItem, Trx};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, instrument};

const FIRST_PRODUCER_MEMO: &str = "owner registered as the first producer";

/// One group this node participates in: its chain plus the read/write
/// surface built on top of it.
pub struct Group {
    chain: Arc<Chain>,
}

impl Group {
    /// Re-attach to an already-persisted group at startup: build its
    /// `Chain`, reload the producer list, and construct consensus.
    /// Mirrors the original `Group.Init`.
    #[instrument(name = "group", skip(db, pubsub, keystore), fields(group_id = %group_item.group_id))]
    pub async fn init(
        group_item: GroupItem,
        node_version: u16,
        db: Arc<dyn DbMgr>,
        pubsub: Arc<dyn PubSubConn>,
        keystore: Arc<dyn Keystore>,
    ) -> Result<Self, GroupError> {
        let chain = Chain::new(group_item, node_version, db, pubsub, keystore)
            .map_err(|e| GroupError::PersistenceError(e.to_string()))?;
        chain.upd_producer_list().await?;
        chain.create_consensus().await?;
        info!(group_id = %chain.group_id(), "group initialized");
        Ok(Self { chain })
    }

    /// Create a brand-new group: persist its genesis block, register the
    /// owner as the first producer, persist the group record, then build
    /// consensus exactly as `init` does. Mirrors `Group.CreateGrp`.
    #[instrument(name = "group", skip(db, pubsub, keystore), fields(group_id = %group_item.group_id))]
    pub async fn create_grp(
        group_item: GroupItem,
        node_version: u16,
        db: Arc<dyn DbMgr>,
        pubsub: Arc<dyn PubSubConn>,
        keystore: Arc<dyn Keystore>,
    ) -> Result<Self, GroupError> {
        let group_id = group_item.group_id.clone();
        let owner_pubkey = group_item.owner_pubkey.clone();
        let genesis_block = group_item.genesis_block.clone();

        let chain = Chain::new(group_item.clone(), node_version, db, pubsub, keystore)
            .map_err(|e| GroupError::PersistenceError(e.to_string()))?;

        chain.db().add_gensis_block(&group_id, genesis_block).await?;

        let hash = blake3_hash_many(&[
            group_id.as_bytes(),
            owner_pubkey.as_bytes(),
            owner_pubkey.as_bytes(),
        ]);
        let group_owner_sign = chain
            .keystore()
            .sign_by_key_name(&group_id, &hash)
            .map_err(|e| GroupError::PersistenceError(e.to_string()))?;

        let owner_producer = ProducerItem {
            group_id: group_id.clone(),
            producer_pubkey: owner_pubkey.clone(),
            group_owner_pubkey: owner_pubkey,
            group_owner_sign,
            timestamp: now_ns(),
            memo: FIRST_PRODUCER_MEMO.into(),
        };
        chain.db().add_producer(owner_producer).await?;
        chain.db().add_group(group_item).await?;

        chain.upd_producer_list().await?;
        chain.create_consensus().await?;
        info!(group_id = %chain.group_id(), "group created");
        Ok(Self { chain })
    }

    /// Snapshot of the group's metadata.
    #[must_use]
    pub fn item(&self) -> GroupItem {
        self.chain.group_item()
    }

    /// Interrupt any in-progress sync round without touching persisted
    /// state. Mirrors `Group.Teardown`.
    pub fn teardown(&self) {
        if self.chain.is_syncer_busy() {
            self.chain.stop_sync();
        }
    }

    /// Leave the group: stop syncing, leave every channel, then drop the
    /// group record. Content already persisted is left untouched (use
    /// [`Group::clear_group`] to purge it). Order matches `Group.LeaveGrp`.
    #[instrument(name = "group", skip(self), fields(group_id = %self.chain.group_id()))]
    pub async fn leave_grp(&self) -> Result<(), GroupError> {
        self.chain.stop_sync();
        self.chain.leave_channel().await?;
        self.chain.db().rm_group(self.chain.group_id()).await?;
        Ok(())
    }

    /// Purge every persisted record for this group: blocks, trx,
    /// producers, announcements, and the group record itself.
    pub async fn clear_group(&self) -> Result<(), GroupError> {
        self.chain.db().remove_group_data(self.chain.group_id()).await?;
        Ok(())
    }

    /// Kick off a forward-catchup sync from the group's current tip.
    /// Refuses if a sync round is already in progress.
    #[instrument(name = "group", skip(self), fields(group_id = %self.chain.group_id()))]
    pub async fn start_sync(&self) -> Result<(), GroupError> {
        if self.chain.is_syncer_busy() {
            return Err(GroupError::AlreadySyncing);
        }
        let item = self.chain.group_item();
        let top_block = self
            .chain
            .db()
            .get_block(&item.highest_block_id, false, "")
            .await?
            .ok_or_else(|| GroupError::PersistenceError(format!(
                "top block {} missing locally",
                item.highest_block_id
            )))?;
        self.chain
            .start_initial_sync(top_block)
            .await
            .map_err(|e| GroupError::PersistenceError(e.to_string()))
    }

    /// Cancel the current sync round, if any. Unlike `Teardown`, this is
    /// unconditional: calling it when idle is a no-op.
    pub fn stop_sync(&self) {
        self.chain.stop_sync();
    }

    /// Fetch a filtered, paginated slice of the group's content.
    pub async fn get_group_content(&self, filter: ContentFilter) -> Result<Vec<Trx>, GroupError> {
        Ok(self.chain.db().get_grp_ctnt(self.chain.group_id(), filter, "").await?)
    }

    /// Fetch a block by id (header and trx list).
    pub async fn get_block(&self, block_id: &str) -> Result<Option<Block>, GroupError> {
        Ok(self.chain.db().get_block(block_id, true, "").await?)
    }

    /// Fetch a transaction by id.
    pub async fn get_trx(&self, trx_id: &str) -> Result<Option<Trx>, GroupError> {
        Ok(self.chain.db().get_trx(trx_id).await?)
    }

    /// List users currently blocked from posting to this group.
    pub async fn get_blocked_users(&self) -> Result<Vec<String>, GroupError> {
        Ok(self.chain.db().get_blked_users(self.chain.group_id()).await?)
    }

    /// List producers currently registered for this group.
    pub async fn get_producers(&self) -> Result<Vec<ProducerItem>, GroupError> {
        Ok(self.chain.db().get_producers(self.chain.group_id()).await?)
    }

    /// List announcements made by regular users.
    pub async fn get_announced_users(&self) -> Result<Vec<AnnounceItem>, GroupError> {
        Ok(self.chain.db().get_announced_users_by_group(self.chain.group_id()).await?)
    }

    /// List content schema identifiers registered for this group.
    pub async fn get_schemas(&self) -> Result<Vec<String>, GroupError> {
        Ok(self.chain.db().get_all_schemas_by_group(self.chain.group_id()).await?)
    }

    /// List announcements made by prospective producers.
    pub async fn get_announced_producers(&self) -> Result<Vec<AnnounceItem>, GroupError> {
        Ok(self.chain.db().get_announce_producers_by_group(self.chain.group_id()).await?)
    }

    /// Fetch a single prospective producer's announcement, if any.
    pub async fn get_announced_producer(&self, pubkey: &str) -> Result<Option<AnnounceItem>, GroupError> {
        Ok(self
            .chain
            .db()
            .get_announced_producer(self.chain.group_id(), pubkey)
            .await?)
    }

    /// Whether a prospective producer has an announcement on file.
    pub async fn is_producer_announced(&self, pubkey: &str) -> Result<bool, GroupError> {
        Ok(self
            .chain
            .db()
            .is_producer_announced(self.chain.group_id(), pubkey)
            .await?)
    }

    /// Publish a user or prospective-producer announcement.
    pub async fn upd_announce(&self, item: &AnnounceItem) -> Result<String, GroupError> {
        Ok(self.consensus_user().await.upd_announce(item).await?)
    }

    /// Block or unblock `user_pubkey` from posting to the group.
    pub async fn upd_blk_list(&self, user_pubkey: &str) -> Result<String, GroupError> {
        Ok(self.consensus_user().await.upd_blk_list(user_pubkey).await?)
    }

    /// Publish content to the group.
    pub async fn post_to_group(
        &self,
        content: &[u8],
        recipient_encrypt_pubkey: Option<&[u8; 32]>,
    ) -> Result<String, GroupError> {
        Ok(self
            .consensus_user()
            .await
            .post_to_group(content, recipient_encrypt_pubkey)
            .await?)
    }

    /// Register or update a producer's registration.
    pub async fn upd_producer(&self, item: &ProducerItem) -> Result<String, GroupError> {
        Ok(self.consensus_user().await.upd_producer(item).await?)
    }

    /// Publish a content schema registration.
    pub async fn upd_schema(&self, schema_id: &str) -> Result<String, GroupError> {
        Ok(self.consensus_user().await.upd_schema(schema_id).await?)
    }

    async fn consensus_user(&self) -> Arc<crate::consensus::UserRole<Chain>> {
        self.chain
            .consensus()
            .expect("create_consensus always runs before Group exposes write accessors")
            .user()
            .clone()
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
