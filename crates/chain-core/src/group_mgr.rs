//! `GroupMgr`: the process-wide registry of every group this node
//! participates in (§4.1). Reads (`get_group`, `get_group_item`) run
//! concurrently; mutation (`create_grp`, `leave_grp`) is serialized by a
//! single registry lock, same as `Chain::trx_mgrs`/`producer_pool`.

use crate::errors::GroupError;
use crate::group::Group;
use crate::seed::verify_seed;
use db_mgr::DbMgr;
use keystore::{KeyPurpose, Keystore, KeystoreError};
use parking_lot::RwLock;
use pubsub_conn::PubSubConn;
use shared_types::{GroupItem, JoinGroupSeed};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, instrument, warn};

/// Owns every active [`Group`], keyed by group id.
pub struct GroupMgr {
    node_version: u16,
    db: Arc<dyn DbMgr>,
    pubsub: Arc<dyn PubSubConn>,
    keystore: Arc<dyn Keystore>,
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupMgr {
    #[must_use]
    pub fn new(
        node_version: u16,
        db: Arc<dyn DbMgr>,
        pubsub: Arc<dyn PubSubConn>,
        keystore: Arc<dyn Keystore>,
    ) -> Self {
        Self {
            node_version,
            db,
            pubsub,
            keystore,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Reload every persisted group at startup. A group whose `init`
    /// fails is logged and omitted; the rest still load.
    #[instrument(name = "group_mgr", skip(self))]
    pub async fn load(&self) -> Result<(), GroupError> {
        let items = self.db.get_all_groups().await?;
        for item in items {
            let group_id = item.group_id.clone();
            match Group::init(item, self.node_version, self.db.clone(), self.pubsub.clone(), self.keystore.clone()).await {
                Ok(group) => {
                    self.groups.write().insert(group_id, Arc::new(group));
                }
                Err(err) => {
                    warn!(%group_id, %err, "failed to initialize persisted group, skipping");
                }
            }
        }
        info!(count = self.groups.read().len(), "groups loaded");
        Ok(())
    }

    /// Create a new group and register it.
    #[instrument(name = "group_mgr", skip(self, item), fields(group_id = %item.group_id))]
    pub async fn create_grp(&self, item: GroupItem) -> Result<Arc<Group>, GroupError> {
        let group_id = item.group_id.clone();
        let group = Arc::new(
            Group::create_grp(item, self.node_version, self.db.clone(), self.pubsub.clone(), self.keystore.clone())
                .await?,
        );
        self.groups.write().insert(group_id, group.clone());
        Ok(group)
    }

    /// Join a group from an invitation: verify the owner's seed signature,
    /// provision this node's per-group sign/encrypt keys if they don't
    /// already exist, then run the same [`Group::create_grp`] path a
    /// group's own creator runs. Mirrors the wasm `JoinGroup` flow, minus
    /// the transport-layer bits that belong to an API surface, not this
    /// registry.
    ///
    /// # Errors
    ///
    /// `GroupError::SeedVerificationFailed` if the signature doesn't
    /// check out against `seed.owner_pubkey`.
    #[instrument(name = "group_mgr", skip(self, seed), fields(group_id = %seed.group_id))]
    pub async fn join_grp(&self, seed: JoinGroupSeed) -> Result<Arc<Group>, GroupError> {
        if !verify_seed(&seed, self.keystore.as_ref())
            .map_err(|e| GroupError::PersistenceError(e.to_string()))?
        {
            return Err(GroupError::SeedVerificationFailed);
        }

        let user_sign_pubkey = self.ensure_key(&seed.group_id, KeyPurpose::Sign)?;
        let user_encrypt_pubkey = self.ensure_key(&seed.group_id, KeyPurpose::Encrypt)?;

        let item = GroupItem {
            group_id: seed.group_id,
            group_name: seed.group_name,
            owner_pubkey: seed.owner_pubkey,
            user_sign_pubkey,
            user_encrypt_pubkey,
            cipher_key: seed.cipher_key,
            app_key: seed.app_key,
            consensus_type: seed.consensus_type,
            encrypt_type: seed.encryption_type,
            highest_height: 0,
            highest_block_id: seed.genesis_block.block_id.clone(),
            last_update: now_ns(),
            genesis_block: seed.genesis_block,
        };
        self.create_grp(item).await
    }

    fn ensure_key(&self, name: &str, purpose: KeyPurpose) -> Result<String, GroupError> {
        match self.keystore.get_encoded_pubkey(name, purpose) {
            Ok(pubkey) => Ok(pubkey),
            Err(KeystoreError::KeyNotFound(_)) => self
                .keystore
                .new_key(name, purpose, "")
                .map_err(|e| GroupError::PersistenceError(e.to_string())),
            Err(err) => Err(GroupError::PersistenceError(err.to_string())),
        }
    }

    /// Leave a registered group, removing it from the registry.
    #[instrument(name = "group_mgr", skip(self))]
    pub async fn leave_grp(&self, group_id: &str) -> Result<(), GroupError> {
        let group = self
            .groups
            .write()
            .remove(group_id)
            .ok_or_else(|| GroupError::GroupNotFound(group_id.to_string()))?;
        group.leave_grp().await
    }

    /// Look up a registered group.
    #[must_use]
    pub fn get_group(&self, group_id: &str) -> Option<Arc<Group>> {
        self.groups.read().get(group_id).cloned()
    }

    /// Look up a registered group's metadata snapshot.
    pub fn get_group_item(&self, group_id: &str) -> Result<GroupItem, GroupError> {
        self.get_group(group_id)
            .map(|g| g.item())
            .ok_or_else(|| GroupError::GroupNotFound(group_id.to_string()))
    }

    /// Every currently-registered group id.
    #[must_use]
    pub fn group_ids(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
