//! `UserRole`: every group member's write path (§4.5).
//!
//! Builds, encrypts, signs, and publishes each write operation as a `Trx`
//! of the matching `TrxType` on the user channel, and applies inbound
//! blocks via `AddBlock`. Generic over [`ChainHandle`] so it can report
//! chain-info advances back to `Chain` without owning it (§9, §10.5).

use crate::chain_handle::ChainHandle;
use crate::errors::ConsensusError;
use db_mgr::DbMgr;
use keystore::Keystore;
use shared_crypto::pgp::encrypt_for_recipient;
use shared_crypto::CipherKey;
use shared_types::{
    AnnounceItem, Block, EncryptionType, GroupItem, ProducerItem, TrxType,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{instrument, warn};

/// A group member's write path and block-application logic.
pub struct UserRole<H: ChainHandle> {
    group_id: String,
    sign_key_name: String,
    encrypt_type: EncryptionType,
    cipher_key: CipherKey,
    db: Arc<dyn DbMgr>,
    keystore: Arc<dyn Keystore>,
    handle: Arc<H>,
    /// Local cache of `GroupItem.highest_height`, advanced on every
    /// successful `add_block`. `Chain` is the system of record (via
    /// `upd_chain_info` persisting to `DbMgr`); this cache only lets
    /// `UserRole` compute the next height without re-reading the group
    /// record on every block.
    height: AtomicI64,
}

impl<H: ChainHandle> UserRole<H> {
    /// Build a `UserRole` for `group_item`, starting height tracking from
    /// its persisted `highest_height`.
    ///
    /// # Errors
    ///
    /// Returns `ConsensusError::CryptoFailure` if `group_item.cipher_key`
    /// is not valid hex.
    pub fn new(
        group_item: &GroupItem,
        db: Arc<dyn DbMgr>,
        keystore: Arc<dyn Keystore>,
        handle: Arc<H>,
    ) -> Result<Self, ConsensusError> {
        let cipher_key = CipherKey::from_hex(&group_item.cipher_key)
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))?;
        Ok(Self {
            group_id: group_item.group_id.clone(),
            sign_key_name: group_item.group_id.clone(),
            encrypt_type: group_item.encrypt_type,
            cipher_key,
            db,
            keystore,
            handle,
            height: AtomicI64::new(group_item.highest_height),
        })
    }

    /// Apply an inbound block: persist it and advance chain height, or
    /// report that its parent is missing so the caller can start a
    /// backward sync (§4.4).
    #[instrument(name = "user_role", skip(self, block), fields(group_id = %self.group_id, block_id = %block.block_id))]
    pub async fn add_block(&self, block: Block) -> Result<(), ConsensusError> {
        if !block.prev_block_id.is_empty() {
            let parent = self
                .db
                .get_block(&block.prev_block_id, false, "")
                .await?;
            if parent.is_none() {
                return Err(ConsensusError::ParentNotExist(block.prev_block_id.clone()));
            }
        }

        let block_id = block.block_id.clone();
        self.db.add_block(&self.group_id, block).await?;

        let height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        self.handle
            .upd_chain_info(height, &block_id)
            .await
            .map_err(|e| ConsensusError::PersistenceError(e.to_string()))
    }

    /// Publish user-authored content. `recipient_encrypt_pubkey` is
    /// required (and PGP-applied before AES) when the group is PRIVATE;
    /// ignored for PUBLIC groups (§4.8).
    #[instrument(name = "user_role", skip(self, content), fields(group_id = %self.group_id))]
    pub async fn post_to_group(
        &self,
        content: &[u8],
        recipient_encrypt_pubkey: Option<&[u8; 32]>,
    ) -> Result<String, ConsensusError> {
        let plaintext = match (self.encrypt_type, recipient_encrypt_pubkey) {
            (EncryptionType::Private, Some(recipient)) => {
                encrypt_for_recipient(recipient, content)
                    .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))?
            }
            (EncryptionType::Private, None) => {
                warn!(group_id = %self.group_id, "private group post with no recipient key, refusing");
                return Err(ConsensusError::CryptoFailure(
                    "private group post requires a recipient encryption key".into(),
                ));
            }
            (EncryptionType::Public, _) => content.to_vec(),
        };
        self.publish(TrxType::Post, &plaintext).await
    }

    /// Register or update a producer's registration (owner-signed
    /// attestation is constructed by the caller; this just publishes it).
    pub async fn upd_producer(&self, item: &ProducerItem) -> Result<String, ConsensusError> {
        let payload = bincode::serialize(item)
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))?;
        self.publish(TrxType::Producer, &payload).await
    }

    /// Publish a user or prospective-producer announcement.
    pub async fn upd_announce(&self, item: &AnnounceItem) -> Result<String, ConsensusError> {
        let payload = bincode::serialize(item)
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))?;
        self.publish(TrxType::Announce, &payload).await
    }

    /// Publish a block/unblock of `user_pubkey` from posting to the group.
    pub async fn upd_blk_list(&self, user_pubkey: &str) -> Result<String, ConsensusError> {
        self.publish(TrxType::Auth, user_pubkey.as_bytes()).await
    }

    /// Publish a content schema registration.
    pub async fn upd_schema(&self, schema_id: &str) -> Result<String, ConsensusError> {
        self.publish(TrxType::Schema, schema_id.as_bytes()).await
    }

    async fn publish(&self, trx_type: TrxType, plaintext: &[u8]) -> Result<String, ConsensusError> {
        let trx_mgr = self.handle.get_user_trx_mgr().await;
        trx_mgr
            .publish_trx(trx_type, plaintext)
            .await
            .map_err(|e| ConsensusError::CryptoFailure(e.to_string()))
    }

    /// Re-exposed for `Group`'s read accessors, which need the signing key
    /// name used for all writes in this group (== `group_id`, matching
    /// the original `SignByKeyName(item.GroupId, hash)` convention).
    #[must_use]
    pub fn sign_key_name(&self) -> &str {
        &self.sign_key_name
    }

    #[must_use]
    pub fn keystore(&self) -> &Arc<dyn Keystore> {
        &self.keystore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_handle::SyncOutcome;
    use crate::trx_mgr::TrxMgr;
    use async_trait::async_trait;
    use db_mgr::InMemoryDbMgr;
    use keystore::{InMemoryKeystore, KeyPurpose};
    use pubsub_conn::{InMemoryPubSubConn, PubSubHub};
    use shared_types::{ChainError, ConsensusType};
    use std::sync::Mutex as StdMutex;

    struct NoopInbound;
    #[async_trait]
    impl crate::inbound::ChainInbound for NoopInbound {
        async fn handle_trx(&self, _trx: shared_types::Trx) {}
        async fn handle_block(&self, _block: Block) {}
    }

    struct MockHandle {
        user_trx_mgr: Arc<TrxMgr>,
        chain_info: StdMutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl ChainHandle for MockHandle {
        fn group_id(&self) -> &str {
            "g1"
        }
        fn node_version(&self) -> u16 {
            1
        }
        fn user_sign_pubkey(&self) -> &str {
            "user-pub"
        }
        async fn get_user_trx_mgr(&self) -> Arc<TrxMgr> {
            self.user_trx_mgr.clone()
        }
        async fn get_sync_trx_mgr(&self) -> Arc<TrxMgr> {
            self.user_trx_mgr.clone()
        }
        async fn get_producer_trx_mgr(&self) -> Arc<TrxMgr> {
            self.user_trx_mgr.clone()
        }
        async fn upd_chain_info(&self, height: i64, block_id: &str) -> Result<(), ChainError> {
            self.chain_info.lock().unwrap().push((height, block_id.to_string()));
            Ok(())
        }
        async fn upd_producer_list(&self) -> Result<(), ChainError> {
            Ok(())
        }
        async fn create_consensus(&self) -> Result<(), ChainError> {
            Ok(())
        }
        fn is_syncer_busy(&self) -> bool {
            false
        }
        async fn sync_backward(&self, _block: Block) -> Result<(), ChainError> {
            Ok(())
        }
        async fn add_synced_block(&self, _block: Block) -> Result<SyncOutcome, ChainError> {
            Ok(SyncOutcome::Done)
        }
    }

    fn sample_group_item(encrypt_type: EncryptionType) -> GroupItem {
        GroupItem {
            group_id: "g1".into(),
            group_name: "group-one".into(),
            owner_pubkey: "owner".into(),
            user_sign_pubkey: "user-pub".into(),
            user_encrypt_pubkey: "user-enc".into(),
            cipher_key: CipherKey::generate().to_hex(),
            app_key: "app".into(),
            consensus_type: ConsensusType::Poa,
            encrypt_type,
            highest_height: 0,
            highest_block_id: "b0".into(),
            last_update: 0,
            genesis_block: Block {
                block_id: "b0".into(),
                producer_pubkey: "owner".into(),
                prev_block_id: String::new(),
                trxs: vec![],
                producer_sign: vec![],
            },
        }
    }

    fn new_role(encrypt_type: EncryptionType) -> (UserRole<MockHandle>, Arc<InMemoryDbMgr>, Arc<MockHandle>) {
        let hub = PubSubHub::new();
        let pubsub: Arc<dyn pubsub_conn::PubSubConn> = Arc::new(InMemoryPubSubConn::new(hub));
        let keystore = Arc::new(InMemoryKeystore::new());
        keystore.new_key("g1", KeyPurpose::Sign, "").unwrap();
        let inbound: Arc<dyn crate::inbound::ChainInbound> = Arc::new(NoopInbound);
        let trx_mgr = Arc::new(TrxMgr::new(
            "user_channel_g1",
            "g1",
            1,
            "g1",
            "user-pub",
            CipherKey::generate(),
            pubsub,
            keystore.clone(),
            Arc::downgrade(&inbound),
        ));
        let db: Arc<InMemoryDbMgr> = Arc::new(InMemoryDbMgr::new());
        let handle = Arc::new(MockHandle {
            user_trx_mgr: trx_mgr,
            chain_info: StdMutex::new(vec![]),
        });
        let item = sample_group_item(encrypt_type);
        let role = UserRole::new(&item, db.clone(), keystore, handle.clone()).unwrap();
        (role, db, handle)
    }

    #[tokio::test]
    async fn add_block_with_known_parent_advances_height_and_reports_to_handle() {
        let (role, db, handle) = new_role(EncryptionType::Public);
        db.add_block(
            "g1",
            Block {
                block_id: "b0".into(),
                producer_pubkey: "owner".into(),
                prev_block_id: String::new(),
                trxs: vec![],
                producer_sign: vec![],
            },
        )
        .await
        .unwrap();

        role.add_block(Block {
            block_id: "b1".into(),
            producer_pubkey: "owner".into(),
            prev_block_id: "b0".into(),
            trxs: vec![],
            producer_sign: vec![],
        })
        .await
        .unwrap();

        assert_eq!(handle.chain_info.lock().unwrap().as_slice(), &[(1, "b1".to_string())]);
    }

    #[tokio::test]
    async fn add_block_with_missing_parent_reports_parent_not_exist() {
        let (role, _db, _handle) = new_role(EncryptionType::Public);
        let err = role
            .add_block(Block {
                block_id: "b5".into(),
                producer_pubkey: "owner".into(),
                prev_block_id: "b4".into(),
                trxs: vec![],
                producer_sign: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err, ConsensusError::ParentNotExist("b4".into()));
    }

    #[tokio::test]
    async fn public_group_post_does_not_require_a_recipient() {
        let (role, _db, _handle) = new_role(EncryptionType::Public);
        let trx_id = role.post_to_group(b"hello", None).await.unwrap();
        assert!(!trx_id.is_empty());
    }

    #[tokio::test]
    async fn private_group_post_without_recipient_is_refused() {
        let (role, _db, _handle) = new_role(EncryptionType::Private);
        let err = role.post_to_group(b"secret", None).await.unwrap_err();
        assert_eq!(
            err,
            ConsensusError::CryptoFailure(
                "private group post requires a recipient encryption key".into()
            )
        );
    }

    #[tokio::test]
    async fn private_group_post_with_recipient_succeeds() {
        let (role, _db, _handle) = new_role(EncryptionType::Private);
        let recipient = shared_crypto::pgp::RecipientKeyPair::generate();
        let pubkey = recipient.public_key();
        let trx_id = role.post_to_group(b"secret", Some(&pubkey)).await.unwrap();
        assert!(!trx_id.is_empty());
    }
}
