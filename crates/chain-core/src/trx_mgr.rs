//! Wraps one pubsub subscription plus the crypto needed to build, sign,
//! encrypt, and publish outbound trx, and to relay inbound messages up to
//! `Chain` (§4.7).

use crate::errors::TrxMgrError;
use crate::inbound::ChainInbound;
use crate::wire::ChainMessage;
use db_mgr::DbMgr;
use keystore::Keystore;
use pubsub_conn::PubSubConn;
use shared_crypto::CipherKey;
use shared_types::{Block, Trx, TrxType};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{instrument, warn};
use uuid::Uuid;

/// One channel's worth of outbound crypto/signing plumbing plus inbound
/// relay to `Chain`.
pub struct TrxMgr {
    channel_id: String,
    group_id: String,
    node_version: u16,
    sign_key_name: String,
    sender_pubkey: String,
    cipher_key: CipherKey,
    pubsub: Arc<dyn PubSubConn>,
    keystore: Arc<dyn Keystore>,
    inbound: Weak<dyn ChainInbound>,
}

impl TrxMgr {
    /// Construct a `TrxMgr` bound to `channel_id`. Does not join the
    /// channel; call [`TrxMgr::join`] separately (§4.3: `Init` wires names
    /// but does not join channels).
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        channel_id: impl Into<String>,
        group_id: impl Into<String>,
        node_version: u16,
        sign_key_name: impl Into<String>,
        sender_pubkey: impl Into<String>,
        cipher_key: CipherKey,
        pubsub: Arc<dyn PubSubConn>,
        keystore: Arc<dyn Keystore>,
        inbound: Weak<dyn ChainInbound>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            group_id: group_id.into(),
            node_version,
            sign_key_name: sign_key_name.into(),
            sender_pubkey: sender_pubkey.into(),
            cipher_key,
            pubsub,
            keystore,
            inbound,
        }
    }

    /// The pubsub channel id this manager is bound to.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Join the bound channel, decoding inbound bytes and dispatching to
    /// `Chain` via the `ChainInbound` callback.
    #[instrument(name = "trx_mgr", skip(self), fields(channel = %self.channel_id))]
    pub async fn join(&self) -> Result<(), TrxMgrError> {
        let inbound = self.inbound.clone();
        let channel_id = self.channel_id.clone();
        let handler: pubsub_conn::MessageHandler = Arc::new(move |bytes: Vec<u8>| {
            let inbound = inbound.clone();
            let channel_id = channel_id.clone();
            let message = match ChainMessage::decode(&bytes) {
                Ok(msg) => msg,
                Err(err) => {
                    warn!(%channel_id, %err, "dropping undecodable message");
                    return;
                }
            };
            let Some(sink) = inbound.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                match message {
                    ChainMessage::Trx(trx) => sink.handle_trx(trx).await,
                    ChainMessage::Block(block) => sink.handle_block(block).await,
                }
            });
        });

        self.pubsub
            .join_channel(&self.channel_id, handler)
            .await
            .map_err(TrxMgrError::from)
    }

    /// Leave the bound channel.
    pub async fn leave(&self) -> Result<(), TrxMgrError> {
        self.pubsub
            .leave_channel(&self.channel_id)
            .await
            .map_err(TrxMgrError::from)
    }

    /// Build, sign, AES-encrypt, and publish a transaction of `trx_type`
    /// carrying `plaintext`. Returns the assigned trx id.
    ///
    /// `plaintext` must already reflect any PGP per-recipient layer for
    /// PRIVATE-group POSTs (§4.8): that encryption is applied by the user
    /// role before this call, AES is applied here.
    #[instrument(name = "trx_mgr", skip(self, plaintext), fields(channel = %self.channel_id))]
    pub async fn publish_trx(
        &self,
        trx_type: TrxType,
        plaintext: &[u8],
    ) -> Result<String, TrxMgrError> {
        let hash = shared_crypto::hashing::blake3_hash(plaintext);
        let signature = self.keystore.sign_by_key_name(&self.sign_key_name, &hash)?;
        let data = self.keystore.aes_encrypt(&self.cipher_key, plaintext)?;

        let trx = Trx {
            trx_id: Uuid::new_v4().to_string(),
            group_id: self.group_id.clone(),
            sender_pubkey: self.sender_pubkey.clone(),
            trx_type,
            version: self.node_version,
            data,
            signature,
            timestamp: now_ns(),
        };
        let trx_id = trx.trx_id.clone();

        let bytes = ChainMessage::Trx(trx)
            .encode()
            .map_err(|e| TrxMgrError::CryptoFailure(e.to_string()))?;
        self.pubsub.publish(&self.channel_id, bytes).await?;
        Ok(trx_id)
    }

    /// Broadcast a freshly produced (or sync-response) block on this
    /// channel.
    #[instrument(name = "trx_mgr", skip(self, block), fields(channel = %self.channel_id, block_id = %block.block_id))]
    pub async fn publish_block(&self, block: Block) -> Result<(), TrxMgrError> {
        let bytes = ChainMessage::Block(block)
            .encode()
            .map_err(|e| TrxMgrError::CryptoFailure(e.to_string()))?;
        self.pubsub.publish(&self.channel_id, bytes).await?;
        Ok(())
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
