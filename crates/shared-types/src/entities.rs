//! # Core Domain Entities
//!
//! The persisted and in-memory shapes shared by every component of the
//! per-group chain subsystem: groups, blocks, transactions, producers and
//! announcements.
//!
//! ## Clusters
//!
//! - **Group**: `GroupItem`, `ConsensusType`, `EncryptionType`
//! - **Chain**: `Block`, `Trx`, `TrxType`, `ReqBlockResp`
//! - **Producers**: `ProducerItem`, `AnnounceItem`
//! - **Join flow**: `JoinGroupSeed`

use serde::{Deserialize, Serialize};

/// Base64-encoded secp256k1 public key, used for every identity in the system.
pub type PubKeyB64 = String;

/// Hex-encoded 32-byte AES key shared by all members of a group.
pub type CipherKeyHex = String;

/// How a group's producer set is elected. The repo ships a single
/// authority-based ("proof of authority") variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusType {
    /// Proof of authority: only registered producers may mint blocks.
    Poa,
}

/// Whether group content is readable by anyone or only announced members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionType {
    /// Content is AES-encrypted under the group `CipherKey` only.
    Public,
    /// POST content is additionally encrypted per-recipient before AES.
    Private,
}

/// A persisted group record, one per group this node participates in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupItem {
    /// Unique group identifier (uuid4).
    pub group_id: String,
    /// Human-readable group name.
    pub group_name: String,
    /// The group owner's signing public key.
    pub owner_pubkey: PubKeyB64,
    /// This node's signing key for the group.
    pub user_sign_pubkey: PubKeyB64,
    /// This node's encryption key for the group.
    pub user_encrypt_pubkey: PubKeyB64,
    /// Symmetric key shared by all members, used to encrypt trx payloads.
    pub cipher_key: CipherKeyHex,
    /// Application-defined key namespacing group content.
    pub app_key: String,
    /// Consensus algorithm in use.
    pub consensus_type: ConsensusType,
    /// Content visibility.
    pub encrypt_type: EncryptionType,
    /// Monotonic chain height of the highest known block.
    pub highest_height: i64,
    /// Id of the block at `highest_height`.
    pub highest_block_id: String,
    /// Nanosecond epoch timestamp of the last successful `update_chain_info`.
    pub last_update: i64,
    /// The genesis block, serialized, as shipped in the join seed.
    pub genesis_block: Block,
}

/// A block in a group's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Unique id of this block.
    pub block_id: String,
    /// Signing public key of the producer that minted this block.
    pub producer_pubkey: PubKeyB64,
    /// Id of the parent block, or empty for the genesis block.
    pub prev_block_id: String,
    /// Transactions included in this block.
    pub trxs: Vec<Trx>,
    /// Producer's signature over the block.
    pub producer_sign: Vec<u8>,
}

/// The type of a transaction. Modeled as a tagged enum so the router match
/// in `chain-core` is exhaustive and the "unsupported type" branch can only
/// be reached by a deserialization failure, not by an unmatched variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrxType {
    /// Group member authentication/key record.
    Auth,
    /// User-authored content.
    Post,
    /// A user or prospective producer announces its keys to the group.
    Announce,
    /// Producer registration/deregistration.
    Producer,
    /// Content schema registration.
    Schema,
    /// Request the next block(s) forward from the chain tip.
    ReqBlockForward,
    /// Request the block(s) preceding a known block.
    ReqBlockBackward,
    /// Response to a forward/backward block request.
    ReqBlockResp,
    /// Notification that a block has been produced.
    BlockProduced,
}

/// A transaction: the unit of content exchanged on a group's channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trx {
    /// Unique id of this transaction, used for at-least-once dedup.
    pub trx_id: String,
    /// The group this transaction belongs to.
    pub group_id: String,
    /// Signing public key of the sender.
    pub sender_pubkey: PubKeyB64,
    /// The transaction's type.
    pub trx_type: TrxType,
    /// Protocol version; must equal the node's version or the trx is rejected.
    pub version: u16,
    /// AES-encrypted payload (and, for PRIVATE-group POST, additionally
    /// per-recipient encrypted before AES is applied).
    pub data: Vec<u8>,
    /// Sender's signature over the unencrypted payload hash.
    pub signature: Vec<u8>,
    /// Nanosecond epoch timestamp.
    pub timestamp: i64,
}

/// Decrypted payload of a `TrxType::ReqBlockResp` transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReqBlockResp {
    /// The pubkey of whoever originally requested this block.
    pub requester_pubkey: PubKeyB64,
    /// The block being delivered.
    pub block: Block,
}

/// A registered producer for a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerItem {
    /// The group this producer is registered for.
    pub group_id: String,
    /// The producer's signing public key.
    pub producer_pubkey: PubKeyB64,
    /// The group owner's public key (redundant but carried for attestation).
    pub group_owner_pubkey: PubKeyB64,
    /// Owner's signature over `group_id || producer_pubkey || group_owner_pubkey`.
    pub group_owner_sign: Vec<u8>,
    /// Nanosecond epoch timestamp of registration.
    pub timestamp: i64,
    /// Free-text note (e.g. "Owner registered as the first producer").
    pub memo: String,
}

/// An announcement: a user or prospective producer advertising its keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceItem {
    /// The group this announcement targets.
    pub group_id: String,
    /// The announcer's signing public key.
    pub sign_pubkey: PubKeyB64,
    /// The announcer's encryption public key.
    pub encrypt_pubkey: PubKeyB64,
    /// Whether this announcement has been matched against the producer pool.
    pub result: bool,
    /// Nanosecond epoch timestamp.
    pub timestamp: i64,
}

/// The signed bundle of metadata required to join a group from an invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGroupSeed {
    /// The group's genesis block.
    pub genesis_block: Block,
    /// Group id.
    pub group_id: String,
    /// Group name.
    pub group_name: String,
    /// Owner's signing public key.
    pub owner_pubkey: PubKeyB64,
    /// Consensus algorithm.
    pub consensus_type: ConsensusType,
    /// Content visibility.
    pub encryption_type: EncryptionType,
    /// Application key.
    pub app_key: String,
    /// Shared symmetric key.
    pub cipher_key: CipherKeyHex,
    /// Owner's signature over the hash described in `hash_inputs`.
    pub signature: Vec<u8>,
}

impl JoinGroupSeed {
    /// The ordered byte segments hashed and signed to produce/verify
    /// `signature`. Exposed as a method (rather than inlined at each call
    /// site) so signing and verification can never drift out of sync.
    pub fn hash_inputs(&self) -> Vec<Vec<u8>> {
        let genesis_json =
            serde_json::to_vec(&self.genesis_block).expect("genesis block always serializes");
        vec![
            genesis_json,
            self.group_id.clone().into_bytes(),
            self.group_name.clone().into_bytes(),
            self.owner_pubkey.clone().into_bytes(),
            format!("{:?}", self.consensus_type).into_bytes(),
            format!("{:?}", self.encryption_type).into_bytes(),
            self.app_key.clone().into_bytes(),
            self.cipher_key.clone().into_bytes(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            block_id: "b0".into(),
            producer_pubkey: "owner".into(),
            prev_block_id: String::new(),
            trxs: vec![],
            producer_sign: vec![],
        }
    }

    #[test]
    fn hash_inputs_is_deterministic() {
        let seed = JoinGroupSeed {
            genesis_block: sample_block(),
            group_id: "g1".into(),
            group_name: "group-one".into(),
            owner_pubkey: "owner".into(),
            consensus_type: ConsensusType::Poa,
            encryption_type: EncryptionType::Public,
            app_key: "app".into(),
            cipher_key: "cafebabe".into(),
            signature: vec![],
        };
        assert_eq!(seed.hash_inputs(), seed.hash_inputs());
    }

    #[test]
    fn hash_inputs_changes_with_any_field() {
        let mut seed = JoinGroupSeed {
            genesis_block: sample_block(),
            group_id: "g1".into(),
            group_name: "group-one".into(),
            owner_pubkey: "owner".into(),
            consensus_type: ConsensusType::Poa,
            encryption_type: EncryptionType::Public,
            app_key: "app".into(),
            cipher_key: "cafebabe".into(),
            signature: vec![],
        };
        let before = seed.hash_inputs();
        seed.cipher_key.push('0');
        assert_ne!(before, seed.hash_inputs());
    }
}
