//! Per-component error enums, narrower than [`shared_types::ChainError`].
//!
//! Routing paths (`Chain::handle_trx`/`handle_block`) only ever see
//! `ChainError` — these are the internal vocabulary each component uses
//! before its caller classifies a failure into the Chain-level taxonomy.

use thiserror::Error;

/// Errors returned by [`crate::syncer::Syncer`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncerError {
    /// `StartSync`/`SyncForward`/`SyncBackward` called while not idle.
    #[error("syncer is busy")]
    AlreadySyncing,

    /// The pubsub publish for the sync request failed.
    #[error("failed to publish sync request: {0}")]
    PublishFailed(String),
}

/// Errors returned by [`crate::consensus::UserRole`]/[`crate::consensus::ProducerRole`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// `AddBlock` was given a block whose parent isn't stored locally.
    #[error("parent block {0} does not exist locally")]
    ParentNotExist(String),

    /// The persistence layer rejected the write.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Signing, AES, or PGP operation failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),
}

/// Errors returned by [`crate::trx_mgr::TrxMgr`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrxMgrError {
    /// The outbound pubsub publish failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Signing or encryption of the outbound trx failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),
}

/// Errors returned by [`crate::group::Group`]/[`crate::group_mgr::GroupMgr`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// `StartSync` called while the syncer was already busy.
    #[error("group is syncing, refusing to start another sync")]
    AlreadySyncing,

    /// Seed verification failed at join time.
    #[error("failed to verify seed")]
    SeedVerificationFailed,

    /// The persistence layer rejected the write.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The pubsub layer failed to join/leave/publish on a channel.
    #[error("pubsub error: {0}")]
    PubSubError(String),

    /// `GetGroupItem`/API lookup on an unregistered group id.
    #[error("group not found: {0}")]
    GroupNotFound(String),
}

impl From<SyncerError> for shared_types::ChainError {
    fn from(err: SyncerError) -> Self {
        match err {
            SyncerError::AlreadySyncing => shared_types::ChainError::AlreadySyncing,
            SyncerError::PublishFailed(msg) => shared_types::ChainError::PubSubError(msg),
        }
    }
}

impl From<ConsensusError> for shared_types::ChainError {
    fn from(err: ConsensusError) -> Self {
        match err {
            ConsensusError::ParentNotExist(id) => shared_types::ChainError::ParentNotExist(id),
            ConsensusError::PersistenceError(msg) => shared_types::ChainError::PersistenceError(msg),
            ConsensusError::CryptoFailure(msg) => shared_types::ChainError::CryptoFailure(msg),
        }
    }
}

impl From<TrxMgrError> for shared_types::ChainError {
    fn from(err: TrxMgrError) -> Self {
        match err {
            TrxMgrError::PublishFailed(msg) => shared_types::ChainError::PubSubError(msg),
            TrxMgrError::CryptoFailure(msg) => shared_types::ChainError::CryptoFailure(msg),
        }
    }
}

impl From<db_mgr::DbError> for ConsensusError {
    fn from(err: db_mgr::DbError) -> Self {
        ConsensusError::PersistenceError(err.to_string())
    }
}

impl From<pubsub_conn::PubSubError> for TrxMgrError {
    fn from(err: pubsub_conn::PubSubError) -> Self {
        TrxMgrError::PublishFailed(err.to_string())
    }
}

impl From<keystore::KeystoreError> for TrxMgrError {
    fn from(err: keystore::KeystoreError) -> Self {
        TrxMgrError::CryptoFailure(err.to_string())
    }
}

impl From<db_mgr::DbError> for shared_types::ChainError {
    fn from(err: db_mgr::DbError) -> Self {
        shared_types::ChainError::PersistenceError(err.to_string())
    }
}

impl From<pubsub_conn::PubSubError> for shared_types::ChainError {
    fn from(err: pubsub_conn::PubSubError) -> Self {
        shared_types::ChainError::PubSubError(err.to_string())
    }
}

impl From<keystore::KeystoreError> for shared_types::ChainError {
    fn from(err: keystore::KeystoreError) -> Self {
        shared_types::ChainError::CryptoFailure(err.to_string())
    }
}

impl From<GroupError> for shared_types::ChainError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::AlreadySyncing => shared_types::ChainError::AlreadySyncing,
            GroupError::SeedVerificationFailed => {
                shared_types::ChainError::CryptoFailure("seed verification failed".into())
            }
            GroupError::PersistenceError(msg) => shared_types::ChainError::PersistenceError(msg),
            GroupError::PubSubError(msg) => shared_types::ChainError::PubSubError(msg),
            GroupError::GroupNotFound(id) => shared_types::ChainError::GroupNotFound(id),
        }
    }
}
