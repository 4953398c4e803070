//! Persistence port `chain-core` programs against.

use async_trait::async_trait;
use shared_types::{AnnounceItem, Block, GroupItem, ProducerItem, Trx};
use thiserror::Error;

/// Errors surfaced by a `DbMgr` implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record with this key already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The underlying storage engine returned an error.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Selects a slice of a group's content for `get_group_content`, mirroring
/// the illustrative HTTP surface's `num`/`reverse`/`starttrx` query params.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    /// Only include trx from these senders. Empty means all senders.
    pub senders: Vec<String>,
    /// Maximum number of trx to return. `None` means unbounded.
    pub num: Option<usize>,
    /// Return newest-first when true.
    pub reverse: bool,
    /// Only include trx at or after this trx id (exclusive paging cursor).
    pub start_trx: Option<String>,
}

/// Persists blocks, transactions, producers, announcements, and group
/// metadata. The sole source of truth for anything a `Chain` needs to
/// survive a restart.
#[async_trait]
pub trait DbMgr: Send + Sync {
    /// Persist a group's genesis block at group creation/join time.
    async fn add_gensis_block(&self, group_id: &str, block: Block) -> Result<(), DbError>;

    /// Persist a non-genesis block appended to a group's chain.
    async fn add_block(&self, group_id: &str, block: Block) -> Result<(), DbError>;

    /// Register a producer for a group.
    async fn add_producer(&self, producer: ProducerItem) -> Result<(), DbError>;

    /// Persist a new group's metadata.
    async fn add_group(&self, group: GroupItem) -> Result<(), DbError>;

    /// Remove a group's metadata record (not its content).
    async fn rm_group(&self, group_id: &str) -> Result<(), DbError>;

    /// Purge all persisted data for a group: blocks, trx, producers,
    /// announcements, and the group record itself.
    async fn remove_group_data(&self, group_id: &str) -> Result<(), DbError>;

    /// Overwrite a group's metadata (e.g. after `UpdChainInfo`).
    async fn upd_group(&self, group: GroupItem) -> Result<(), DbError>;

    /// Fetch a block by id. `with_trxs` controls whether the block's
    /// transaction list is populated or omitted (a lighter header-only
    /// read). `nodename` scopes the read to one node's local database in
    /// multi-tenant deployments; single-tenant adapters may ignore it.
    async fn get_block(
        &self,
        block_id: &str,
        with_trxs: bool,
        nodename: &str,
    ) -> Result<Option<Block>, DbError>;

    /// Persist a transaction (recorded independently of the block that
    /// eventually includes it, so senders can query their own trx by id
    /// before it is committed to a block).
    async fn add_trx(&self, trx: Trx) -> Result<(), DbError>;

    /// Fetch a transaction by id.
    async fn get_trx(&self, trx_id: &str) -> Result<Option<Trx>, DbError>;

    /// Fetch a filtered, paginated slice of a group's content.
    async fn get_grp_ctnt(
        &self,
        group_id: &str,
        filter: ContentFilter,
        nodename: &str,
    ) -> Result<Vec<Trx>, DbError>;

    /// List all producers currently registered for a group.
    async fn get_producers(&self, group_id: &str) -> Result<Vec<ProducerItem>, DbError>;

    /// List announcements made by prospective producers for a group.
    async fn get_announce_producers_by_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<AnnounceItem>, DbError>;

    /// Mark whether an announcement has been matched against the current
    /// `ProducerPool`.
    async fn update_producer_announce_result(
        &self,
        group_id: &str,
        producer_pubkey: &str,
        result: bool,
    ) -> Result<(), DbError>;

    /// List users blocked from posting to a group.
    async fn get_blked_users(&self, group_id: &str) -> Result<Vec<String>, DbError>;

    /// List announcements made by regular users for a group.
    async fn get_announced_users_by_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<AnnounceItem>, DbError>;

    /// Fetch a single prospective producer's announcement, if any.
    async fn get_announced_producer(
        &self,
        group_id: &str,
        producer_pubkey: &str,
    ) -> Result<Option<AnnounceItem>, DbError>;

    /// Whether a prospective producer has an announcement on file.
    async fn is_producer_announced(
        &self,
        group_id: &str,
        producer_pubkey: &str,
    ) -> Result<bool, DbError>;

    /// List content schema identifiers registered for a group.
    async fn get_all_schemas_by_group(&self, group_id: &str) -> Result<Vec<String>, DbError>;

    /// Record or update an announcement (user or prospective producer).
    async fn upsert_announcement(&self, announcement: AnnounceItem) -> Result<(), DbError>;

    /// Register a content schema id for a group.
    async fn add_schema(&self, group_id: &str, schema_id: &str) -> Result<(), DbError>;

    /// Block a user from posting to a group.
    async fn add_blked_user(&self, group_id: &str, user_pubkey: &str) -> Result<(), DbError>;

    /// List every persisted `GroupItem`, for `GroupMgr::load` at startup.
    async fn get_all_groups(&self) -> Result<Vec<GroupItem>, DbError>;
}
