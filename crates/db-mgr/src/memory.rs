//! In-memory `DbMgr` adapter, useful for tests and for nodes that don't
//! need data to survive a restart.

use crate::ports::{ContentFilter, DbError, DbMgr};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{AnnounceItem, Block, GroupItem, ProducerItem, Trx};
use std::collections::HashMap;

#[derive(Default)]
struct GroupRecord {
    item: Option<GroupItem>,
    blocks: HashMap<String, Block>,
    trxs: HashMap<String, Trx>,
    producers: Vec<ProducerItem>,
    announcements: Vec<AnnounceItem>,
    schemas: Vec<String>,
    blocked_users: Vec<String>,
}

/// In-memory, single-process `DbMgr`.
#[derive(Default)]
pub struct InMemoryDbMgr {
    groups: RwLock<HashMap<String, GroupRecord>>,
}

impl InMemoryDbMgr {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DbMgr for InMemoryDbMgr {
    async fn add_gensis_block(&self, group_id: &str, block: Block) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(group_id.to_string()).or_default();
        record.blocks.insert(block.block_id.clone(), block);
        Ok(())
    }

    async fn add_block(&self, group_id: &str, block: Block) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(group_id.to_string()).or_default();
        record.blocks.insert(block.block_id.clone(), block);
        Ok(())
    }

    async fn add_producer(&self, producer: ProducerItem) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(producer.group_id.clone()).or_default();
        record.producers.push(producer);
        Ok(())
    }

    async fn add_group(&self, group: GroupItem) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(group.group_id.clone()).or_default();
        record.item = Some(group);
        Ok(())
    }

    async fn rm_group(&self, group_id: &str) -> Result<(), DbError> {
        if let Some(record) = self.groups.write().get_mut(group_id) {
            record.item = None;
        }
        Ok(())
    }

    async fn remove_group_data(&self, group_id: &str) -> Result<(), DbError> {
        self.groups.write().remove(group_id);
        Ok(())
    }

    async fn upd_group(&self, group: GroupItem) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(group.group_id.clone()).or_default();
        record.item = Some(group);
        Ok(())
    }

    async fn get_block(
        &self,
        block_id: &str,
        with_trxs: bool,
        _nodename: &str,
    ) -> Result<Option<Block>, DbError> {
        let groups = self.groups.read();
        for record in groups.values() {
            if let Some(block) = record.blocks.get(block_id) {
                let mut result = block.clone();
                if !with_trxs {
                    result.trxs.clear();
                }
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    async fn add_trx(&self, trx: Trx) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(trx.group_id.clone()).or_default();
        record.trxs.insert(trx.trx_id.clone(), trx);
        Ok(())
    }

    async fn get_trx(&self, trx_id: &str) -> Result<Option<Trx>, DbError> {
        let groups = self.groups.read();
        for record in groups.values() {
            if let Some(trx) = record.trxs.get(trx_id) {
                return Ok(Some(trx.clone()));
            }
        }
        Ok(None)
    }

    async fn get_grp_ctnt(
        &self,
        group_id: &str,
        filter: ContentFilter,
        _nodename: &str,
    ) -> Result<Vec<Trx>, DbError> {
        let groups = self.groups.read();
        let Some(record) = groups.get(group_id) else {
            return Ok(Vec::new());
        };

        let mut trxs: Vec<Trx> = record.trxs.values().cloned().collect();
        trxs.sort_by_key(|t| t.timestamp);
        if filter.reverse {
            trxs.reverse();
        }

        if !filter.senders.is_empty() {
            trxs.retain(|t| filter.senders.contains(&t.sender_pubkey));
        }

        if let Some(start) = &filter.start_trx {
            if let Some(pos) = trxs.iter().position(|t| &t.trx_id == start) {
                trxs = trxs.split_off(pos + 1);
            }
        }

        if let Some(num) = filter.num {
            trxs.truncate(num);
        }

        Ok(trxs)
    }

    async fn get_producers(&self, group_id: &str) -> Result<Vec<ProducerItem>, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .map(|r| r.producers.clone())
            .unwrap_or_default())
    }

    async fn get_announce_producers_by_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<AnnounceItem>, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .map(|r| r.announcements.clone())
            .unwrap_or_default())
    }

    async fn update_producer_announce_result(
        &self,
        group_id: &str,
        producer_pubkey: &str,
        result: bool,
    ) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let Some(record) = groups.get_mut(group_id) else {
            return Err(DbError::NotFound(group_id.to_string()));
        };
        for announcement in &mut record.announcements {
            if announcement.sign_pubkey == producer_pubkey {
                announcement.result = result;
            }
        }
        Ok(())
    }

    async fn get_blked_users(&self, group_id: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .map(|r| r.blocked_users.clone())
            .unwrap_or_default())
    }

    async fn get_announced_users_by_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<AnnounceItem>, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .map(|r| r.announcements.clone())
            .unwrap_or_default())
    }

    async fn get_announced_producer(
        &self,
        group_id: &str,
        producer_pubkey: &str,
    ) -> Result<Option<AnnounceItem>, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .and_then(|r| {
                r.announcements
                    .iter()
                    .find(|a| a.sign_pubkey == producer_pubkey)
                    .cloned()
            }))
    }

    async fn is_producer_announced(
        &self,
        group_id: &str,
        producer_pubkey: &str,
    ) -> Result<bool, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .map(|r| r.announcements.iter().any(|a| a.sign_pubkey == producer_pubkey))
            .unwrap_or(false))
    }

    async fn get_all_schemas_by_group(&self, group_id: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .groups
            .read()
            .get(group_id)
            .map(|r| r.schemas.clone())
            .unwrap_or_default())
    }

    async fn upsert_announcement(&self, announcement: AnnounceItem) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(announcement.group_id.clone()).or_default();
        if let Some(existing) = record
            .announcements
            .iter_mut()
            .find(|a| a.sign_pubkey == announcement.sign_pubkey)
        {
            *existing = announcement;
        } else {
            record.announcements.push(announcement);
        }
        Ok(())
    }

    async fn add_schema(&self, group_id: &str, schema_id: &str) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(group_id.to_string()).or_default();
        if !record.schemas.iter().any(|s| s == schema_id) {
            record.schemas.push(schema_id.to_string());
        }
        Ok(())
    }

    async fn add_blked_user(&self, group_id: &str, user_pubkey: &str) -> Result<(), DbError> {
        let mut groups = self.groups.write();
        let record = groups.entry(group_id.to_string()).or_default();
        if !record.blocked_users.iter().any(|u| u == user_pubkey) {
            record.blocked_users.push(user_pubkey.to_string());
        }
        Ok(())
    }

    async fn get_all_groups(&self) -> Result<Vec<GroupItem>, DbError> {
        Ok(self
            .groups
            .read()
            .values()
            .filter_map(|r| r.item.clone())
            .collect())
    }
}
