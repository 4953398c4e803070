//! # Chain Events
//!
//! Internal choreography events published by a `Chain` as it processes
//! blocks and transactions. These are consumed within a single node
//! process (e.g. by API/query layers, or by a `Syncer` waiting on a
//! sibling group) — they are not put on the wire; wire messages are
//! `Trx`/`Block` published through `pubsub-conn`.

use serde::{Deserialize, Serialize};
use shared_types::{Block, ConsensusType};

/// All events a `Chain` can publish about its own group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainEvent {
    /// This node finished joining a group and its chain is ready to run.
    GroupJoined {
        /// The joined group's id.
        group_id: String,
    },

    /// This node left a group; its chain and channels are torn down.
    GroupLeft {
        /// The left group's id.
        group_id: String,
    },

    /// A block was appended to a group's local chain.
    BlockAppended {
        /// The group the block belongs to.
        group_id: String,
        /// The appended block's id.
        block_id: String,
        /// The chain height after appending.
        height: i64,
    },

    /// A group's `Syncer` transitioned into syncing state.
    SyncStarted {
        /// The group that started syncing.
        group_id: String,
    },

    /// A group's `Syncer` finished syncing successfully.
    SyncCompleted {
        /// The group that finished syncing.
        group_id: String,
        /// The chain height after sync.
        new_height: i64,
    },

    /// A group's `Syncer` failed to make progress and gave up.
    SyncFailed {
        /// The group whose sync failed.
        group_id: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A producer was announced and registered for a group.
    ProducerAnnounced {
        /// The group the producer registered for.
        group_id: String,
        /// The new producer's signing public key.
        producer_pubkey: String,
    },

    /// A trx was rejected by the router and never applied.
    TrxRejected {
        /// The group the trx targeted.
        group_id: String,
        /// The rejected trx's id.
        trx_id: String,
        /// Human-readable rejection reason.
        reason: String,
    },

    /// A brand-new group was created locally (this node is its owner).
    GroupCreated {
        /// The new group's id.
        group_id: String,
        /// Consensus algorithm chosen for the group.
        consensus_type: ConsensusType,
        /// The group's genesis block.
        genesis_block: Block,
    },
}

impl ChainEvent {
    /// Get the topic for this event (for subscription filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::GroupJoined { .. } | Self::GroupLeft { .. } | Self::GroupCreated { .. } => {
                EventTopic::Group
            }
            Self::BlockAppended { .. } => EventTopic::Chain,
            Self::SyncStarted { .. } | Self::SyncCompleted { .. } | Self::SyncFailed { .. } => {
                EventTopic::Sync
            }
            Self::ProducerAnnounced { .. } => EventTopic::Producer,
            Self::TrxRejected { .. } => EventTopic::Trx,
        }
    }

    /// Get the group id this event pertains to.
    #[must_use]
    pub fn group_id(&self) -> &str {
        match self {
            Self::GroupJoined { group_id }
            | Self::GroupLeft { group_id }
            | Self::BlockAppended { group_id, .. }
            | Self::SyncStarted { group_id }
            | Self::SyncCompleted { group_id, .. }
            | Self::SyncFailed { group_id, .. }
            | Self::ProducerAnnounced { group_id, .. }
            | Self::TrxRejected { group_id, .. }
            | Self::GroupCreated { group_id, .. } => group_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Group lifecycle (join/leave/create).
    Group,
    /// Chain append events.
    Chain,
    /// Syncer state transitions.
    Sync,
    /// Producer registration.
    Producer,
    /// Trx routing outcomes.
    Trx,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Group ids to include. Empty means all groups.
    pub group_ids: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            group_ids: Vec::new(),
        }
    }

    /// Create a filter for events about a single group.
    #[must_use]
    pub fn for_group(group_id: impl Into<String>) -> Self {
        Self {
            topics: Vec::new(),
            group_ids: vec![group_id.into()],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ChainEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let group_match = self.group_ids.is_empty()
            || self.group_ids.iter().any(|g| g == event.group_id());

        topic_match && group_match
    }
}
