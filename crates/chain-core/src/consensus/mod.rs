//! The role a node plays in a group: a plain member (`UserOnly`) or a
//! registered producer that also mints/answers sync requests
//! (`ProducerAndUser`). Modeled as a sum type, not a `producer: Option<_>`
//! field plus a boolean, so every call site that only makes sense for a
//! producer is a `match` arm instead of an `if let` that can silently skip
//! (§9: "role absence as a variant, not a null field").

pub mod producer_role;
pub mod user_role;

pub use producer_role::ProducerRole;
pub use user_role::UserRole;

use crate::chain_handle::ChainHandle;
use std::sync::Arc;

/// This node's consensus participation in one group.
pub enum Role<H: ChainHandle> {
    /// A member with no producer registration: can read and post, cannot
    /// mint blocks or answer sync requests.
    UserOnly { user: Arc<UserRole<H>> },
    /// A registered producer, which is always also a user.
    ProducerAndUser {
        producer: Arc<ProducerRole>,
        user: Arc<UserRole<H>>,
    },
}

impl<H: ChainHandle> Clone for Role<H> {
    fn clone(&self) -> Self {
        match self {
            Role::UserOnly { user } => Role::UserOnly { user: user.clone() },
            Role::ProducerAndUser { producer, user } => Role::ProducerAndUser {
                producer: producer.clone(),
                user: user.clone(),
            },
        }
    }
}

impl<H: ChainHandle> Role<H> {
    /// The producer half, if this node is registered as a producer for the
    /// group. Mirrors the original `Consensus.Producer()` accessor, which
    /// returns `nil` for non-producer nodes.
    #[must_use]
    pub fn producer(&self) -> Option<&Arc<ProducerRole>> {
        match self {
            Role::UserOnly { .. } => None,
            Role::ProducerAndUser { producer, .. } => Some(producer),
        }
    }

    /// The user half, always present.
    #[must_use]
    pub fn user(&self) -> &Arc<UserRole<H>> {
        match self {
            Role::UserOnly { user } | Role::ProducerAndUser { user, .. } => user,
        }
    }
}
