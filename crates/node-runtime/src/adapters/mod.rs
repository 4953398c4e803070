//! Default in-process adapters for the three ports [`chain_core`]
//! depends on. Persistent/networked adapters (an on-disk `DbMgr`, a real
//! `PubSubConn` transport) are out of scope for this core (§1) and are
//! someone else's crate to add; this module only wires the in-memory
//! reference implementations each port crate already ships.

use db_mgr::{DbMgr, InMemoryDbMgr};
use keystore::{InMemoryKeystore, Keystore};
use pubsub_conn::{InMemoryPubSubConn, PubSubConn, PubSubHub};
use std::sync::Arc;

/// The three outbound ports a [`chain_core::GroupMgr`] needs, built
/// against their in-memory reference adapters.
pub struct Ports {
    /// Persistence.
    pub db: Arc<dyn DbMgr>,
    /// Transport.
    pub pubsub: Arc<dyn PubSubConn>,
    /// Key management.
    pub keystore: Arc<dyn Keystore>,
}

/// Build a fresh, empty set of in-memory ports. Every node process gets
/// its own `PubSubHub`; nodes that should see each other's traffic must
/// share one explicitly (as the test suite does).
#[must_use]
pub fn in_memory_ports() -> Ports {
    let hub = PubSubHub::new();
    Ports {
        db: Arc::new(InMemoryDbMgr::new()),
        pubsub: Arc::new(InMemoryPubSubConn::new(hub)),
        keystore: Arc::new(InMemoryKeystore::new()),
    }
}

/// Build in-memory ports sharing an existing pubsub hub, so multiple
/// [`Node`](crate::Node)s in the same process can reach each other.
#[must_use]
pub fn in_memory_ports_on(hub: Arc<PubSubHub>) -> Ports {
    Ports {
        db: Arc::new(InMemoryDbMgr::new()),
        pubsub: Arc::new(InMemoryPubSubConn::new(hub)),
        keystore: Arc::new(InMemoryKeystore::new()),
    }
}
