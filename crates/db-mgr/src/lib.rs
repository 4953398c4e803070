//! # Database Manager
//!
//! Persistence port for blocks, transactions, producers, announcements,
//! and group metadata. `chain-core` is written entirely against
//! [`DbMgr`]; storage engine choice (on-disk key-value store, SQL, or the
//! in-memory adapter here) never leaks upward.

pub mod memory;
pub mod ports;

pub use memory::InMemoryDbMgr;
pub use ports::{ContentFilter, DbError, DbMgr};
