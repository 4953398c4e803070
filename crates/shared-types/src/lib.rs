//! # Shared Types Crate
//!
//! Domain entities (`GroupItem`, `Block`, `Trx`, `ProducerItem`,
//! `AnnounceItem`, `JoinGroupSeed`) and the chain-wide error taxonomy
//! (`ChainError`), shared by every crate in the workspace.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::ChainError;
