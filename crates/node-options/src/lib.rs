//! # Node Options
//!
//! Persisted, per-node configuration: network identity, JWT auth
//! material, and the registered signing-key address map. Loaded once at
//! startup from `<config_dir>/<peername>_options.toml` and shared through
//! [`NodeOptionsHandle`] for the lifetime of the process.

pub mod config;
pub mod errors;
pub mod handle;

pub use config::{NodeOptions, DEFAULT_NETWORK_NAME};
pub use errors::NodeOptionsError;
pub use handle::NodeOptionsHandle;
