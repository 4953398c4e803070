//! # Keystore
//!
//! Holds the signing and encryption key material `chain-core` needs:
//! producer signing keys, group owner keys, and per-user X25519 keys for
//! private-group post encryption. Every key operation is exposed through
//! the [`Keystore`] trait so `chain-core` never touches raw secrets.

pub mod memory;
pub mod ports;

pub use memory::InMemoryKeystore;
pub use ports::{KeyPurpose, Keystore, KeystoreError};
