//! Cross-crate integration tests for the group-chain subsystem: end-to-end
//! flows that span `chain-core`, `db-mgr`, `pubsub-conn`, `keystore`, and
//! `node-runtime` together, rather than any one crate's own unit tests.

pub mod scenarios;
