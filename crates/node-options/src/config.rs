//! Persisted node configuration.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const JWT_KEY_LENGTH: usize = 32;

/// Default network name new nodes join if none is configured.
pub const DEFAULT_NETWORK_NAME: &str = "nevis";

/// A node's persisted configuration: network identity, JWT auth material,
/// and the name→address map of registered signing keys.
///
/// Mirrors the TOML file a node keeps under its config directory. Only the
/// JWT key is ever auto-generated on a node's behalf; every other field is
/// either user-supplied or starts out empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeOptions {
    /// Whether to attempt NAT traversal for the p2p transport.
    #[serde(default = "default_enable_nat")]
    pub enable_nat: bool,

    /// Whether this node joins the dev/test network instead of production.
    #[serde(default)]
    pub enable_dev_network: bool,

    /// Logical network this node belongs to.
    #[serde(default = "default_network_name")]
    pub network_name: String,

    /// Hex-encoded random secret used to sign/verify this node's JWTs.
    #[serde(default = "generate_jwt_key")]
    pub jwt_key: String,

    /// Current JWT issued to API clients, if any.
    #[serde(default)]
    pub jwt_token: String,

    /// Registered signing-key name → base64 address.
    #[serde(default)]
    pub sign_key_map: HashMap<String, String>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            enable_nat: default_enable_nat(),
            enable_dev_network: false,
            network_name: default_network_name(),
            jwt_key: generate_jwt_key(),
            jwt_token: String::new(),
            sign_key_map: HashMap::new(),
        }
    }
}

impl NodeOptions {
    /// `jwt_key` is the only field allowed to arrive empty from disk: an
    /// older config file predating this field, or a hand-edited one.
    pub(crate) fn backfill_jwt_key(&mut self) {
        if self.jwt_key.is_empty() {
            self.jwt_key = generate_jwt_key();
        }
        if self.network_name.is_empty() {
            self.network_name = default_network_name();
        }
    }
}

fn default_enable_nat() -> bool {
    true
}

fn default_network_name() -> String {
    DEFAULT_NETWORK_NAME.to_string()
}

fn generate_jwt_key() -> String {
    let mut bytes = [0u8; JWT_KEY_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_network_name_is_nevis() {
        assert_eq!(NodeOptions::default().network_name, DEFAULT_NETWORK_NAME);
    }

    #[test]
    fn default_jwt_key_is_64_hex_chars() {
        let opts = NodeOptions::default();
        assert_eq!(opts.jwt_key.len(), JWT_KEY_LENGTH * 2);
        assert!(opts.jwt_key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn backfill_leaves_nonempty_jwt_key_untouched() {
        let mut opts = NodeOptions::default();
        let original = opts.jwt_key.clone();
        opts.backfill_jwt_key();
        assert_eq!(opts.jwt_key, original);
    }

    #[test]
    fn backfill_replaces_empty_jwt_key() {
        let mut opts = NodeOptions::default();
        opts.jwt_key.clear();
        opts.backfill_jwt_key();
        assert!(!opts.jwt_key.is_empty());
    }
}
