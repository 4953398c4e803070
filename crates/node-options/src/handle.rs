//! Shared, mutation-serializing handle over a node's [`NodeOptions`].

use crate::config::NodeOptions;
use crate::errors::NodeOptionsError;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// `Arc<Mutex<NodeOptions>>` plus the file path it's persisted to.
///
/// Every mutating method takes the lock, updates the in-memory value, and
/// writes the whole file back out before releasing it — there is no
/// partial-write path a concurrent reader could observe.
#[derive(Clone)]
pub struct NodeOptionsHandle {
    inner: Arc<Mutex<NodeOptions>>,
    config_path: PathBuf,
}

impl NodeOptionsHandle {
    /// Load `<config_dir>/<peername>_options.toml`, creating it with
    /// defaults if absent.
    pub fn load(config_dir: &Path, peername: &str) -> Result<Self, NodeOptionsError> {
        fs::create_dir_all(config_dir)?;
        let config_path = config_dir.join(format!("{peername}_options.toml"));

        let mut options = match fs::read_to_string(&config_path) {
            Ok(raw) => toml::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %config_path.display(), "config file not found, generating default");
                NodeOptions::default()
            }
            Err(err) => return Err(err.into()),
        };
        options.backfill_jwt_key();

        let handle = Self {
            inner: Arc::new(Mutex::new(options)),
            config_path,
        };
        handle.persist()?;
        Ok(handle)
    }

    /// Snapshot the current configuration.
    #[must_use]
    pub fn get(&self) -> NodeOptions {
        self.inner.lock().clone()
    }

    /// Replace the JWT signing key and persist.
    pub fn set_jwt_key(&self, jwt_key: String) -> Result<(), NodeOptionsError> {
        self.inner.lock().jwt_key = jwt_key;
        self.persist()
    }

    /// Replace the current JWT token and persist.
    pub fn set_jwt_token(&self, jwt_token: String) -> Result<(), NodeOptionsError> {
        self.inner.lock().jwt_token = jwt_token;
        self.persist()
    }

    /// Register (or overwrite) a signing key's address and persist.
    pub fn set_sign_key_map(&self, keyname: &str, addr: &str) -> Result<(), NodeOptionsError> {
        self.inner
            .lock()
            .sign_key_map
            .insert(keyname.to_string(), addr.to_string());
        self.persist()
    }

    fn persist(&self) -> Result<(), NodeOptionsError> {
        let options = self.inner.lock();
        let serialized = toml::to_string_pretty(&*options)?;
        fs::write(&self.config_path, serialized)?;
        Ok(())
    }
}
