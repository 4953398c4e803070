use thiserror::Error;

/// Errors raised while loading or persisting [`crate::NodeOptions`].
#[derive(Debug, Error)]
pub enum NodeOptionsError {
    /// The config directory or file couldn't be created/read/written.
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk TOML was malformed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The in-memory config couldn't be serialized back to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
