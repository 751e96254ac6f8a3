//! Error types for lockbot-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from config and subscription operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.lockbot/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `lockbot init` first")]
    ConfigNotFound { path: PathBuf },

    /// A repository string was not of the form `owner/name`.
    #[error("invalid repository '{0}'; expected owner/name")]
    InvalidRepository(String),
}
