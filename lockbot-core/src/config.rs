//! YAML configuration and repository subscriptions.
//!
//! # Storage layout
//!
//! ```text
//! ~/.lockbot/
//!   config.yaml     (mode 0600, created by `lockbot init`)
//!   scratch/        (default workspace root, mode 0700)
//! ```
//!
//! # API pattern
//!
//! Every function touching disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{RepositoryIdentity, Subscription};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BRANCH_NAME: &str = "add-docker-lock";
pub const DEFAULT_GENERATOR: &str = "docker-lock-generator";
pub const DEFAULT_TOKEN_ENV: &str = "LOCKBOT_TOKEN";

// ---------------------------------------------------------------------------
// 1. Config model
// ---------------------------------------------------------------------------

/// How the lock branch is named for each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BranchPolicy {
    /// One well-known branch reused by every run.
    Fixed { name: String },
    /// `<prefix>/<hash>` derived from repository identity and lock content.
    ContentHash { prefix: String },
}

impl Default for BranchPolicy {
    fn default() -> Self {
        BranchPolicy::Fixed {
            name: DEFAULT_BRANCH_NAME.to_string(),
        }
    }
}

/// External lock generator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub program: PathBuf,
    /// Arguments placed before the positional `repo owner token workspace`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_GENERATOR),
            args: vec![],
        }
    }
}

/// Where installation tokens come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// A pre-issued token read from an environment variable.
    TokenEnv { var: String },
    /// App JWT exchanged for per-installation tokens.
    App {
        app_id: u64,
        private_key_path: PathBuf,
    },
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig::TokenEnv {
            var: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Root of `~/.lockbot/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Scratch workspaces are created under this directory.
    /// Defaults to `~/.lockbot/scratch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub branch: BranchPolicy,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub repositories: Vec<Subscription>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            workspace_root: None,
            generator: GeneratorConfig::default(),
            branch: BranchPolicy::default(),
            credentials: CredentialsConfig::default(),
            repositories: vec![],
        }
    }
}

impl Config {
    /// Polling interval; never zero.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Configured workspace root, or `<home>/.lockbot/scratch`.
    pub fn workspace_root_at(&self, home: &Path) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| lockbot_root(home).join("scratch"))
    }

    pub fn subscription(&self, repository: &RepositoryIdentity) -> Option<&Subscription> {
        self.repositories
            .iter()
            .find(|sub| &sub.repository == repository)
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.lockbot/`
pub fn lockbot_root(home: &Path) -> PathBuf {
    home.join(".lockbot")
}

/// `<home>/.lockbot/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    lockbot_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// Load `<home>/.lockbot/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the config.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    let root = lockbot_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

/// Write a default config if none exists.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path) -> Result<Config, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    let config = Config::default();
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<Config, ConfigError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// 4. Subscriptions
// ---------------------------------------------------------------------------

/// Register `subscription`, replacing the installation id of an existing
/// entry for the same repository.
///
/// Returns `true` if the repository was newly added.
pub fn add_repository_at(home: &Path, subscription: Subscription) -> Result<bool, ConfigError> {
    let mut config = load_at(home)?;
    let added = match config
        .repositories
        .iter_mut()
        .find(|sub| sub.repository == subscription.repository)
    {
        Some(existing) => {
            existing.installation_id = subscription.installation_id;
            false
        }
        None => {
            config.repositories.push(subscription);
            config
                .repositories
                .sort_by(|a, b| a.repository.cmp(&b.repository));
            true
        }
    };
    save_at(home, &config)?;
    Ok(added)
}

/// `add_repository_at` convenience wrapper.
pub fn add_repository(subscription: Subscription) -> Result<bool, ConfigError> {
    add_repository_at(&home()?, subscription)
}

/// Remove a repository. Returns `true` if an entry was removed.
pub fn remove_repository_at(
    home: &Path,
    repository: &RepositoryIdentity,
) -> Result<bool, ConfigError> {
    let mut config = load_at(home)?;
    let before = config.repositories.len();
    config.repositories.retain(|sub| &sub.repository != repository);
    let removed = config.repositories.len() != before;
    if removed {
        save_at(home, &config)?;
    }
    Ok(removed)
}

/// `remove_repository_at` convenience wrapper.
pub fn remove_repository(repository: &RepositoryIdentity) -> Result<bool, ConfigError> {
    remove_repository_at(&home()?, repository)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
