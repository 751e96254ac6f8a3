//! lockbot core library: domain types, config persistence, errors.
//!
//! - [`types`]: newtypes and domain structs shared by every crate
//! - [`config`]: `~/.lockbot/config.yaml` load / save / subscription edits
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{BranchPolicy, Config, CredentialsConfig, GeneratorConfig};
pub use error::ConfigError;
pub use types::{
    BranchRef, InstallationId, LockFile, PullRequestProposal, RepositoryIdentity, Subscription,
    LOCK_FILE_NAME,
};
