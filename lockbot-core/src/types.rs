//! Domain types for lockbot.
//!
//! All path fields use `PathBuf`; repository coordinates always travel as a
//! [`RepositoryIdentity`], never as loose `(owner, name)` string pairs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The managed file name, both inside the scratch workspace and at the
/// repository root.
pub const LOCK_FILE_NAME: &str = "docker-lock.json";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// `owner/name` coordinates of a repository.
///
/// Serialized as the single string `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryIdentity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(ConfigError::InvalidRepository(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepositoryIdentity {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepositoryIdentity> for String {
    fn from(id: RepositoryIdentity) -> Self {
        id.to_string()
    }
}

/// Identifier of the app installation that owns a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(pub u64);

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for InstallationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A repository registered for periodic reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub repository: RepositoryIdentity,
    pub installation_id: InstallationId,
}

/// A branch to be created from `head_sha`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub name: String,
    /// Commit the branch starts from. Empty when the default branch head
    /// could not be resolved.
    pub head_sha: String,
}

impl BranchRef {
    /// Fully qualified ref name, `refs/heads/<name>`.
    pub fn qualified(&self) -> String {
        format!("refs/heads/{}", self.name)
    }
}

/// The regenerated lock file, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFile {
    pub path: String,
    /// Remote blob SHA when the file already exists on the target branch.
    pub blob_sha: Option<String>,
    pub content: Vec<u8>,
}

impl LockFile {
    pub fn new(content: Vec<u8>, blob_sha: Option<String>) -> Self {
        Self {
            path: LOCK_FILE_NAME.to_string(),
            blob_sha,
            content,
        }
    }
}

/// A pull request from the lock branch to the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestProposal {
    pub title: String,
    pub head: String,
    pub base: String,
    pub maintainer_can_modify: bool,
}

impl PullRequestProposal {
    pub fn for_branch(branch: &str, default_branch: &str) -> Self {
        Self {
            title: format!("Merge {branch} as new version of package available"),
            head: branch.to_string(),
            base: default_branch.to_string(),
            maintainer_can_modify: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
