//! Error types for lockbot-reconcile.

use std::path::PathBuf;

use thiserror::Error;

use lockbot_core::RepositoryIdentity;
use lockbot_github::ApiError;

/// Failures of the external lock generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to start generator {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("generator {program} exited with {code:?}: {stderr}")]
    Exit {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The process succeeded but left no lock file behind.
    #[error("generator produced no lock file at {path}")]
    MissingOutput { path: PathBuf },
}

/// Failures while creating the branch or writing the lock file to it.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The directory listing was not an array.
    #[error("unexpected contents listing: expected an array, got {kind}")]
    UnexpectedContents { kind: &'static str },

    #[error("cannot create branch {branch}: default branch head is unresolved")]
    EmptyHeadSha { branch: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, PublishError::Api(err) if err.is_already_exists())
    }
}

/// Failures acquiring or releasing a scratch workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that stop a reconcile pass before any workflow runs.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("repository {0} is not subscribed")]
    UnknownRepository(RepositoryIdentity),

    #[error("platform client error: {0}")]
    Api(#[from] ApiError),

    #[error("credential setup error: {0}")]
    Credential(#[from] lockbot_github::CredentialError),
}

pub(crate) fn publish_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn workspace_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.into(),
        source,
    }
}
