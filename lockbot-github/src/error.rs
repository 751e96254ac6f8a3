//! Error types for lockbot-github.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from platform REST calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or a response body that could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A success response whose body did not match the expected shape.
    #[error("response JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response. `message` is the platform's `message` field when
    /// present, otherwise the raw body.
    #[error("platform returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// `true` for the 422 the platform returns when a ref or pull request
    /// already exists.
    pub fn is_already_exists(&self) -> bool {
        match self {
            ApiError::Status { status, message } => {
                *status == 422 && message.to_ascii_lowercase().contains("already exists")
            }
            _ => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors from acquiring an installation token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Private key could not be parsed or the JWT could not be signed.
    #[error("app JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token exchange failed: {0}")]
    Api(#[from] ApiError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CredentialError {
    CredentialError::Io {
        path: path.into(),
        source,
    }
}
