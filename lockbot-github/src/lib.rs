//! # lockbot-github
//!
//! Async client for the hosting platform's REST API and the credential
//! providers that mint installation tokens for it.
//!
//! [`RepositoryApi`] and [`CredentialProvider`] are the seams the
//! reconciliation workflow depends on; [`GitHubClient`],
//! [`EnvTokenProvider`] and [`AppCredentialProvider`] are the production
//! implementations.

pub mod client;
pub mod credentials;
pub mod error;
pub mod models;

pub use client::{GitHubClient, RepositoryApi};
pub use credentials::{
    AccessToken, AppCredentialProvider, CredentialProvider, EnvTokenProvider, StaticTokenProvider,
};
pub use error::{ApiError, ApiResult, CredentialError};
pub use models::{
    ContentSummary, CreatedPullRequest, GitObject, GitRef, PutFileRequest, PutFileResponse,
};
