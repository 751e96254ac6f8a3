//! Installation token providers.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use lockbot_core::InstallationId;

use crate::client::GitHubClient;
use crate::error::{io_err, CredentialError};

/// Backdating for the app JWT's `iat`, absorbing clock drift.
const JWT_BACKDATE_SECS: i64 = 60;
/// Lifetime of the app JWT; the platform caps it at ten minutes.
const JWT_LIFETIME_SECS: i64 = 540;

/// Short-lived bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges an installation identifier for a bearer token.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn installation_token(
        &self,
        installation: InstallationId,
    ) -> Result<AccessToken, CredentialError>;
}

/// Hands out the same pre-issued token for every installation.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn installation_token(
        &self,
        _installation: InstallationId,
    ) -> Result<AccessToken, CredentialError> {
        Ok(self.token.clone())
    }
}

/// Reads a pre-issued token from an environment variable on every call, so a
/// missing variable fails the credential step rather than process startup.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvTokenProvider {
    async fn installation_token(
        &self,
        _installation: InstallationId,
    ) -> Result<AccessToken, CredentialError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(AccessToken::new(value.trim(), None)),
            _ => Err(CredentialError::MissingEnv(self.var.clone())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AppClaims {
    iss: String,
    iat: i64,
    exp: i64,
}

/// Signs an app JWT and exchanges it for a per-installation token on every
/// call. Tokens are not cached.
#[derive(Clone)]
pub struct AppCredentialProvider {
    client: GitHubClient,
    app_id: u64,
    key: EncodingKey,
}

impl AppCredentialProvider {
    pub fn new(
        client: GitHubClient,
        app_id: u64,
        private_key_pem: &[u8],
    ) -> Result<Self, CredentialError> {
        Ok(Self {
            client,
            app_id,
            key: EncodingKey::from_rsa_pem(private_key_pem)?,
        })
    }

    /// Load the app's RSA private key from a PEM file.
    pub fn from_pem_file(
        client: GitHubClient,
        app_id: u64,
        path: &Path,
    ) -> Result<Self, CredentialError> {
        let pem = std::fs::read(path).map_err(|e| io_err(path, e))?;
        Self::new(client, app_id, &pem)
    }

    fn app_jwt(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let claims = AppClaims {
            iss: self.app_id.to_string(),
            iat: now.timestamp() - JWT_BACKDATE_SECS,
            exp: now.timestamp() + JWT_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

#[async_trait]
impl CredentialProvider for AppCredentialProvider {
    async fn installation_token(
        &self,
        installation: InstallationId,
    ) -> Result<AccessToken, CredentialError> {
        let jwt = self.app_jwt(Utc::now())?;
        let response = self
            .client
            .create_installation_token(&jwt, installation)
            .await?;
        tracing::debug!(
            installation = %installation,
            expires_at = ?response.expires_at,
            "installation token issued",
        );
        Ok(AccessToken::new(response.token, response.expires_at))
    }
}
