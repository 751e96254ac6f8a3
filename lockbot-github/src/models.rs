//! Wire types for the subset of the platform API lockbot uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of `GET /repos/{owner}/{repo}/git/refs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    pub name: &'a str,
    pub sha: &'a str,
}

/// Body of `PUT /repos/{owner}/{repo}/contents/{path}`.
///
/// `sha` is omitted from the JSON entirely when the file does not exist yet;
/// the platform treats its presence as an update of that exact blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutFileRequest {
    #[serde(skip)]
    pub path: String,
    pub message: String,
    /// Base64-encoded file content.
    pub content: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Response of the contents `PUT`; `content.sha` is the new blob.
#[derive(Debug, Clone, Deserialize)]
pub struct PutFileResponse {
    #[serde(default)]
    pub content: Option<ContentSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSummary {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPullRequest {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryMetadata {
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstallationTokenResponse {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlatformErrorBody {
    pub message: String,
    #[serde(default)]
    pub errors: Vec<PlatformErrorDetail>,
}

impl PlatformErrorBody {
    /// Top-level message plus any per-field detail messages; validation
    /// failures put the useful text ("A pull request already exists…") there.
    pub fn into_message(self) -> String {
        let details: Vec<String> = self
            .errors
            .into_iter()
            .filter_map(|detail| detail.message)
            .collect();
        if details.is_empty() {
            self.message
        } else {
            format!("{}: {}", self.message, details.join("; "))
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlatformErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}
