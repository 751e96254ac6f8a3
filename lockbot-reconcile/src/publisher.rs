//! Branch creation and lock-file publishing.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use lockbot_core::{BranchRef, LockFile, RepositoryIdentity, LOCK_FILE_NAME};
use lockbot_github::{AccessToken, GitRef, PutFileRequest, PutFileResponse, RepositoryApi};

use crate::error::{publish_io_err, PublishError};

pub const COMMIT_MESSAGE: &str = "updating docker-lock.json";

/// Head commit of `default_branch` in a ref listing.
///
/// Scans every entry for an exact `refs/heads/<default_branch>` match; the
/// last match wins. Returns the empty string when nothing matches.
pub fn latest_sha(refs: &[GitRef], default_branch: &str) -> String {
    let wanted = format!("refs/heads/{default_branch}");
    let mut sha = String::new();
    for entry in refs {
        if entry.name == wanted {
            sha = entry.object.sha.clone();
        }
    }
    sha
}

/// Blob SHA of the `docker-lock.json` entry in a root directory listing.
///
/// Last matching entry wins; `None` when absent. A listing that is not a
/// JSON array is rejected rather than treated as empty.
pub fn existing_blob_sha(listing: &Value) -> Result<Option<String>, PublishError> {
    let entries = listing
        .as_array()
        .ok_or(PublishError::UnexpectedContents {
            kind: json_kind(listing),
        })?;

    let mut sha = None;
    for entry in entries {
        if entry.get("name").and_then(Value::as_str) == Some(LOCK_FILE_NAME) {
            sha = entry.get("sha").and_then(Value::as_str).map(str::to_string);
        }
    }
    Ok(sha)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A lock file written to a branch.
#[derive(Debug, Clone)]
pub struct PublishedLockFile {
    pub lock: LockFile,
    /// Blob SHA the platform assigned to the written content.
    pub committed_sha: Option<String>,
}

/// Creates the lock branch and writes the lock file onto it.
#[derive(Clone)]
pub struct BranchPublisher {
    api: Arc<dyn RepositoryApi>,
}

impl BranchPublisher {
    pub fn new(api: Arc<dyn RepositoryApi>) -> Self {
        Self { api }
    }

    /// Create `refs/heads/<branch.name>` at `branch.head_sha`.
    ///
    /// Fails when the ref already exists (see
    /// [`PublishError::is_already_exists`]) or the head SHA is empty.
    pub async fn create_branch(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        branch: &BranchRef,
    ) -> Result<(), PublishError> {
        if branch.head_sha.is_empty() {
            return Err(PublishError::EmptyHeadSha {
                branch: branch.name.clone(),
            });
        }
        self.api
            .create_ref(token, repo, &branch.qualified(), &branch.head_sha)
            .await?;
        Ok(())
    }

    /// Current blob SHA of the lock file on `branch`, re-fetched every call.
    pub async fn current_blob_sha(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        branch: &str,
    ) -> Result<Option<String>, PublishError> {
        let listing = self.api.list_directory(token, repo, branch, ".").await?;
        existing_blob_sha(&listing)
    }

    /// Create or overwrite `path` on `branch` with `content`.
    ///
    /// `current_blob_sha` must be the remote blob when the file exists; the
    /// platform rejects an update without it.
    pub async fn update_file(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        branch: &str,
        path: &str,
        content: &[u8],
        current_blob_sha: Option<String>,
    ) -> Result<PutFileResponse, PublishError> {
        let request = PutFileRequest {
            path: path.to_string(),
            message: COMMIT_MESSAGE.to_string(),
            content: STANDARD.encode(content),
            branch: branch.to_string(),
            sha: current_blob_sha,
        };
        Ok(self.api.put_file(token, repo, &request).await?)
    }

    /// List the branch root, read the generated file from `workspace`, and
    /// write it to the branch.
    pub async fn publish_lock_file(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        branch: &str,
        workspace: &Path,
    ) -> Result<PublishedLockFile, PublishError> {
        let blob_sha = self.current_blob_sha(token, repo, branch).await?;

        let path = workspace.join(LOCK_FILE_NAME);
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| publish_io_err(&path, e))?;
        let lock = LockFile::new(content, blob_sha);

        let response = self
            .update_file(
                token,
                repo,
                branch,
                &lock.path,
                &lock.content,
                lock.blob_sha.clone(),
            )
            .await?;
        Ok(PublishedLockFile {
            lock,
            committed_sha: response.content.map(|content| content.sha),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbot_github::GitObject;
    use rstest::rstest;
    use serde_json::json;

    fn git_ref(name: &str, sha: &str) -> GitRef {
        GitRef {
            name: name.into(),
            object: GitObject { sha: sha.into() },
        }
    }

    #[test]
    fn latest_sha_finds_default_branch_head() {
        let refs = vec![git_ref("refs/heads/main", "abc123")];
        assert_eq!(latest_sha(&refs, "main"), "abc123");
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::other_branch(vec![git_ref("refs/heads/develop", "111")])]
    #[case::tag_with_same_name(vec![git_ref("refs/tags/main", "222")])]
    #[case::prefix_only(vec![git_ref("refs/heads/main-old", "333")])]
    fn latest_sha_without_match_is_empty(#[case] refs: Vec<GitRef>) {
        assert_eq!(latest_sha(&refs, "main"), "");
    }

    #[test]
    fn latest_sha_last_match_wins() {
        let refs = vec![
            git_ref("refs/heads/main", "first"),
            git_ref("refs/heads/feature", "ignored"),
            git_ref("refs/heads/main", "second"),
        ];
        assert_eq!(latest_sha(&refs, "main"), "second");
    }

    #[test]
    fn blob_sha_absent_when_no_lock_entry() {
        let listing = json!([
            {"name": "README.md", "sha": "aaa", "type": "file"},
            {"name": "src", "sha": "bbb", "type": "dir"},
        ]);
        assert_eq!(existing_blob_sha(&listing).unwrap(), None);
    }

    #[test]
    fn blob_sha_supplied_verbatim() {
        let listing = json!([
            {"name": "README.md", "sha": "aaa"},
            {"name": "docker-lock.json", "sha": "3d21ec53a331a6f037a91c368710b99387d012c1"},
        ]);
        assert_eq!(
            existing_blob_sha(&listing).unwrap().as_deref(),
            Some("3d21ec53a331a6f037a91c368710b99387d012c1")
        );
    }

    #[test]
    fn blob_sha_ignores_nested_lock_files() {
        let listing = json!([{"name": "sub/docker-lock.json", "path": "sub/docker-lock.json", "sha": "nested"}]);
        assert_eq!(existing_blob_sha(&listing).unwrap(), None);
    }

    #[rstest]
    #[case::object(json!({"name": "docker-lock.json", "sha": "x"}), "object")]
    #[case::null(Value::Null, "null")]
    #[case::string(json!("nope"), "string")]
    fn non_array_listing_is_unexpected_contents(#[case] listing: Value, #[case] kind: &str) {
        let err = existing_blob_sha(&listing).unwrap_err();
        assert!(
            matches!(err, PublishError::UnexpectedContents { kind: k } if k == kind),
            "got {err:?}"
        );
        assert!(err.to_string().contains("unexpected contents"));
    }
}
