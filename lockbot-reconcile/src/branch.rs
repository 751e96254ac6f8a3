//! Branch naming.

use sha2::{Digest, Sha256};

use lockbot_core::{BranchPolicy, RepositoryIdentity};

/// Hex characters of the content digest kept in hashed branch names.
const HASH_LEN: usize = 12;

/// Name of the branch a run publishes to.
///
/// `Fixed` ignores `content`. `ContentHash` is deterministic in
/// `(repository, content)`: identical regenerated files map to the same branch,
/// so a re-run finds its own branch instead of colliding with another version.
pub fn branch_name(policy: &BranchPolicy, repository: &RepositoryIdentity, content: &[u8]) -> String {
    match policy {
        BranchPolicy::Fixed { name } => name.clone(),
        BranchPolicy::ContentHash { prefix } => {
            let mut hasher = Sha256::new();
            hasher.update(repository.to_string().as_bytes());
            hasher.update(b"\n");
            hasher.update(content);
            let digest = hex::encode(hasher.finalize());
            format!("{}/{}", prefix.trim_end_matches('/'), &digest[..HASH_LEN])
        }
    }
}
