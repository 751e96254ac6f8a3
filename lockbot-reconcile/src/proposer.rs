//! Pull request proposal.

use std::sync::Arc;

use lockbot_core::{PullRequestProposal, RepositoryIdentity};
use lockbot_github::{AccessToken, ApiResult, CreatedPullRequest, RepositoryApi};

/// Opens the lock branch → default branch pull request.
///
/// Not deduplicated: an open proposal for the same head/base pair makes the
/// platform reject the call, which callers treat as soft state.
#[derive(Clone)]
pub struct PullRequestProposer {
    api: Arc<dyn RepositoryApi>,
}

impl PullRequestProposer {
    pub fn new(api: Arc<dyn RepositoryApi>) -> Self {
        Self { api }
    }

    pub async fn propose(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        branch: &str,
        default_branch: &str,
    ) -> ApiResult<CreatedPullRequest> {
        let proposal = PullRequestProposal::for_branch(branch, default_branch);
        self.api.create_pull_request(token, repo, &proposal).await
    }
}
