//! One reconciliation run for one repository.
//!
//! [`Reconciler::reconcile`] never returns an error. Every step catches its own
//! failure, records it in the [`ReconcileReport`], and hands a degraded value
//! (no token, empty default branch, empty head SHA) to the steps after it.
//!
//! The one value that cannot degrade is a content-hash branch name: with no
//! generated file there is nothing to name the branch after, so the branch, the
//! publish and the pull request are refused locally.

use std::path::PathBuf;
use std::sync::Arc;

use lockbot_core::{BranchPolicy, BranchRef, RepositoryIdentity, Subscription};
use lockbot_github::{AccessToken, CredentialProvider, RepositoryApi};

use crate::branch::branch_name;
use crate::generator::{GenerateRequest, LockGenerator};
use crate::lease::RunLeases;
use crate::proposer::PullRequestProposer;
use crate::publisher::{latest_sha, BranchPublisher, PublishedLockFile};
use crate::report::{ReconcileReport, Step};
use crate::workspace::ScratchWorkspace;

/// Per-deployment knobs for the workflow.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Scratch workspaces are created under this directory.
    pub workspace_root: PathBuf,
    pub branch_policy: BranchPolicy,
}

pub struct Reconciler {
    api: Arc<dyn RepositoryApi>,
    credentials: Arc<dyn CredentialProvider>,
    generator: Arc<dyn LockGenerator>,
    publisher: BranchPublisher,
    proposer: PullRequestProposer,
    settings: ReconcileSettings,
    leases: RunLeases,
}

impl Reconciler {
    pub fn new(
        api: Arc<dyn RepositoryApi>,
        credentials: Arc<dyn CredentialProvider>,
        generator: Arc<dyn LockGenerator>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            publisher: BranchPublisher::new(api.clone()),
            proposer: PullRequestProposer::new(api.clone()),
            api,
            credentials,
            generator,
            settings,
            leases: RunLeases::new(),
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Leases shared by every run of this reconciler.
    pub fn leases(&self) -> &RunLeases {
        &self.leases
    }

    pub async fn reconcile(&self, subscription: &Subscription) -> ReconcileReport {
        let repo = &subscription.repository;
        let mut report = ReconcileReport::begin(repo.clone());

        let Some(lease) = self.leases.try_acquire(repo) else {
            tracing::info!(repository = %repo, "reconciliation already in flight; skipping");
            return report.skip("reconciliation already in flight");
        };
        tracing::info!(
            repository = %repo,
            installation_id = %subscription.installation_id,
            "reconciliation started",
        );

        let token = match self
            .credentials
            .installation_token(subscription.installation_id)
            .await
        {
            Ok(token) => {
                let expiry = token.expires_at().map(|at| format!("expires {at}"));
                report.ok(Step::Credential, expiry);
                Some(token)
            }
            Err(err) => {
                report.failed(Step::Credential, &err);
                None
            }
        };
        let token = token.as_ref();

        let default_branch = match self.api.default_branch(token, repo).await {
            Ok(name) => {
                report.ok(Step::DefaultBranch, Some(name.clone()));
                name
            }
            Err(err) => {
                report.failed(Step::DefaultBranch, &err);
                String::new()
            }
        };

        let workspace = match ScratchWorkspace::acquire(&self.settings.workspace_root) {
            Ok(workspace) => {
                report.ok(
                    Step::Workspace,
                    Some(workspace.path().display().to_string()),
                );
                Some(workspace)
            }
            Err(err) => {
                report.failed(Step::Workspace, &err);
                None
            }
        };

        self.generate(&mut report, repo, token, workspace.as_ref())
            .await;

        let head_sha = match self.api.list_refs(token, repo).await {
            Ok(refs) => {
                let sha = latest_sha(&refs, &default_branch);
                if sha.is_empty() {
                    report.soft(
                        Step::ResolveHead,
                        format!("no refs/heads/{default_branch} in ref listing"),
                    );
                } else {
                    report.ok(Step::ResolveHead, Some(sha.clone()));
                }
                sha
            }
            Err(err) => {
                report.failed(Step::ResolveHead, &err);
                String::new()
            }
        };

        let branch = self
            .naming_content(workspace.as_ref())
            .await
            .map(|content| BranchRef {
                name: branch_name(&self.settings.branch_policy, repo, &content),
                head_sha,
            });
        report.branch = branch.as_ref().map(|branch| branch.name.clone());

        match &branch {
            Some(branch) => match self.publisher.create_branch(token, repo, branch).await {
                Ok(()) => report.ok(Step::CreateBranch, Some(branch.qualified())),
                Err(err) if err.is_already_exists() => {
                    report.soft(Step::CreateBranch, format!("{} already exists", branch.name))
                }
                Err(err) => report.failed(Step::CreateBranch, &err),
            },
            None => report.failed(
                Step::CreateBranch,
                &"no generated docker-lock.json to derive the branch name from",
            ),
        }

        match (&workspace, &branch) {
            (Some(ws), Some(branch)) => match self
                .publisher
                .publish_lock_file(token, repo, &branch.name, ws.path())
                .await
            {
                Ok(published) => report.ok(Step::Publish, Some(publish_detail(&published))),
                Err(err) => report.failed(Step::Publish, &err),
            },
            (None, _) => report.failed(Step::Publish, &"no scratch workspace to read from"),
            (Some(_), None) => report.failed(Step::Publish, &"no branch to publish to"),
        }

        match &branch {
            Some(branch) => match self
                .proposer
                .propose(token, repo, &branch.name, &default_branch)
                .await
            {
                Ok(created) => report.ok(
                    Step::ProposePullRequest,
                    Some(format!("#{} {}", created.number, created.html_url)),
                ),
                Err(err) if err.is_already_exists() => {
                    report.soft(Step::ProposePullRequest, err.to_string())
                }
                Err(err) => report.failed(Step::ProposePullRequest, &err),
            },
            None => report.failed(Step::ProposePullRequest, &"no branch to propose"),
        }

        match workspace.map(ScratchWorkspace::release) {
            Some(Ok(())) | None => report.ok(Step::Cleanup, None),
            Some(Err(err)) => report.failed(Step::Cleanup, &err),
        }
        drop(lease);

        report.finish()
    }

    async fn generate(
        &self,
        report: &mut ReconcileReport,
        repo: &RepositoryIdentity,
        token: Option<&AccessToken>,
        workspace: Option<&ScratchWorkspace>,
    ) {
        let Some(workspace) = workspace else {
            report.failed(Step::Generate, &"no scratch workspace to generate into");
            return;
        };

        let request = GenerateRequest {
            repository: repo,
            token: token.map(AccessToken::secret).unwrap_or(""),
            workspace: workspace.path(),
        };
        match self.generator.generate(request).await {
            Ok(stdout) => {
                let stdout = stdout.trim();
                if !stdout.is_empty() {
                    tracing::info!(repository = %repo, stdout = %stdout, "generator output");
                }
                report.ok(Step::Generate, None);
            }
            Err(err) => report.failed(Step::Generate, &err),
        }
    }

    /// Bytes the branch policy hashes. `Fixed` needs none. `None` means the
    /// policy needs the generated file and there is none to read.
    async fn naming_content(&self, workspace: Option<&ScratchWorkspace>) -> Option<Vec<u8>> {
        match &self.settings.branch_policy {
            BranchPolicy::Fixed { .. } => Some(Vec::new()),
            BranchPolicy::ContentHash { .. } => {
                tokio::fs::read(workspace?.lock_file_path()).await.ok()
            }
        }
    }
}

fn publish_detail(published: &PublishedLockFile) -> String {
    let lock = &published.lock;
    let action = if lock.blob_sha.is_some() {
        "updated"
    } else {
        "created"
    };
    match &published.committed_sha {
        Some(sha) => format!("{action} {} ({} bytes, blob {sha})", lock.path, lock.content.len()),
        None => format!("{action} {} ({} bytes)", lock.path, lock.content.len()),
    }
}
