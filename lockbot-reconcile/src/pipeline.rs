//! Shared reconcile entrypoint used by the CLI and the daemon.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;

use lockbot_core::config::lockbot_root;
use lockbot_core::{Config, CredentialsConfig, RepositoryIdentity, Subscription};
use lockbot_github::{AppCredentialProvider, CredentialProvider, EnvTokenProvider, GitHubClient};

use crate::error::ReconcileError;
use crate::generator::CommandLockGenerator;
use crate::report::ReconcileReport;
use crate::workflow::{ReconcileSettings, Reconciler};

/// Scope for a reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Every subscribed repository.
    All,
    /// A single subscribed repository.
    Repository(RepositoryIdentity),
}

/// Wire the production client, credential provider and generator from config.
pub fn build_reconciler(home: &Path, config: &Config) -> Result<Reconciler, ReconcileError> {
    let client = GitHubClient::new(&config.api_base_url)?;

    let credentials: Arc<dyn CredentialProvider> = match &config.credentials {
        CredentialsConfig::TokenEnv { var } => Arc::new(EnvTokenProvider::new(var.clone())),
        CredentialsConfig::App {
            app_id,
            private_key_path,
        } => {
            // Relative key paths are resolved against ~/.lockbot.
            let key_path = if private_key_path.is_absolute() {
                private_key_path.clone()
            } else {
                lockbot_root(home).join(private_key_path)
            };
            Arc::new(AppCredentialProvider::from_pem_file(
                client.clone(),
                *app_id,
                &key_path,
            )?)
        }
    };

    let settings = ReconcileSettings {
        workspace_root: config.workspace_root_at(home),
        branch_policy: config.branch.clone(),
    };

    Ok(Reconciler::new(
        Arc::new(client),
        credentials,
        Arc::new(CommandLockGenerator::from_config(&config.generator)),
        settings,
    ))
}

/// Run every subscription in `scope` concurrently and collect the reports,
/// sorted by repository.
///
/// A run for a repository that already has one in flight comes back as a
/// skipped report. A run that panics is logged and left out.
pub async fn run(
    reconciler: Arc<Reconciler>,
    subscriptions: &[Subscription],
    scope: ReconcileScope,
) -> Result<Vec<ReconcileReport>, ReconcileError> {
    let selected: Vec<Subscription> = match scope {
        ReconcileScope::All => subscriptions.to_vec(),
        ReconcileScope::Repository(repository) => {
            let subscription = subscriptions
                .iter()
                .find(|sub| sub.repository == repository)
                .ok_or(ReconcileError::UnknownRepository(repository))?;
            vec![subscription.clone()]
        }
    };

    let mut tasks = JoinSet::new();
    for subscription in selected {
        let reconciler = reconciler.clone();
        tasks.spawn(async move { reconciler.reconcile(&subscription).await });
    }

    let mut reports = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(err) => tracing::error!(error = %err, "reconcile task failed"),
        }
    }
    reports.sort_by(|a, b| a.repository.cmp(&b.repository));
    Ok(reports)
}
