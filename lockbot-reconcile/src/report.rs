//! Typed outcome of one reconciliation run.
//!
//! Each step's outcome is logged as it is recorded, so the report and the log
//! stream always agree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lockbot_core::RepositoryIdentity;

/// Workflow steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Credential,
    DefaultBranch,
    Workspace,
    Generate,
    ResolveHead,
    CreateBranch,
    Publish,
    ProposePullRequest,
    Cleanup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Credential => "credential",
            Step::DefaultBranch => "default_branch",
            Step::Workspace => "workspace",
            Step::Generate => "generate",
            Step::ResolveHead => "resolve_head",
            Step::CreateBranch => "create_branch",
            Step::Publish => "publish",
            Step::ProposePullRequest => "propose_pull_request",
            Step::Cleanup => "cleanup",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Expected remote state (branch or proposal already exists, head
    /// unresolved); the run carries on with it.
    Soft { detail: String },
    Failed { error: String },
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// No step failed.
    Succeeded,
    /// Some steps failed but something reached the repository.
    Partial { failed: Vec<Step> },
    /// Neither the file nor the pull request reached the repository.
    Failed { failed: Vec<Step> },
    /// The run never started.
    Skipped { reason: String },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Partial { .. } => "partial",
            RunStatus::Failed { .. } => "failed",
            RunStatus::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub repository: RepositoryIdentity,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub steps: Vec<StepRecord>,
    pub status: RunStatus,
}

impl ReconcileReport {
    pub(crate) fn begin(repository: RepositoryIdentity) -> Self {
        let now = Utc::now();
        Self {
            repository,
            started_at: now,
            finished_at: now,
            branch: None,
            steps: Vec::new(),
            status: RunStatus::Succeeded,
        }
    }

    pub(crate) fn ok(&mut self, step: Step, detail: Option<String>) {
        tracing::info!(
            repository = %self.repository,
            step = %step,
            detail = detail.as_deref().unwrap_or(""),
            "step succeeded",
        );
        self.steps.push(StepRecord {
            step,
            outcome: StepOutcome::Ok { detail },
        });
    }

    pub(crate) fn soft(&mut self, step: Step, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(
            repository = %self.repository,
            step = %step,
            detail = %detail,
            "step hit existing remote state; continuing",
        );
        self.steps.push(StepRecord {
            step,
            outcome: StepOutcome::Soft { detail },
        });
    }

    pub(crate) fn failed(&mut self, step: Step, error: &dyn fmt::Display) {
        let error = error.to_string();
        tracing::error!(
            repository = %self.repository,
            step = %step,
            error = %error,
            "step failed; continuing",
        );
        self.steps.push(StepRecord {
            step,
            outcome: StepOutcome::Failed { error },
        });
    }

    pub(crate) fn skip(mut self, reason: impl Into<String>) -> Self {
        self.finished_at = Utc::now();
        self.status = RunStatus::Skipped {
            reason: reason.into(),
        };
        self
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.status = classify(&self.steps);
        tracing::info!(
            repository = %self.repository,
            status = self.status.label(),
            duration_ms = self.duration_ms(),
            "reconciliation finished",
        );
        self
    }

    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.outcome)
    }

    pub fn failed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|record| record.outcome.is_failed())
            .map(|record| record.step)
            .collect()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

fn classify(steps: &[StepRecord]) -> RunStatus {
    let failed: Vec<Step> = steps
        .iter()
        .filter(|record| record.outcome.is_failed())
        .map(|record| record.step)
        .collect();
    if failed.is_empty() {
        return RunStatus::Succeeded;
    }

    let reached_repository = steps.iter().any(|record| {
        matches!(record.step, Step::Publish | Step::ProposePullRequest)
            && !record.outcome.is_failed()
    });
    if reached_repository {
        RunStatus::Partial { failed }
    } else {
        RunStatus::Failed { failed }
    }
}
