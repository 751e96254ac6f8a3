//! # lockbot-reconcile
//!
//! The reconciliation workflow: regenerate `docker-lock.json` in a scratch
//! workspace, publish it on a lock branch, and propose it as a pull request.
//!
//! Call [`Reconciler::reconcile`] for one subscription, or [`pipeline::run`]
//! for a concurrent pass over many. Neither surfaces per-step failures as
//! errors; they are recorded in the returned [`ReconcileReport`].

pub mod branch;
pub mod error;
pub mod generator;
pub mod lease;
pub mod pipeline;
pub mod proposer;
pub mod publisher;
pub mod report;
pub mod workflow;
pub mod workspace;

pub use branch::branch_name;
pub use error::{GeneratorError, PublishError, ReconcileError, WorkspaceError};
pub use generator::{CommandLockGenerator, GenerateRequest, LockGenerator};
pub use lease::{RunLease, RunLeases};
pub use pipeline::{build_reconciler, ReconcileScope};
pub use proposer::PullRequestProposer;
pub use publisher::{
    existing_blob_sha, latest_sha, BranchPublisher, PublishedLockFile, COMMIT_MESSAGE,
};
pub use report::{ReconcileReport, RunStatus, Step, StepOutcome, StepRecord};
pub use workflow::{ReconcileSettings, Reconciler};
pub use workspace::ScratchWorkspace;
