//! `lockbot reconcile`: run the workflow in-process or through the daemon.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use lockbot_core::{config, RepositoryIdentity};
use lockbot_daemon::DaemonClient;
use lockbot_reconcile::pipeline::{self, ReconcileScope};
use lockbot_reconcile::{build_reconciler, ReconcileReport, RunStatus, StepOutcome};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Repository as `owner/name` (omit when using `--all`).
    #[arg(required_unless_present = "all")]
    pub repository: Option<RepositoryIdentity>,

    /// Reconcile every subscribed repository.
    #[arg(long, conflicts_with = "repository")]
    pub all: bool,

    /// Ask the running daemon to do it instead of running in-process.
    #[arg(long)]
    pub daemon: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReconcileArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;

        let reports = if self.daemon {
            via_daemon(&home, self.repository)?
        } else {
            in_process(&home, self.repository)?
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&reports).context("failed to render reports")?
            );
        } else {
            print_table(&reports);
        }

        let failed = reports
            .iter()
            .filter(|r| matches!(r.status, RunStatus::Failed { .. }))
            .count();
        if failed > 0 {
            bail!("{failed} reconciliation(s) reached neither the file nor the pull request");
        }
        Ok(())
    }
}

fn in_process(home: &Path, repository: Option<RepositoryIdentity>) -> Result<Vec<ReconcileReport>> {
    lockbot_daemon::init_tracing(false);
    let config = config::load_at(home).context("failed to load config; run `lockbot init` first")?;
    let reconciler = build_reconciler(home, &config).context("failed to set up reconciler")?;
    let scope = match repository {
        Some(repository) => ReconcileScope::Repository(repository),
        None => ReconcileScope::All,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime
        .block_on(pipeline::run(
            Arc::new(reconciler),
            &config.repositories,
            scope,
        ))
        .context("reconcile failed")
}

/// Ask the daemon for a pass and pull the reports out of its summary.
fn via_daemon(home: &Path, repository: Option<RepositoryIdentity>) -> Result<Vec<ReconcileReport>> {
    let mut summary = DaemonClient::new(home)
        .reconcile(repository.map(|r| r.to_string()))
        .context("daemon reconcile failed")?;
    let reports = summary
        .get_mut("reports")
        .map(Value::take)
        .context("daemon reply carries no reports")?;
    serde_json::from_value(reports).context("daemon reply has malformed reports")
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "failed steps")]
    failed: String,
    #[tabled(rename = "took")]
    took: String,
}

fn print_table(reports: &[ReconcileReport]) {
    if reports.is_empty() {
        println!("No repositories subscribed. Run `lockbot repo add` first.");
        return;
    }

    let rows: Vec<ReportRow> = reports
        .iter()
        .map(|report| ReportRow {
            repository: report.repository.to_string(),
            status: status_label(&report.status),
            branch: report.branch.clone().unwrap_or_default(),
            failed: report
                .failed_steps()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            took: format!("{}ms", report.duration_ms()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for report in reports {
        for record in &report.steps {
            if let StepOutcome::Failed { error } = &record.outcome {
                println!("  {} {} {}: {error}", "✗".red(), report.repository, record.step);
            }
        }
    }
}

fn status_label(status: &RunStatus) -> String {
    match status {
        RunStatus::Succeeded => "SUCCEEDED".green().bold().to_string(),
        RunStatus::Partial { .. } => "PARTIAL".yellow().bold().to_string(),
        RunStatus::Failed { .. } => "FAILED".red().bold().to_string(),
        RunStatus::Skipped { .. } => "SKIPPED".bright_black().bold().to_string(),
    }
}
