//! lockbot: keeps `docker-lock.json` current in subscribed repositories.
//!
//! # Usage
//!
//! ```text
//! lockbot init
//! lockbot repo add <owner/name> --installation <id>
//! lockbot repo list [--json]
//! lockbot repo remove <owner/name>
//! lockbot reconcile <owner/name> [--daemon] [--json]
//! lockbot reconcile --all [--daemon] [--json]
//! lockbot daemon start [--json-logs] | stop | status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, init::InitArgs, reconcile::ReconcileArgs, repo::RepoCommand,
};

#[derive(Parser, Debug)]
#[command(
    name = "lockbot",
    version,
    about = "Regenerate docker-lock.json and propose it as a pull request",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default ~/.lockbot/config.yaml.
    Init(InitArgs),

    /// Manage subscribed repositories.
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },

    /// Run the reconciliation workflow now.
    Reconcile(ReconcileArgs),

    /// Run or control the background scheduler.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Repo { command } => commands::repo::run(command),
        Commands::Reconcile(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
