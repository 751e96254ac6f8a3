//! `lockbot repo add|list|remove`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use lockbot_core::{config, InstallationId, RepositoryIdentity, Subscription};

#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Subscribe a repository (or update its installation id).
    Add(AddArgs),

    /// List subscribed repositories.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Unsubscribe a repository.
    Remove {
        /// Repository as `owner/name`.
        repository: RepositoryIdentity,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository as `owner/name`.
    pub repository: RepositoryIdentity,

    /// App installation id that owns the repository.
    #[arg(long, short = 'i')]
    pub installation: u64,
}

pub fn run(cmd: RepoCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    match cmd {
        RepoCommand::Add(args) => {
            let repository = args.repository.clone();
            let added = config::add_repository_at(
                &home,
                Subscription {
                    repository: args.repository,
                    installation_id: InstallationId(args.installation),
                },
            )
            .with_context(|| format!("failed to add '{repository}'; run `lockbot init` first"))?;
            if added {
                println!("✓ Subscribed '{repository}' (installation {})", args.installation);
            } else {
                println!(
                    "✓ '{repository}' already subscribed; installation set to {}",
                    args.installation
                );
            }
        }
        RepoCommand::List { json } => list(&home, json)?,
        RepoCommand::Remove { repository } => {
            let removed = config::remove_repository_at(&home, &repository)
                .with_context(|| format!("failed to remove '{repository}'"))?;
            if removed {
                println!("✓ Unsubscribed '{repository}'");
            } else {
                println!("'{repository}' was not subscribed");
            }
        }
    }
    Ok(())
}

#[derive(Serialize, Tabled)]
struct RepoRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "installation")]
    installation_id: u64,
}

fn list(home: &std::path::Path, json: bool) -> Result<()> {
    let config =
        config::load_at(home).context("failed to load config; run `lockbot init` first")?;
    let rows: Vec<RepoRow> = config
        .repositories
        .iter()
        .map(|sub| RepoRow {
            repository: sub.repository.to_string(),
            installation_id: sub.installation_id.0,
        })
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("failed to serialize repository list")?
        );
        return Ok(());
    }

    if rows.is_empty() {
        println!("No repositories subscribed.");
        println!("Run: lockbot repo add <owner/name> --installation <id>");
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
