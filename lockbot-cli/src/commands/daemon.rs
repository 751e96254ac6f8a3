//! `lockbot daemon`: foreground scheduler and its control socket.

use anyhow::{Context, Result};
use clap::Subcommand;

use lockbot_daemon::{start_blocking, DaemonClient, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the scheduler in the foreground until stopped.
    Start {
        /// Log JSON lines instead of human-readable text.
        #[arg(long)]
        json_logs: bool,
    },
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon status over the Unix socket.
    Status,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    let client = DaemonClient::new(&home);

    match command {
        DaemonCommand::Start { json_logs } => {
            start_blocking(&home, json_logs).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match client.stop() {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match client.status() {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": client.socket().display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
    }

    Ok(())
}
