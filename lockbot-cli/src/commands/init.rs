//! `lockbot init`

use anyhow::{Context, Result};
use clap::Args;

use lockbot_core::config;

#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let existed = config::config_path_at(&home).exists();
        let config = config::init_at(&home).context("failed to write lockbot config")?;

        let path = config::config_path_at(&home);
        if existed {
            println!("✓ Config already present at {}", path.display());
        } else {
            println!("✓ Wrote default config to {}", path.display());
        }
        println!(
            "  {} repositories, every {}s, generator '{}'",
            config.repositories.len(),
            config.interval().as_secs(),
            config.generator.program.display()
        );
        if config.repositories.is_empty() {
            println!("Next: lockbot repo add <owner/name> --installation <id>");
        }
        Ok(())
    }
}
