use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use ancestry_core::config::EngineConfig;
use ancestry_foundation::Config;

/// Inspect or validate engine configuration
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the default engine configuration as JSON
    Show,

    /// Validate a configuration file against the engine's constraints
    Validate {
        /// Path to a JSON configuration file
        path: PathBuf,
    },
}

pub async fn handle_command(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = EngineConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Validate { path } => {
            let config = EngineConfig::load(&path)?;
            config.validate()?;
            println!(
                "{} is valid (max_generations={}, {} configured sources)",
                path.display(),
                config.max_generations,
                config.sources.len()
            );
        }
    }

    Ok(())
}
