use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

mod config_cmd;
mod research;

/// ancestry - Unified CLI for the evidence-based ancestry research engine
#[derive(Parser)]
#[clap(name = "ancestry")]
#[clap(about = "Unified CLI for the evidence-based ancestry research engine")]
#[clap(version)]
#[clap(long_about = "Run research jobs over civil-record indices and genealogy-tree APIs, \
inspecting the resulting ascendancy tree and its evidence chain")]
struct Cli {
    /// Enable verbose logging
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a research job end-to-end and print the resulting ancestry tree
    Research(research::ResearchArgs),

    /// Inspect or validate engine configuration
    #[clap(subcommand)]
    Config(config_cmd::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .finish()
    };
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Research(args) => {
            if let Err(e) = research::handle_command(args).await {
                error!("Research error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Config(cmd) => {
            if let Err(e) = config_cmd::handle_command(cmd).await {
                error!("Config error: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
