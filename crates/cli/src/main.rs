//! Banterbot CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Connect to Slack and start responding
//! - `doctor`  — Diagnose config and credentials
//! - `onboard` — Write a default config file
//! - `prompt`  — Render a saved history file as model context

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "banterbot",
    about = "Banterbot — talks back when a Slack channel gets busy",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect over Socket Mode and respond until Ctrl-C
    Run,

    /// Diagnose configuration and credentials
    Doctor,

    /// Write a default config file
    Onboard,

    /// Render a JSON history file the way the responder would
    Prompt {
        /// JSON array of `{author, text, timestamp}` objects
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run => commands::run::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Prompt { file } => commands::prompt::run(&file).await?,
    }

    Ok(())
}
