//! pawtrip CLI
//!
//! Answers pet-friendly travel questions about Korea from local evidence
//! stores, topped up with live tour and weather data.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, HistoryCommand, IndexCommand, StatsCommand};
use pawtrip_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// pawtrip - pet-friendly travel answers backed by local evidence stores
#[derive(Parser, Debug)]
#[command(name = "pawtrip")]
#[command(about = "Pet-friendly travel Q&A with retrieval augmentation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PAWTRIP_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "PAWTRIP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "PAWTRIP_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "PAWTRIP_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a travel question
    Ask(AskCommand),

    /// Load passages into a category store
    Index(IndexCommand),

    /// Show evidence store sizes
    Stats(StatsCommand),

    /// Show recent store updates from external data
    History(HistoryCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format())?;

    tracing::info!("pawtrip starting");
    tracing::debug!(workspace = ?config.workspace, provider = %config.provider, model = %config.model, "configuration");

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Index(_) => "index",
        Commands::Stats(_) => "stats",
        Commands::History(_) => "history",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::Index(cmd) => cmd.execute(&config).await,
            Commands::Stats(cmd) => cmd.execute(&config).await,
            Commands::History(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
