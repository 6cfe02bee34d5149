//! Command handlers for the pawtrip CLI.

pub mod ask;
pub mod history;
pub mod index;
pub mod stats;

pub use ask::AskCommand;
pub use history::HistoryCommand;
pub use index::IndexCommand;
pub use stats::StatsCommand;

use pawtrip_core::{config::AppConfig, AppError, AppResult};
use pawtrip_retrieval::{Category, PipelineConfig};

/// Pipeline settings from the workspace's state directory.
pub(crate) fn pipeline_config(config: &AppConfig) -> AppResult<PipelineConfig> {
    PipelineConfig::load(&config.state_dir())
}

/// clap value parser for category names (Korean or English).
pub(crate) fn parse_category(raw: &str) -> Result<Category, String> {
    raw.parse()
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
