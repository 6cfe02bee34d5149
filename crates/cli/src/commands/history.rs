//! History command handler.
//!
//! Shows what external data has been written back into the stores.

use clap::Args;
use pawtrip_core::{config::AppConfig, AppResult};
use pawtrip_retrieval::{Category, DataDirs, UpdateLog};

use super::{parse_category, print_json};

/// Show recent store updates from external data
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Only show updates for this category
    #[arg(long, value_parser = parse_category)]
    pub category: Option<Category>,

    /// Maximum number of entries
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing history command");
        tracing::debug!("History options: {:?}", self);

        let log = UpdateLog::new(DataDirs::new(&config.state_dir()).update_log);
        let entries = log.history(self.category, self.limit).await?;

        if self.json {
            return print_json(&entries);
        }

        if entries.is_empty() {
            println!("No store updates recorded");
            return Ok(());
        }

        for entry in &entries {
            println!(
                "{}  {:<12} {:<18} +{} ({})",
                entry.timestamp, entry.category, entry.store_name, entry.items_added, entry.source
            );
        }
        Ok(())
    }
}
