//! Index command handler.
//!
//! Loads prepared passages into a category store.

use std::path::PathBuf;

use clap::Args;
use pawtrip_core::{config::AppConfig, AppError, AppResult};
use pawtrip_retrieval::{index_path, open_gateway, store_name, Category};

use super::{parse_category, pipeline_config, print_json};

/// Load passages into a category store
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Category: attractions|관광지, lodging|숙박, transit|대중교통
    #[arg(value_parser = parse_category)]
    pub category: Category,

    /// JSON file or directory of JSON files with `{content, metadata}` records
    #[arg(long)]
    pub path: PathBuf,

    /// Clear the store before loading
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");
        tracing::debug!("Index options: {:?}", self);

        let Some(store) = store_name(self.category) else {
            return Err(AppError::Config(format!(
                "{} is fetched live and cannot be indexed",
                self.category.label()
            )));
        };

        let pipeline = pipeline_config(config)?;
        let (gateway, _) = open_gateway(&config.state_dir(), &pipeline)?;
        let stats = index_path(&gateway, self.category, &self.path, self.reset).await?;

        if self.json {
            return print_json(&stats);
        }

        println!(
            "Indexed {} passages from {} files into {} ({} skipped) in {:.2}s",
            stats.items, stats.files, store, stats.skipped, stats.duration_secs
        );
        Ok(())
    }
}
