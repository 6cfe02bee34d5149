//! Stats command handler.

use clap::Args;
use pawtrip_core::{config::AppConfig, AppResult};
use pawtrip_retrieval::open_gateway;

use super::{pipeline_config, print_json};

/// Show evidence store sizes
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let pipeline = pipeline_config(config)?;
        let (gateway, _) = open_gateway(&config.state_dir(), &pipeline)?;
        let stats = gateway.stats().await?;

        if self.json {
            return print_json(&stats);
        }

        println!("{:<10} {:<20} {:>8}", "CATEGORY", "STORE", "ITEMS");
        for s in &stats {
            let items = if s.exists {
                s.items.to_string()
            } else {
                "-".to_string()
            };
            println!("{:<10} {:<20} {:>8}", s.category.label(), s.store_name, items);
        }
        Ok(())
    }
}
