//! Loading prepared passages into a category's store.
//!
//! Input files are JSON arrays of `{"content": ..., "metadata": {...}}`
//! records. A directory is walked for `*.json` files.

use std::path::Path;
use std::time::Instant;

use pawtrip_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::gateway::EvidenceGateway;
use crate::types::{Category, EvidenceItem};

#[derive(Debug, Deserialize)]
struct PassageRecord {
    #[serde(alias = "page_content")]
    content: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub category: Option<Category>,
    pub files: u32,
    pub items: usize,
    pub skipped: usize,
    pub bytes: u64,
    pub duration_secs: f64,
}

/// Index every record under `path` into `category`'s store.
pub async fn index_path(
    gateway: &EvidenceGateway,
    category: Category,
    path: &Path,
    reset: bool,
) -> AppResult<IngestStats> {
    let start = Instant::now();
    tracing::info!(%category, path = %path.display(), reset, "indexing passages");

    if !path.exists() {
        return Err(AppError::Config(format!("{} does not exist", path.display())));
    }
    if reset {
        gateway.reset(category).await?;
    }

    let mut stats = IngestStats {
        category: Some(category),
        ..IngestStats::default()
    };

    if path.is_file() {
        ingest_file(gateway, category, path, &mut stats).await?;
    } else {
        for entry in WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if !entry_path.is_file() || entry_path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Err(e) = ingest_file(gateway, category, entry_path, &mut stats).await {
                tracing::warn!(path = %entry_path.display(), error = %e, "skipping file");
            }
        }
    }

    stats.duration_secs = start.elapsed().as_secs_f64();
    tracing::info!(
        %category,
        files = stats.files,
        items = stats.items,
        skipped = stats.skipped,
        "indexing finished in {:.2}s",
        stats.duration_secs
    );
    Ok(stats)
}

async fn ingest_file(
    gateway: &EvidenceGateway,
    category: Category,
    path: &Path,
    stats: &mut IngestStats,
) -> AppResult<()> {
    let raw = std::fs::read_to_string(path)?;
    let (items, skipped) = parse_passages(&raw)?;

    let added = if items.is_empty() {
        0
    } else {
        gateway.write(category, &items).await?
    };

    tracing::debug!(path = %path.display(), added, skipped, "indexed file");
    stats.files += 1;
    stats.items += added;
    stats.skipped += skipped;
    stats.bytes += raw.len() as u64;
    Ok(())
}

/// Records with blank content are skipped and counted.
fn parse_passages(raw: &str) -> AppResult<(Vec<EvidenceItem>, usize)> {
    let records: Vec<PassageRecord> = serde_json::from_str(raw)?;
    let total = records.len();

    let items: Vec<EvidenceItem> = records
        .into_iter()
        .filter(|r| !r.content.trim().is_empty())
        .map(|r| EvidenceItem::indexed(r.content, r.metadata))
        .collect();

    let skipped = total - items.len();
    Ok((items, skipped))
}
