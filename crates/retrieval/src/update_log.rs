//! Append-only record of writes made to the evidence stores.
//!
//! The log is a single JSON document `{"updates": [...]}` holding the most
//! recent [`MAX_ENTRIES`] entries. It is for observability only; nothing in
//! the pipeline reads it back.

use std::path::{Path, PathBuf};

use chrono::DateTime;
use pawtrip_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::types::Category;

pub const MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// RFC 3339
    pub timestamp: String,
    pub category: String,
    pub store_name: String,
    pub items_added: usize,
    pub source: String,
}

impl UpdateEntry {
    pub fn external(category: Category, store_name: &str, items_added: usize) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            category: category.as_str().to_string(),
            store_name: store_name.to_string(),
            items_added,
            source: "external_api".to_string(),
        }
    }

    /// Timestamp as UTC milliseconds; unparseable stamps sort oldest.
    fn instant(&self) -> i64 {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.timestamp_millis())
            .unwrap_or(i64::MIN)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UpdateDocument {
    #[serde(default)]
    updates: Vec<UpdateEntry>,
}

/// File-backed update log. Appends are serialized through an internal lock
/// and file access runs on the blocking pool.
#[derive(Debug)]
pub struct UpdateLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UpdateLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: UpdateEntry) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();

        let entries = blocking(move || {
            let mut document = read_document(&path)?;
            document.updates.push(entry);
            if document.updates.len() > MAX_ENTRIES {
                let excess = document.updates.len() - MAX_ENTRIES;
                document.updates.drain(..excess);
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
            Ok(document.updates.len())
        })
        .await?;

        tracing::debug!(entries, "update log written");
        Ok(())
    }

    /// Newest-first entries, optionally for one category.
    pub async fn history(&self, category: Option<Category>, limit: usize) -> AppResult<Vec<UpdateEntry>> {
        let path = self.path.clone();
        let mut updates = blocking(move || read_document(&path)).await?.updates;

        if let Some(category) = category {
            updates.retain(|u| u.category == category.as_str());
        }

        // Stable: entries with the same instant stay newest-appended first.
        updates.reverse();
        updates.sort_by_key(|u| std::cmp::Reverse(u.instant()));
        updates.truncate(limit);
        Ok(updates)
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Other(format!("Update log task failed: {}", e)))?
}

fn read_document(path: &Path) -> AppResult<UpdateDocument> {
    if !path.exists() {
        return Ok(UpdateDocument::default());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
