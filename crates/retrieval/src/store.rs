//! SQLite-backed evidence stores, one database file per store name.
//!
//! Vectors are stored as little-endian `f32` BLOBs and scored in process
//! with cosine similarity. Item ids are content hashes, so writing the same
//! passage twice replaces it instead of duplicating it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pawtrip_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::embeddings::EmbeddingProvider;
use crate::gateway::EvidenceStore;
use crate::types::EvidenceItem;

/// Open (creating if needed) a store database.
pub fn open_store(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Store(format!("Failed to create store directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL,
            added_at TEXT NOT NULL
        );
        "#,
    )?;

    tracing::debug!("Opened evidence store at {:?}", db_path);
    Ok(conn)
}

/// Stable id for an item: SHA-256 of its content.
pub fn item_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Insert or replace one item.
pub fn insert_item(conn: &Connection, item: &EvidenceItem, embedding: &[f32]) -> AppResult<()> {
    let metadata_json = serde_json::to_string(item.metadata())?;

    conn.execute(
        "INSERT OR REPLACE INTO items (id, content, embedding, metadata, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            item_id(item.content()),
            item.content(),
            embedding_to_bytes(embedding),
            metadata_json,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// Top-k items by cosine distance (ascending). Ties keep insertion order.
pub fn query_items(
    conn: &Connection,
    query_embedding: &[f32],
    k: usize,
) -> AppResult<Vec<(EvidenceItem, f32)>> {
    let mut stmt =
        conn.prepare("SELECT content, embedding, metadata FROM items ORDER BY rowid")?;

    let rows = stmt.query_map([], |row| {
        let content: String = row.get(0)?;
        let embedding: Vec<u8> = row.get(1)?;
        let metadata: String = row.get(2)?;
        Ok((content, embedding, metadata))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (content, embedding_bytes, metadata_json) = row?;

        let embedding = match bytes_to_embedding(&embedding_bytes) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Skipping item with corrupt embedding: {}", e);
                continue;
            }
        };

        let metadata: Map<String, Value> = serde_json::from_str(&metadata_json).unwrap_or_default();
        let distance = 1.0 - cosine_similarity(query_embedding, &embedding);
        if !distance.is_finite() {
            tracing::warn!("Skipping item with non-finite distance");
            continue;
        }
        results.push((EvidenceItem::indexed(content, metadata), distance));
    }

    // Stable: equal distances keep insertion order.
    results.sort_by(|a, b| a.1.total_cmp(&b.1));
    results.truncate(k);

    tracing::debug!("Retrieved {} items (requested top-{})", results.len(), k);
    Ok(results)
}

pub fn count_items(conn: &Connection) -> AppResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

pub fn reset_store(conn: &Connection) -> AppResult<()> {
    conn.execute("DELETE FROM items", [])?;
    Ok(())
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Store(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// [`EvidenceStore`] over a directory of SQLite files.
///
/// Each call opens its own connection on a blocking thread, so reads from
/// different tasks never share a handle.
#[derive(Debug, Clone)]
pub struct SqliteEvidenceStore {
    dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteEvidenceStore {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            dir: dir.into(),
            embedder,
        }
    }

    pub fn path_for(&self, store: &str) -> PathBuf {
        self.dir.join(format!("{}.sqlite", store))
    }

    async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| AppError::Store(format!("Store task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl EvidenceStore for SqliteEvidenceStore {
    async fn search(&self, store: &str, query: &str, k: usize) -> AppResult<Vec<(EvidenceItem, f32)>> {
        let path = self.path_for(store);
        if !path.exists() {
            return Err(AppError::Store(format!("Store '{}' has not been built", store)));
        }

        let embedding = self.embedder.embed(query).await?;
        self.blocking(move || {
            let conn = open_store(&path)?;
            query_items(&conn, &embedding, k)
        })
        .await
    }

    async fn add_items(&self, store: &str, items: &[EvidenceItem]) -> AppResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = items.iter().map(|i| i.content().to_string()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != items.len() {
            return Err(AppError::Store(format!(
                "Embedder returned {} vectors for {} items",
                embeddings.len(),
                items.len()
            )));
        }
        let path = self.path_for(store);
        let items = items.to_vec();

        self.blocking(move || {
            let mut conn = open_store(&path)?;
            let tx = conn.transaction()?;
            for (item, embedding) in items.iter().zip(embeddings.iter()) {
                insert_item(&tx, item, embedding)?;
            }
            tx.commit()?;
            Ok(items.len())
        })
        .await
    }

    async fn count(&self, store: &str) -> AppResult<usize> {
        let path = self.path_for(store);
        if !path.exists() {
            return Ok(0);
        }
        self.blocking(move || count_items(&open_store(&path)?)).await
    }

    async fn exists(&self, store: &str) -> bool {
        self.path_for(store).exists()
    }

    async fn reset(&self, store: &str) -> AppResult<()> {
        let path = self.path_for(store);
        self.blocking(move || reset_store(&open_store(&path)?)).await?;
        tracing::info!(store, "Reset evidence store");
        Ok(())
    }
}
