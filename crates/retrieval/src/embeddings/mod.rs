//! Text embeddings for the evidence stores.

mod ollama;
mod trigram;

pub use ollama::OllamaEmbeddingProvider;
pub use trigram::TrigramProvider;

use crate::config::EmbeddingConfig;
use pawtrip_core::{AppError, AppResult};
use std::sync::Arc;

/// Turns text into fixed-size vectors.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    fn provider_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Store("No embedding returned".to_string()))
    }
}

/// Build the configured provider.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(config.dimensions))),
        "ollama" => Ok(Arc::new(OllamaEmbeddingProvider::new(
            config.endpoint.as_deref(),
            &config.model,
            config.dimensions,
        )?)),
        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}
