//! Provider-agnostic request, response and client trait.

use futures::Stream;
use pawtrip_core::AppResult;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A single-turn completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// User message
    pub prompt: String,

    /// Model identifier (e.g. "llama3.2", "gpt-4o-mini")
    pub model: String,

    /// Optional system message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature; classification calls use 0.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub stream: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// A finished completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: LlmUsage,
}

/// Token accounting as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub done: bool,
    /// Only set on the final chunk, and only by providers that report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

impl LlmStreamChunk {
    /// Terminal chunk with no content.
    pub fn finished(model: impl Into<String>, usage: Option<LlmUsage>) -> Self {
        Self {
            content: String::new(),
            model: model.into(),
            done: true,
            usage,
        }
    }
}

/// Stream of completion chunks.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// A language-model backend.
///
/// The retrieval pipeline only ever sees `Arc<dyn LlmClient>`, so tests can
/// substitute a scripted client.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name, e.g. "ollama" or "openai".
    fn provider_name(&self) -> &str;

    /// Run a completion and return the whole answer.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Run a completion and return chunks as they arrive.
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;
}
