//! Ollama backend (`/api/generate`).

use std::time::Duration;

use futures::StreamExt;
use pawtrip_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use super::lines::LineBuffer;
use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize, PartialEq)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl GenerateResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    /// Applied to non-streaming calls only
    timeout: Option<Duration>,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn body<'a>(&self, request: &'a LlmRequest, stream: bool) -> GenerateRequest<'a> {
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream,
            options,
        }
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let mut builder = self.client.post(&url).json(&self.body(request, stream));
        if let (false, Some(timeout)) = (stream, self.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to reach Ollama at {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("Ollama returned {}: {}", status, body)));
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_line(line: &str) -> AppResult<LlmStreamChunk> {
    let parsed: GenerateResponse = serde_json::from_str(line)
        .map_err(|e| AppError::Llm(format!("Malformed Ollama chunk: {}", e)))?;
    let usage = parsed.done.then(|| parsed.usage());

    Ok(LlmStreamChunk {
        content: parsed.response,
        model: parsed.model,
        done: parsed.done,
        usage,
    })
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "ollama completion");

        let parsed: GenerateResponse = self
            .send(request, false)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed Ollama response: {}", e)))?;

        let usage = parsed.usage();
        tracing::debug!(tokens = usage.total_tokens, "ollama completion finished");

        Ok(LlmResponse {
            content: parsed.response,
            model: parsed.model,
            usage,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "ollama stream");

        let response = self.send(request, true).await?;
        let mut buffer = LineBuffer::default();

        let chunks = response
            .bytes_stream()
            .map(move |result| match result {
                Ok(bytes) => buffer
                    .push(&bytes)
                    .iter()
                    .map(|line| parse_line(line))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(AppError::Llm(format!("Ollama stream error: {}", e)))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(chunks))
    }
}
