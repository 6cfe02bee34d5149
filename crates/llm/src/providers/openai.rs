//! OpenAI-compatible chat completions backend.
//!
//! Works against api.openai.com or any server exposing
//! `/v1/chat/completions` with server-sent events for streaming.

use std::time::Duration;

use futures::StreamExt;
use pawtrip_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use super::lines::LineBuffer;
use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat endpoint.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_OPENAI_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn body<'a>(&self, request: &'a LlmRequest, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request, stream));
        if let (false, Some(timeout)) = (stream, self.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to reach {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "Chat completion returned {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

/// Parse one SSE line. `None` means the line carries nothing to emit.
fn parse_event(line: &str) -> Option<AppResult<LlmStreamChunk>> {
    let data = line.strip_prefix("data:")?.trim();

    if data == "[DONE]" {
        return Some(Ok(LlmStreamChunk::finished("", None)));
    }

    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(AppError::Llm(format!("Malformed SSE event: {}", e)))),
    };

    let content: String = chunk
        .choices
        .iter()
        .filter_map(|choice| choice.delta.content.as_deref())
        .collect();
    let finished = chunk.choices.iter().any(|c| c.finish_reason.is_some());

    if content.is_empty() && !finished && chunk.usage.is_none() {
        return None;
    }

    Some(Ok(LlmStreamChunk {
        content,
        model: chunk.model,
        done: false,
        usage: chunk.usage,
    }))
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "chat completion");

        let parsed: ChatResponse = self
            .send(request, false)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed chat completion: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm("Chat completion had no choices".to_string()))?;

        Ok(LlmResponse {
            content,
            model: parsed.model,
            usage: parsed.usage.unwrap_or_default(),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "chat completion stream");

        let response = self.send(request, true).await?;
        let mut buffer = LineBuffer::default();

        let chunks = response
            .bytes_stream()
            .map(move |result| match result {
                Ok(bytes) => buffer
                    .push(&bytes)
                    .iter()
                    .filter_map(|line| parse_event(line))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(AppError::Llm(format!("SSE stream error: {}", e)))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(chunks))
    }
}
