//! LLM access for pawtrip.
//!
//! The retrieval pipeline talks to a language model in three places:
//! category classification, intent extraction and answer generation. All of
//! them go through the [`LlmClient`] trait so the backend is swappable.
//!
//! # Providers
//! - **Ollama**: local runtime (default)
//! - **OpenAI**: any OpenAI-compatible chat completions endpoint
//!
//! # Example
//! ```no_run
//! use pawtrip_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("속초에서 강아지와 갈 만한 곳", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::{client_from_config, create_client, ProviderType};
pub use providers::{OllamaClient, OpenAiClient};
