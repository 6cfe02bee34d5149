//! Builds the configured LLM client.

use std::sync::Arc;
use std::time::Duration;

use pawtrip_core::config::ProviderConfig;
use pawtrip_core::{AppConfig, AppError, AppResult};

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    OpenAI,
}

impl ProviderType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "openai-compatible" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }
}

/// Create a client for a named provider.
///
/// `endpoint` overrides the provider's default base URL. OpenAI requires
/// `api_key`.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    match provider_type {
        ProviderType::Ollama => {
            let client = match endpoint {
                Some(url) => OllamaClient::with_base_url(url),
                None => OllamaClient::new(),
            };
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires an API key".to_string())
            })?;
            let client = match endpoint {
                Some(url) => OpenAiClient::with_base_url(url, key),
                None => OpenAiClient::new(key),
            };
            Ok(Arc::new(client))
        }
    }
}

/// Create the client for the active provider in `config`.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = config.provider_endpoint();
    let api_key = config.resolve_api_key(&config.provider);

    tracing::debug!(provider = %config.provider, ?endpoint, "creating LLM client");

    // Ollama carries its own request timeout in config.yaml.
    if let Some(ProviderConfig::Ollama {
        endpoint,
        timeout: Some(secs),
        ..
    }) = provider_config
    {
        let client = OllamaClient::with_base_url(endpoint.as_str())
            .with_timeout(Duration::from_secs(*secs));
        return Ok(Arc::new(client));
    }

    create_client(&config.provider, endpoint, api_key.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("OpenAI"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("claude"), None);
        assert_eq!(ProviderType::OpenAI.as_str(), "openai");
    }

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_openai_with_key() {
        let client = create_client("openai", Some("http://localhost:8000/v1"), Some("k")).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", None, None) {
            Err(AppError::Config(msg)) => assert!(msg.contains("requires an API key")),
            _ => panic!("expected config error"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        assert!(matches!(
            create_client("gguf", None, None),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_client_from_default_config() {
        let client = client_from_config(&AppConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }
}
