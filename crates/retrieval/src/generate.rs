//! Answer generation from the evidence bundle.

use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use pawtrip_core::AppResult;
use pawtrip_llm::LlmClient;
use pawtrip_prompt::{build_prompt, builtin, load_prompt, PromptDefinition};

use crate::bundle::EvidenceBundle;
use crate::classify::llm_request;
use crate::types::Intent;

const UNSPECIFIED: &str = "정보 없음";
const NO_EVIDENCE: &str = "관련 정보를 찾을 수 없습니다.";

/// Streamed answer text.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Produces the user-facing answer.
#[async_trait::async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, intent: &Intent, bundle: &EvidenceBundle) -> AppResult<String>;

    async fn generate_stream(&self, query: &str, intent: &Intent, bundle: &EvidenceBundle) -> AppResult<AnswerStream>;
}

/// Variables for the answer prompt.
pub fn answer_vars(query: &str, intent: &Intent, bundle: &EvidenceBundle) -> HashMap<String, String> {
    let or_unspecified = |v: Option<String>| v.unwrap_or_else(|| UNSPECIFIED.to_string());
    let sections = if bundle.is_empty() {
        NO_EVIDENCE.to_string()
    } else {
        bundle.render_sections()
    };

    HashMap::from([
        ("query".to_string(), query.to_string()),
        ("region".to_string(), or_unspecified(intent.region.clone())),
        ("subject".to_string(), or_unspecified(intent.subject.clone())),
        (
            "duration".to_string(),
            or_unspecified(intent.duration.as_ref().map(ToString::to_string)),
        ),
        ("sections".to_string(), sections),
    ])
}

/// Generator backed by the `pawtrip.answer` prompt.
pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            llm,
            model: model.into(),
            prompt: load_prompt(workspace, builtin::ANSWER)?,
        })
    }
}

#[async_trait::async_trait]
impl AnswerGenerator for LlmGenerator {
    async fn generate(&self, query: &str, intent: &Intent, bundle: &EvidenceBundle) -> AppResult<String> {
        let built = build_prompt(&self.prompt, answer_vars(query, intent, bundle))?;
        let response = self.llm.complete(&llm_request(built, &self.model)).await?;
        tracing::debug!(
            tokens = response.usage.total_tokens,
            chars = response.content.chars().count(),
            "answer generated"
        );
        Ok(response.content)
    }

    async fn generate_stream(&self, query: &str, intent: &Intent, bundle: &EvidenceBundle) -> AppResult<AnswerStream> {
        let built = build_prompt(&self.prompt, answer_vars(query, intent, bundle))?;
        let request = llm_request(built, &self.model).with_streaming();
        let chunks = self.llm.stream(&request).await?;

        Ok(Box::pin(chunks.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) if chunk.content.is_empty() => None,
                Ok(chunk) => Some(Ok(chunk.content)),
                Err(e) => Some(Err(e)),
            }
        })))
    }
}
