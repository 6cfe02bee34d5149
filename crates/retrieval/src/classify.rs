//! Query classification and intent extraction over an LLM.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use pawtrip_core::{AppError, AppResult};
use pawtrip_llm::{LlmClient, LlmRequest};
use pawtrip_prompt::{build_prompt, builtin, load_prompt, BuiltPrompt, PromptDefinition};

use crate::types::{CategorySet, Intent};

/// Labels a query with categories and pulls out its travel intent.
#[async_trait::async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> AppResult<CategorySet>;

    async fn extract_intent(&self, text: &str) -> AppResult<Intent>;
}

/// Turn a rendered prompt into a request for `model`.
pub(crate) fn llm_request(prompt: BuiltPrompt, model: &str) -> LlmRequest {
    let mut request = LlmRequest::new(prompt.user, model);
    if let Some(system) = prompt.system {
        request = request.with_system(system);
    }
    if let Some(temperature) = prompt.temperature {
        request = request.with_temperature(temperature);
    }
    request
}

pub(crate) fn query_vars(text: &str) -> HashMap<String, String> {
    HashMap::from([("query".to_string(), text.to_string())])
}

/// Classifier backed by the `pawtrip.classify` and `pawtrip.intent` prompts.
pub struct LlmClassifier {
    llm: Arc<dyn LlmClient>,
    model: String,
    classify_prompt: PromptDefinition,
    intent_prompt: PromptDefinition,
}

impl LlmClassifier {
    /// Load both prompts, honouring workspace overrides.
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            llm,
            model: model.into(),
            classify_prompt: load_prompt(workspace, builtin::CLASSIFY)?,
            intent_prompt: load_prompt(workspace, builtin::INTENT)?,
        })
    }

    async fn ask(&self, prompt: &PromptDefinition, text: &str) -> AppResult<String> {
        let built = build_prompt(prompt, query_vars(text))?;
        let response = self.llm.complete(&llm_request(built, &self.model)).await?;
        tracing::debug!(prompt = %prompt.id, raw = %response.content, "classifier output");
        Ok(response.content)
    }
}

#[async_trait::async_trait]
impl QueryClassifier for LlmClassifier {
    async fn classify(&self, text: &str) -> AppResult<CategorySet> {
        let raw = self.ask(&self.classify_prompt, text).await?;
        Ok(CategorySet::from_raw(&raw))
    }

    async fn extract_intent(&self, text: &str) -> AppResult<Intent> {
        let raw = self.ask(&self.intent_prompt, text).await?;
        parse_intent(&raw)
    }
}

/// Parse the first `{...}` span of extractor output.
///
/// Models often wrap the object in prose or code fences.
fn parse_intent(raw: &str) -> AppResult<Intent> {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(AppError::Serialization(format!("no JSON object in extractor output: {}", raw.trim())));
    };
    if end < start {
        return Err(AppError::Serialization("malformed extractor output".to_string()));
    }

    let value: serde_json::Value = serde_json::from_str(&raw[start..=end])?;
    Ok(Intent::from_json(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Duration};
    use pawtrip_llm::{LlmResponse, LlmStream, LlmUsage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replies with the configured text and remembers the last request.
    struct Scripted {
        reply: String,
        last: Mutex<Option<LlmRequest>>,
    }

    impl Scripted {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for Scripted {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }

        async fn stream(&self, _request: &LlmRequest) -> AppResult<LlmStream> {
            Err(AppError::Llm("not scripted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_classify_normalizes_output() {
        let dir = TempDir::new().unwrap();
        let llm = Scripted::new("관광지, 숙박");
        let classifier = LlmClassifier::new(llm.clone(), "test-model", dir.path()).unwrap();

        let categories = classifier.classify("속초에 강아지랑 1박 2일").await.unwrap();
        assert!(categories.contains(Category::Attractions));
        assert!(categories.contains(Category::Lodging));
        assert_eq!(categories.len(), 2);

        let request = llm.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "test-model");
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.prompt.contains("속초에 강아지랑 1박 2일"));
    }

    #[tokio::test]
    async fn test_extract_intent_from_fenced_json() {
        let dir = TempDir::new().unwrap();
        let llm = Scripted::new("```json\n{\"region\": \"제주도\", \"pet_type\": \"강아지\", \"days\": 3}\n```");
        let classifier = LlmClassifier::new(llm, "m", dir.path()).unwrap();

        let intent = classifier.extract_intent("제주도에 강아지랑 2박 3일").await.unwrap();
        assert_eq!(intent.region.as_deref(), Some("제주도"));
        assert_eq!(intent.subject.as_deref(), Some("강아지"));
        assert_eq!(intent.duration, Some(Duration::Days(3)));
    }

    #[test]
    fn test_parse_intent_phrase_and_null() {
        let intent = parse_intent(r#"{"region": null, "pet_type": "고양이", "days": "주말"}"#).unwrap();
        assert_eq!(intent.region, None);
        assert_eq!(intent.duration, Some(Duration::Phrase("주말".to_string())));
    }

    #[test]
    fn test_parse_intent_without_object_fails() {
        assert!(matches!(parse_intent("잘 모르겠어요"), Err(AppError::Serialization(_))));
        assert!(parse_intent("} {").is_err());
    }
}
