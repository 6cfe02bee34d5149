//! The retrieval-augmentation pipeline.
//!
//! A query moves through the stages in order, never backwards. Every
//! per-category failure degrades to an empty result for that category; only
//! generation can fail the query as a whole, and then the caller gets a
//! fixed fallback message.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures::future::{join_all, ready};
use futures::{Stream, StreamExt};
use pawtrip_core::{AppError, AppResult};
use serde::Serialize;

use crate::bundle::{Bundler, EvidenceBundle};
use crate::conditions::conditions_evidence;
use crate::context::PipelineContext;
use crate::quality::{needed_count, QualityAssessor};
use crate::types::{Category, CategorySet, EvidenceItem, Intent, QualityVerdict};

pub const FALLBACK_MESSAGE: &str = "죄송합니다. 요청을 처리하는 중 오류가 발생했습니다. 다시 시도해 주세요.";

/// Answer text as it is produced. Never yields errors.
pub type TextStream = Pin<Box<dyn Stream<Item = String> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Classifying,
    Quantifying,
    Searching,
    Assessing,
    Augmenting,
    Bundling,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Classifying => "classifying",
            Self::Quantifying => "quantifying",
            Self::Searching => "searching",
            Self::Assessing => "assessing",
            Self::Augmenting => "augmenting",
            Self::Bundling => "bundling",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything retrieval decided for one query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub query: String,
    pub categories: CategorySet,
    pub intent: Intent,
    pub needed_count: usize,
    pub verdicts: Vec<QualityVerdict>,
    pub bundle: EvidenceBundle,
}

/// Per-category result of search, assessment and augmentation.
struct CategoryResult {
    category: Category,
    items: Vec<EvidenceItem>,
    verdict: QualityVerdict,
}

/// Runs queries against a [`PipelineContext`].
pub struct Retriever {
    ctx: PipelineContext,
    assessor: QualityAssessor,
}

impl Retriever {
    pub fn new(ctx: PipelineContext) -> Self {
        let assessor = QualityAssessor::new(ctx.config.min_avg_content_chars);
        Self { ctx, assessor }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::debug!(%stage, "pipeline stage");
    }

    /// Classify, search, assess, augment and bundle. Never fails.
    pub async fn retrieve(&self, query: &str) -> RetrievalOutcome {
        let config = &self.ctx.config;

        self.enter(PipelineStage::Classifying);
        let (mut categories, intent) = self.classify(query).await;
        if config.always_include_conditions {
            categories.insert(Category::Conditions);
        }
        tracing::info!(categories = ?categories, intent = ?intent, "query classified");

        self.enter(PipelineStage::Quantifying);
        let needed = needed_count(intent.days(), config.items_per_day);
        tracing::debug!(needed, days = ?intent.days(), "target item count");

        let indexed: Vec<Category> = categories.iter().filter(|c| *c != Category::Conditions).collect();
        let conditions_timeout = Duration::from_secs(config.timeouts.conditions_secs);
        let conditions = async {
            if categories.contains(Category::Conditions) {
                Some(conditions_evidence(self.ctx.conditions.as_ref(), intent.region.as_deref(), conditions_timeout).await)
            } else {
                None
            }
        };
        let per_category = join_all(indexed.iter().map(|c| self.run_category(*c, query, &intent, needed)));

        let (results, conditions) = tokio::join!(per_category, conditions);

        self.enter(PipelineStage::Bundling);
        let mut verdicts = Vec::with_capacity(results.len());
        let mut sections: Vec<(Category, Vec<EvidenceItem>)> = Vec::with_capacity(results.len() + 1);
        for result in results {
            verdicts.push(result.verdict);
            sections.push((result.category, result.items));
        }
        if let Some(item) = conditions {
            sections.push((Category::Conditions, vec![item]));
        }
        let bundle = Bundler.bundle(sections);

        self.enter(PipelineStage::Done);
        RetrievalOutcome {
            query: query.to_string(),
            categories,
            intent,
            needed_count: needed,
            verdicts,
            bundle,
        }
    }

    /// Classifier and extractor run together; failures fall back to defaults.
    async fn classify(&self, query: &str) -> (CategorySet, Intent) {
        let secs = self.ctx.config.timeouts.classifier_secs;
        let timeout = Duration::from_secs(secs);
        let classifier = self.ctx.classifier.as_ref();

        let (categories, intent) = tokio::join!(
            bounded(timeout, "classify", classifier.classify(query)),
            bounded(timeout, "extract intent", classifier.extract_intent(query)),
        );

        let categories = categories.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "classification failed, using default categories");
            CategorySet::default()
        });
        let intent = intent.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "intent extraction failed, treating as unspecified");
            Intent::default()
        });
        (categories, intent)
    }

    async fn run_category(&self, category: Category, query: &str, intent: &Intent, needed: usize) -> CategoryResult {
        self.enter(PipelineStage::Searching);
        let mut items: Vec<EvidenceItem> = self
            .ctx
            .gateway
            .search(category, query, needed)
            .await
            .into_iter()
            .map(|(item, _)| item)
            .collect();

        self.enter(PipelineStage::Assessing);
        let verdict = self.assessor.assess(category, &items, needed);
        let shortfall = needed.saturating_sub(verdict.observed_count);

        if verdict.needs_augmentation && shortfall > 0 {
            self.enter(PipelineStage::Augmenting);
            let supplement = self
                .ctx
                .augmenter
                .augment(category, intent, &items, shortfall, query)
                .await;
            tracing::info!(%category, shortfall, added = supplement.len(), "category augmented");
            items.extend(supplement);
        }

        CategoryResult { category, items, verdict }
    }

    /// Retrieve and generate. On generation failure the answer is the
    /// fixed fallback message.
    pub async fn answer_with_outcome(&self, query: &str) -> (RetrievalOutcome, String) {
        let outcome = self.retrieve(query).await;
        let answer = match self
            .ctx
            .generator
            .generate(query, &outcome.intent, &outcome.bundle)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "answer generation failed");
                FALLBACK_MESSAGE.to_string()
            }
        };
        (outcome, answer)
    }

    pub async fn answer(&self, query: &str) -> String {
        self.answer_with_outcome(query).await.1
    }

    /// Streaming variant of [`Retriever::answer`].
    ///
    /// A failure before the first token yields the fallback message alone; a
    /// failure mid-stream appends it and ends the stream.
    pub async fn answer_stream(&self, query: &str) -> (RetrievalOutcome, TextStream) {
        let outcome = self.retrieve(query).await;
        let stream = match self
            .ctx
            .generator
            .generate_stream(query, &outcome.intent, &outcome.bundle)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "answer stream failed to start");
                let fallback: TextStream = Box::pin(futures::stream::once(ready(FALLBACK_MESSAGE.to_string())));
                return (outcome, fallback);
            }
        };

        let text: TextStream = Box::pin(stream.scan(false, |failed, part| {
            if *failed {
                return ready(None);
            }
            let text = match part {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "answer stream interrupted");
                    *failed = true;
                    format!("\n\n{}", FALLBACK_MESSAGE)
                }
            };
            ready(Some(text))
        }));
        (outcome, text)
    }
}

/// Run a boundary call under a timeout.
async fn bounded<T>(
    timeout: Duration,
    operation: &str,
    call: impl std::future::Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| AppError::timeout(operation, timeout.as_secs()))?
}
