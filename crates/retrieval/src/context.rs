//! Wiring of the pipeline's collaborators.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pawtrip_core::{AppConfig, AppResult};
use pawtrip_llm::LlmClient;

use crate::augment::{Augmenter, PetTourClient};
use crate::classify::{LlmClassifier, QueryClassifier};
use crate::conditions::{ConditionsSource, KmaWeatherClient};
use crate::config::{DataDirs, PipelineConfig};
use crate::embeddings::create_provider;
use crate::gateway::EvidenceGateway;
use crate::generate::{AnswerGenerator, LlmGenerator};
use crate::store::SqliteEvidenceStore;
use crate::update_log::UpdateLog;

/// Everything a query needs, built once and shared read-only.
pub struct PipelineContext {
    pub classifier: Arc<dyn QueryClassifier>,
    pub gateway: Arc<EvidenceGateway>,
    pub augmenter: Arc<Augmenter>,
    pub conditions: Arc<dyn ConditionsSource>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub config: PipelineConfig,
}

/// The evidence gateway over the on-disk stores, plus its update log.
pub fn open_gateway(state_dir: &Path, config: &PipelineConfig) -> AppResult<(Arc<EvidenceGateway>, Arc<UpdateLog>)> {
    let dirs = DataDirs::new(state_dir);
    let embedder = create_provider(&config.embedding)?;
    let store = Arc::new(SqliteEvidenceStore::new(dirs.stores, embedder));
    let update_log = Arc::new(UpdateLog::new(dirs.update_log));

    let gateway = EvidenceGateway::new(store, Duration::from_secs(config.timeouts.search_secs))
        .with_weights(config.category_weights.clone())
        .with_update_log(update_log.clone());

    Ok((Arc::new(gateway), update_log))
}

/// Production context: SQLite stores, the pet tour API, KMA weather and
/// LLM-backed classification and generation.
pub fn build_context(app: &AppConfig, config: PipelineConfig, llm: Arc<dyn LlmClient>) -> AppResult<PipelineContext> {
    let state_dir = app.state_dir();
    let (gateway, _) = open_gateway(&state_dir, &config)?;

    let tour = Arc::new(PetTourClient::from_config(&config.tour_api));
    let augmenter = Augmenter::new(tour, gateway.clone())
        .with_max_external_results(config.max_external_results)
        .with_persistence(config.enable_persistence)
        .with_fetch_timeout(Duration::from_secs(config.timeouts.external_secs));

    let conditions = KmaWeatherClient::from_config(&config.weather, config.city_info_path(&state_dir));
    let classifier = LlmClassifier::new(llm.clone(), &app.model, &app.workspace)?;
    let generator = LlmGenerator::new(llm, &app.model, &app.workspace)?;

    tracing::debug!(
        state_dir = %state_dir.display(),
        model = %app.model,
        embedding = %config.embedding.provider,
        "pipeline context ready"
    );

    Ok(PipelineContext {
        classifier: Arc::new(classifier),
        gateway,
        augmenter: Arc::new(augmenter),
        conditions: Arc::new(conditions),
        generator: Arc::new(generator),
        config,
    })
}
