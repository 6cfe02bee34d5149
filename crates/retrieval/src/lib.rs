//! Retrieval-augmentation pipeline for pet-friendly travel questions.
//!
//! A query is classified into knowledge categories, each category's store is
//! searched, thin results are topped up from the pet tour API, live weather
//! is attached, and the bundled evidence is handed to the answer generator.
//!
//! # Example
//! ```no_run
//! use pawtrip_core::AppConfig;
//! use pawtrip_retrieval::{build_context, PipelineConfig, Retriever};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = AppConfig::load()?;
//! let pipeline = PipelineConfig::load(&app.state_dir())?;
//! let llm = pawtrip_llm::client_from_config(&app)?;
//!
//! let retriever = Retriever::new(build_context(&app, pipeline, llm)?);
//! println!("{}", retriever.answer("속초에 강아지랑 1박 2일 여행").await);
//! # Ok(())
//! # }
//! ```

pub mod augment;
pub mod bundle;
pub mod classify;
pub mod conditions;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod gateway;
pub mod generate;
pub mod ingest;
pub mod orchestrator;
pub mod quality;
pub mod store;
pub mod types;
pub mod update_log;


pub use augment::{Augmenter, ExternalSource, PetTourClient};
pub use bundle::{map_link, BundledItem, Bundler, EvidenceBundle};
pub use classify::{LlmClassifier, QueryClassifier};
pub use conditions::{ConditionsSource, KmaWeatherClient, WeatherReport};
pub use config::{DataDirs, PipelineConfig};
pub use context::{build_context, open_gateway, PipelineContext};
pub use gateway::{store_name, EvidenceGateway, EvidenceStore, StoreStats};
pub use generate::{AnswerGenerator, AnswerStream, LlmGenerator};
pub use ingest::{index_path, IngestStats};
pub use orchestrator::{PipelineStage, RetrievalOutcome, Retriever, TextStream, FALLBACK_MESSAGE};
pub use quality::{needed_count, QualityAssessor};
pub use types::{Category, CategorySet, Duration, EvidenceItem, EvidenceSource, Intent, PlaceRecord, QualityVerdict};
pub use update_log::{UpdateEntry, UpdateLog};
