//! Pipeline tuning loaded from `.pawtrip/pipeline.yaml`.
//!
//! Every field has a default, so the file is optional and may be partial.

use pawtrip_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::Category;

pub const PIPELINE_FILE: &str = "pipeline.yaml";

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target number of items per travel day
    pub items_per_day: usize,

    /// Average passage length (characters) a category must exceed
    pub min_avg_content_chars: usize,

    /// Upper bound on records requested from an external source
    pub max_external_results: usize,

    /// Write fetched items back into the category index
    pub enable_persistence: bool,

    /// Fetch live conditions even when the classifier did not ask for them
    pub always_include_conditions: bool,

    /// Relevance multiplier per category (missing = 1.0)
    pub category_weights: BTreeMap<Category, f32>,

    pub timeouts: TimeoutConfig,

    pub tour_api: TourApiConfig,

    pub weather: WeatherConfig,

    pub embedding: EmbeddingConfig,
}

/// Per-boundary time budgets in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Classifier and intent extractor
    pub classifier_secs: u64,
    pub search_secs: u64,
    pub external_secs: u64,
    pub conditions_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TourApiConfig {
    pub endpoint: String,

    /// Environment variable holding the data.go.kr service key
    #[serde(rename = "serviceKeyEnv")]
    pub service_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub endpoint: String,

    #[serde(rename = "serviceKeyEnv")]
    pub service_key_env: String,

    /// Region → lat/lon JSON; relative paths resolve against `.pawtrip/`
    #[serde(rename = "cityInfoPath")]
    pub city_info_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "trigram" or "ollama"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Only used by the ollama provider
    pub endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            items_per_day: 4,
            min_avg_content_chars: 50,
            max_external_results: 30,
            enable_persistence: true,
            always_include_conditions: true,
            category_weights: BTreeMap::new(),
            timeouts: TimeoutConfig::default(),
            tour_api: TourApiConfig::default(),
            weather: WeatherConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classifier_secs: 20,
            search_secs: 10,
            external_secs: 15,
            conditions_secs: 10,
        }
    }
}

impl Default for TourApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://apis.data.go.kr/B551011/KorPetTourService".to_string(),
            service_key_env: "TOUR_API_KEY".to_string(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://apis.data.go.kr/1360000/VilageFcstInfoService_2.0/getUltraSrtNcst"
                .to_string(),
            service_key_env: "OPEN_DATA".to_string(),
            city_info_path: PathBuf::from("city_info.json"),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

impl PipelineConfig {
    /// Load `pipeline.yaml` from the state directory, or defaults when absent.
    pub fn load(state_dir: &Path) -> AppResult<Self> {
        let path = state_dir.join(PIPELINE_FILE);

        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("Failed to read {:?}: {}", path, e))
            })?;
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse {:?}: {}", path, e))
            })?
        } else {
            tracing::debug!("No {} found, using defaults", PIPELINE_FILE);
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.items_per_day == 0 {
            return Err(AppError::Config("items_per_day must be at least 1".to_string()));
        }

        if let Some((category, weight)) = self
            .category_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(AppError::Config(format!(
                "category weight for {} must be a non-negative number, got {}",
                category, weight
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding dimensions must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Weight applied to a category's relevance scores.
    pub fn weight(&self, category: Category) -> f32 {
        self.category_weights.get(&category).copied().unwrap_or(1.0)
    }

    /// Absolute path of the city info file.
    pub fn city_info_path(&self, state_dir: &Path) -> PathBuf {
        if self.weather.city_info_path.is_absolute() {
            self.weather.city_info_path.clone()
        } else {
            state_dir.join(&self.weather.city_info_path)
        }
    }
}

/// On-disk locations under the state directory.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub stores: PathBuf,
    pub update_log: PathBuf,
}

impl DataDirs {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            stores: state_dir.join("stores"),
            update_log: state_dir.join("updates").join("store_updates.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.items_per_day, 4);
        assert_eq!(config.min_avg_content_chars, 50);
        assert_eq!(config.max_external_results, 30);
        assert!(config.enable_persistence);
        assert_eq!(config.timeouts.search_secs, 10);
        assert_eq!(config.tour_api.service_key_env, "TOUR_API_KEY");
        assert_eq!(config.weight(Category::Lodging), 1.0);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::load(temp.path()).unwrap();
        assert_eq!(config.embedding.provider, "trigram");
    }

    #[test]
    fn test_partial_yaml_merges_with_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(PIPELINE_FILE),
            r#"
items_per_day: 3
category_weights:
  lodging: 1.5
timeouts:
  external_secs: 5
weather:
  cityInfoPath: /data/cities.json
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(temp.path()).unwrap();
        assert_eq!(config.items_per_day, 3);
        assert_eq!(config.weight(Category::Lodging), 1.5);
        assert_eq!(config.weight(Category::Attractions), 1.0);
        assert_eq!(config.timeouts.external_secs, 5);
        assert_eq!(config.timeouts.search_secs, 10);
        assert_eq!(
            config.city_info_path(temp.path()),
            PathBuf::from("/data/cities.json")
        );
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = PipelineConfig::default();
        config.category_weights.insert(Category::Transit, -1.0);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_relative_city_info_resolves_under_state_dir() {
        let config = PipelineConfig::default();
        let path = config.city_info_path(Path::new("/ws/.pawtrip"));
        assert_eq!(path, PathBuf::from("/ws/.pawtrip/city_info.json"));
    }
}
