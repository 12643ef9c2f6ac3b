use std::time::Duration;

use serde::Deserialize;

use crate::domain::fingerprint::NormalizationRule;
use crate::domain::generation::GenerationConfig;
use crate::domain::similarity::SimilarityConfig;
use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::embedding::EmbeddingConfig;
use crate::infrastructure::generation::BackendConfig;
use crate::infrastructure::services::OrchestratorConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fingerprint: NormalizationRule,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_overall_timeout_ms() -> u64 {
    120_000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            overall_timeout_ms: default_overall_timeout_ms(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Orchestrator settings assembled from the cache, similarity and embedding sections
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_ttl(self.cache.ttl())
            .with_refresh_ttl_on_hit(self.cache.refresh_ttl_on_hit)
            .with_similarity(self.similarity.clone())
            .with_embedding_timeout(self.embedding.timeout())
            .with_embedding_retry_transient(self.embedding.retry_transient)
            .with_overall_timeout(Duration::from_millis(self.orchestrator.overall_timeout_ms))
    }
}
