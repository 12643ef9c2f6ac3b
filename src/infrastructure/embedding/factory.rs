//! Embedding provider factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{HashingEmbeddingProvider, HttpClient, OpenAiEmbeddingProvider};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::DomainError;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// Deterministic character-code embedding, no network
    #[default]
    Hashing,
    /// OpenAI-compatible `/v1/embeddings` endpoint
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashing => write!(f, "hashing"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" | "hash" => Ok(Self::Hashing),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            _ => Err(DomainError::configuration(format!(
                "Unknown embedding provider: {}. Valid providers: hashing, openai",
                s
            ))),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderType,

    /// Vector dimension shared by the provider and the similarity index
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry once on transient failure
    #[serde(default = "default_true")]
    pub retry_transient: bool,
}

fn default_dimensions() -> usize {
    384
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            dimensions: default_dimensions(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            retry_transient: default_true(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_provider(mut self, provider: EmbeddingProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = var.into();
        self
    }
}

/// Factory for creating embedding providers
#[derive(Debug, Default)]
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, DomainError> {
        if config.dimensions == 0 {
            return Err(DomainError::configuration(
                "embedding.dimensions must be greater than 0",
            ));
        }

        match config.provider {
            EmbeddingProviderType::Hashing => {
                Ok(Arc::new(HashingEmbeddingProvider::new(config.dimensions)))
            }
            EmbeddingProviderType::OpenAi => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    DomainError::configuration(format!(
                        "Environment variable {} is not set",
                        config.api_key_env
                    ))
                })?;

                let client = HttpClient::with_timeout(config.timeout())?;
                let mut provider = OpenAiEmbeddingProvider::new(
                    client,
                    api_key,
                    config.model.clone(),
                    config.dimensions,
                );

                if let Some(ref base_url) = config.base_url {
                    provider = provider.with_base_url(base_url.clone());
                }

                Ok(Arc::new(provider))
            }
        }
    }
}
