//! Generator backend factory

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::llm_backend::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use super::{LlmGeneratorBackend, StaticGeneratorBackend};
use crate::domain::generation::{BackendId, GeneratorBackend};
use crate::domain::DomainError;
use crate::infrastructure::llm::HttpClient;

/// Kind of generator backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions
    #[default]
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    /// Fixed items from configuration
    Static,
}

/// Configuration for one generator backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,

    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Overrides the default system instruction
    #[serde(default)]
    pub instruction: Option<String>,

    /// Items returned by a static backend
    #[serde(default)]
    pub items: Vec<Value>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl BackendConfig {
    pub fn openai(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BackendKind::OpenAi,
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            instruction: None,
            items: Vec::new(),
        }
    }

    pub fn fixed(id: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            kind: BackendKind::Static,
            items,
            ..Self::openai(id)
        }
    }
}

/// Builds the configured backend set
#[derive(Debug, Default)]
pub struct GeneratorBackendFactory;

impl GeneratorBackendFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates every backend, rejecting invalid or duplicate IDs
    pub fn create_all(
        &self,
        configs: &[BackendConfig],
    ) -> Result<Vec<Arc<dyn GeneratorBackend>>, DomainError> {
        let mut seen = HashSet::new();

        configs
            .iter()
            .map(|config| {
                if !seen.insert(config.id.as_str()) {
                    return Err(DomainError::configuration(format!(
                        "Duplicate backend ID: {}",
                        config.id
                    )));
                }
                self.create(config)
            })
            .collect()
    }

    pub fn create(&self, config: &BackendConfig) -> Result<Arc<dyn GeneratorBackend>, DomainError> {
        let id = BackendId::new(config.id.clone())
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        match config.kind {
            BackendKind::Static => Ok(Arc::new(StaticGeneratorBackend::new(
                id,
                config.items.clone(),
            ))),
            BackendKind::OpenAi => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    DomainError::configuration(format!(
                        "Environment variable {} is not set for backend {}",
                        config.api_key_env, config.id
                    ))
                })?;

                let mut backend = LlmGeneratorBackend::new(id, HttpClient::new(), api_key)
                    .with_model(config.model.clone())
                    .with_temperature(config.temperature)
                    .with_max_tokens(config.max_tokens);

                if let Some(ref base_url) = config.base_url {
                    backend = backend.with_base_url(base_url.clone());
                }
                if let Some(ref instruction) = config.instruction {
                    backend = backend.with_instruction(instruction.clone());
                }

                Ok(Arc::new(backend))
            }
        }
    }
}
