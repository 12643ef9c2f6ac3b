//! Embedding provider implementations

mod factory;
mod hashing;
mod openai;

pub use factory::{EmbeddingConfig, EmbeddingProviderFactory, EmbeddingProviderType};
pub use hashing::HashingEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

// Re-export HTTP client for use by embedding providers
pub use super::llm::{HttpClient, HttpClientTrait};
