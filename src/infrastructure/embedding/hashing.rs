//! Deterministic offline embedding

use async_trait::async_trait;

use crate::domain::embedding::EmbeddingProvider;
use crate::domain::similarity::l2_normalize;
use crate::domain::DomainError;

/// Number of leading characters that contribute to the vector
const MAX_CHARS: usize = 200;

/// Character-code embedding that needs no model or network
///
/// The lowercased text is truncated to its first 200 characters. Each
/// character becomes its code point modulo 256, and the vector is zero-padded
/// (or truncated) to the configured dimension and scaled to unit length.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector: Vec<f32> = text
            .to_lowercase()
            .chars()
            .take(MAX_CHARS.min(self.dimensions))
            .map(|c| (c as u32 % 256) as f32)
            .collect();

        vector.resize(self.dimensions, 0.0);
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.embed_sync(text))
    }

    fn provider_name(&self) -> &'static str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
