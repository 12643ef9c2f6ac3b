//! Embedding provider trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Source of specification embeddings
///
/// Every vector returned by a provider has exactly `dimensions()` elements.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    fn provider_name(&self) -> &'static str;

    fn dimensions(&self) -> usize;
}

#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        name: &'static str,
        dimensions: usize,
        vectors: HashMap<String, Vec<f32>>,
        error: Option<DomainError>,
        delay: Option<Duration>,
        transient_failures: AtomicU32,
        calls: AtomicUsize,
    }

    impl MockEmbeddingProvider {
        pub fn new(name: &'static str, dimensions: usize) -> Self {
            Self {
                name,
                dimensions,
                vectors: HashMap::new(),
                error: None,
                delay: None,
                transient_failures: AtomicU32::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        /// Returns `vector` whenever `text` is embedded
        pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.into(), vector);
            self
        }

        pub fn with_error(mut self, error: DomainError) -> Self {
            self.error = Some(error);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn with_transient_failures(self, count: u32) -> Self {
            self.transient_failures.store(count, Ordering::SeqCst);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let failing = self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(DomainError::embedding_transient(self.name, "rate limited"));
            }

            if let Some(ref error) = self.error {
                return Err(error.clone());
            }

            if let Some(vector) = self.vectors.get(text) {
                return Ok(vector.clone());
            }

            // Deterministic vector derived from the text bytes
            let hash = text
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            Ok((0..self.dimensions)
                .map(|i| ((hash.wrapping_add(i as u64 * 7919) % 1000) as f32 / 1000.0) - 0.5)
                .collect())
        }

        fn provider_name(&self) -> &'static str {
            self.name
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_provider_dimensions() {
            let provider = MockEmbeddingProvider::new("test", 128);

            let vector = provider.embed("hello").await.unwrap();

            assert_eq!(vector.len(), 128);
            assert_eq!(provider.call_count(), 1);
        }

        #[tokio::test]
        async fn test_mock_provider_fixed_vector() {
            let provider = MockEmbeddingProvider::new("test", 2).with_vector("a", vec![1.0, 0.0]);

            assert_eq!(provider.embed("a").await.unwrap(), vec![1.0, 0.0]);
        }

        #[tokio::test]
        async fn test_mock_provider_transient_then_ok() {
            let provider = MockEmbeddingProvider::new("test", 4).with_transient_failures(1);

            let first = provider.embed("x").await.unwrap_err();
            assert!(first.is_transient());
            assert!(provider.embed("x").await.is_ok());
        }

        #[tokio::test]
        async fn test_deterministic_embeddings() {
            let provider = MockEmbeddingProvider::new("test", 16);

            assert_eq!(
                provider.embed("same").await.unwrap(),
                provider.embed("same").await.unwrap()
            );
        }
    }
}
