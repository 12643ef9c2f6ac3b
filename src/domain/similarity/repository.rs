//! Similarity index trait definition

use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::Fingerprint;
use crate::domain::DomainError;

/// A ranked candidate returned by a similarity query
///
/// The fingerprint is a lookup key only; the cache entry it names may already
/// have been evicted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub fingerprint: Fingerprint,
    pub similarity: f32,
    /// Insertion sequence of the matched vector; a re-insert gets a new one
    #[serde(default)]
    pub sequence: u64,
}

/// Nearest-neighbour structure over embedding vectors
///
/// A query observes each insert either fully or not at all.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SimilarityIndex: Send + Sync + Debug {
    /// Indexes an embedding, replacing any vector stored for the fingerprint
    async fn insert(&self, fingerprint: Fingerprint, embedding: Vec<f32>)
    -> Result<(), DomainError>;

    /// Up to `k` candidates with similarity >= `threshold`, best first
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarityMatch>, DomainError>;

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError>;

    /// Removes the matched vector only if it has not been re-inserted since the query
    async fn remove_matched(&self, matched: &SimilarityMatch) -> Result<bool, DomainError>;

    async fn len(&self) -> Result<usize, DomainError>;

    /// Dimension every indexed vector must have
    fn dimensions(&self) -> usize;
}
