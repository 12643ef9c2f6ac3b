//! In-memory similarity index using linear cosine search

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::fingerprint::Fingerprint;
use crate::domain::similarity::{
    cosine_similarity, SimilarityConfig, SimilarityIndex, SimilarityMatch, TieBreak,
};
use crate::domain::DomainError;

#[derive(Debug)]
struct IndexedVector {
    fingerprint: Fingerprint,
    vector: Vec<f32>,
    /// Insertion sequence, larger is more recent
    seq: u64,
}

/// In-memory similarity index using linear search
///
/// Entries are immutable once built and published through a copy-on-write
/// snapshot, so a query sees each insert either completely or not at all and
/// scans without holding the lock. Entries are kept in insertion order; the
/// oldest are evicted first when `max_entries` is exceeded.
#[derive(Debug)]
pub struct InMemorySimilarityIndex {
    entries: RwLock<Arc<Vec<Arc<IndexedVector>>>>,
    dimensions: usize,
    max_entries: usize,
    tie_break: TieBreak,
    next_seq: AtomicU64,
}

impl InMemorySimilarityIndex {
    pub fn new(dimensions: usize, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            dimensions,
            max_entries,
            tie_break: TieBreak::default(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn from_config(dimensions: usize, config: &SimilarityConfig) -> Self {
        Self::new(dimensions, config.max_entries).with_tie_break(config.tie_break)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    fn snapshot(&self) -> Result<Arc<Vec<Arc<IndexedVector>>>, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::similarity_index(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(Arc::clone(&entries))
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::similarity_index(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SimilarityIndex for InMemorySimilarityIndex {
    async fn insert(
        &self,
        fingerprint: Fingerprint,
        embedding: Vec<f32>,
    ) -> Result<(), DomainError> {
        self.check_dimensions(&embedding)?;

        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(DomainError::similarity_index(
                "Embedding contains non-finite values",
            ));
        }
        if embedding.iter().all(|x| *x == 0.0) {
            return Err(DomainError::similarity_index(
                "Zero vector cannot be indexed",
            ));
        }

        let indexed = Arc::new(IndexedVector {
            fingerprint,
            vector: embedding,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });

        let mut guard = self.entries.write().map_err(|e| {
            DomainError::similarity_index(format!("Failed to acquire write lock: {}", e))
        })?;
        let entries = Arc::make_mut(&mut *guard);

        entries.retain(|e| e.fingerprint != fingerprint);
        entries.push(indexed);

        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        self.check_dimensions(embedding)?;

        let degenerate =
            embedding.iter().any(|x| !x.is_finite()) || embedding.iter().all(|x| *x == 0.0);
        if k == 0 || degenerate {
            return Ok(Vec::new());
        }

        let snapshot = self.snapshot()?;

        let mut candidates: Vec<(f32, u64, Fingerprint)> = snapshot
            .iter()
            .map(|entry| {
                (
                    cosine_similarity(embedding, &entry.vector),
                    entry.seq,
                    entry.fingerprint,
                )
            })
            .filter(|(similarity, _, _)| similarity.is_finite() && *similarity >= threshold)
            .collect();

        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0).then_with(|| match self.tie_break {
                TieBreak::MostRecent => b.1.cmp(&a.1),
                TieBreak::Oldest => a.1.cmp(&b.1),
            })
        });
        candidates.truncate(k);

        Ok(candidates
            .into_iter()
            .map(|(similarity, sequence, fingerprint)| SimilarityMatch {
                fingerprint,
                similarity,
                sequence,
            })
            .collect())
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError> {
        let mut guard = self.entries.write().map_err(|e| {
            DomainError::similarity_index(format!("Failed to acquire write lock: {}", e))
        })?;

        if !guard.iter().any(|e| e.fingerprint == *fingerprint) {
            return Ok(false);
        }

        Arc::make_mut(&mut *guard).retain(|e| e.fingerprint != *fingerprint);
        Ok(true)
    }

    async fn remove_matched(&self, matched: &SimilarityMatch) -> Result<bool, DomainError> {
        let mut guard = self.entries.write().map_err(|e| {
            DomainError::similarity_index(format!("Failed to acquire write lock: {}", e))
        })?;

        let is_same = |e: &Arc<IndexedVector>| {
            e.fingerprint == matched.fingerprint && e.seq == matched.sequence
        };
        if !guard.iter().any(is_same) {
            return Ok(false);
        }

        Arc::make_mut(&mut *guard).retain(|e| !is_same(e));
        Ok(true)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        Ok(self.snapshot()?.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
