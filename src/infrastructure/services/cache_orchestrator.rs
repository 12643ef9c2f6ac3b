//! Cache orchestrator
//!
//! Resolves a specification to an `AggregatedResult` by trying, in order, an
//! exact fingerprint hit, a semantic hit through the similarity index, and
//! finally a single-flight guarded fan-out whose result is written back.
//!
//! Cache, index and embedding failures are soft: they are logged and the
//! request falls through to the next stage. Only invalid input, total
//! generation failure, the overall timeout and caller cancellation reach the
//! caller as errors.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::SingleFlight;
use crate::domain::cache::{CacheEntry, CacheStore};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::fingerprint::{Fingerprint, FingerprintComputer};
use crate::domain::generation::{AggregatedResult, GeneratorBackend};
use crate::domain::similarity::{SimilarityConfig, SimilarityIndex};
use crate::domain::specification::SpecificationRequest;
use crate::domain::DomainError;
use crate::infrastructure::generation::GenerationCoordinator;
use crate::infrastructure::observability::{
    record_cache_lookup, record_cache_write_skipped, record_generation_episode,
    record_single_flight_join, LookupOutcome,
};

const EMBED_ATTEMPTS: u32 = 2;

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// TTL of entries written back after generation
    pub ttl: Duration,
    /// Restart the TTL window on every hit
    pub refresh_ttl_on_hit: bool,
    pub similarity: SimilarityConfig,
    /// Per-attempt embedding timeout
    pub embedding_timeout: Duration,
    pub embedding_retry_transient: bool,
    /// Bound on a whole `resolve` call, distinct from backend timeouts
    pub overall_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86_400),
            refresh_ttl_on_hit: false,
            similarity: SimilarityConfig::default(),
            embedding_timeout: Duration::from_secs(5),
            embedding_retry_transient: true,
            overall_timeout: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_refresh_ttl_on_hit(mut self, refresh: bool) -> Self {
        self.refresh_ttl_on_hit = refresh;
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout = timeout;
        self
    }

    pub fn with_embedding_retry_transient(mut self, retry: bool) -> Self {
        self.embedding_retry_transient = retry;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.ttl.is_zero() {
            return Err(DomainError::configuration("Cache TTL must be greater than 0"));
        }
        if self.overall_timeout.is_zero() {
            return Err(DomainError::configuration(
                "Overall timeout must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            return Err(DomainError::configuration(format!(
                "Similarity threshold must be within [0, 1], got {}",
                self.similarity.threshold
            )));
        }
        if self.similarity.enabled && self.similarity.top_k == 0 {
            return Err(DomainError::configuration(
                "similarity.top_k must be greater than 0",
            ));
        }
        Ok(())
    }
}

struct Inner {
    fingerprints: FingerprintComputer,
    cache: Arc<dyn CacheStore>,
    index: Arc<dyn SimilarityIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    coordinator: GenerationCoordinator,
    backends: Vec<Arc<dyn GeneratorBackend>>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    flights: SingleFlight<Fingerprint, Arc<AggregatedResult>>,
}

/// Composes fingerprinting, cache, similarity index and generation
///
/// Cheap to clone; clones share the same stores and single-flight group.
#[derive(Clone)]
pub struct CacheOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CacheOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("cache", &self.inner.cache.backend_name())
            .field("embedder", &self.inner.embedder.provider_name())
            .field("backends", &self.inner.backends.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl CacheOrchestrator {
    pub fn builder() -> CacheOrchestratorBuilder {
        CacheOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn fingerprint_computer(&self) -> &FingerprintComputer {
        &self.inner.fingerprints
    }

    /// Resolves a specification, bounded by the overall timeout
    ///
    /// Dropping the returned future, or hitting the timeout, does not abort a
    /// generation episode that has already started; it still populates the
    /// cache for later callers.
    pub async fn resolve(&self, raw: &str) -> Result<AggregatedResult, DomainError> {
        let timeout = self.inner.config.overall_timeout;

        match tokio::time::timeout(timeout, self.resolve_inner(raw)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Resolve exceeded overall timeout");
                Err(DomainError::overall_timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Resolves a specification unless `cancelled` completes first
    pub async fn resolve_until<C>(&self, raw: &str, cancelled: C) -> Result<AggregatedResult, DomainError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancelled => {
                debug!("Resolve cancelled by caller");
                Err(DomainError::cancelled("Caller cancelled the request"))
            }
            result = self.resolve(raw) => result,
        }
    }

    async fn resolve_inner(&self, raw: &str) -> Result<AggregatedResult, DomainError> {
        let spec = Arc::new(self.inner.fingerprints.request(raw)?);
        let fingerprint = *spec.fingerprint();

        if let Some(result) = self.lookup_exact(&fingerprint).await {
            record_cache_lookup(LookupOutcome::Exact);
            debug!(fingerprint = %fingerprint.short(), "Exact cache hit");
            return Ok(result);
        }

        let embedding = self.embed_for_lookup(&spec).await;

        if let Some(ref embedding) = embedding {
            if let Some(result) = self.lookup_similar(&fingerprint, embedding).await {
                record_cache_lookup(LookupOutcome::Similar);
                return Ok(result);
            }
        }

        record_cache_lookup(LookupOutcome::Miss);
        let result = self.generate(spec, embedding).await?;

        Ok(AggregatedResult::clone(&result))
    }

    /// Exact hit with the hit counter bumped
    async fn lookup_exact(&self, fingerprint: &Fingerprint) -> Option<AggregatedResult> {
        match self
            .inner
            .cache
            .record_hit(fingerprint, self.inner.config.refresh_ttl_on_hit)
            .await
        {
            Ok(Some(entry)) => {
                let hit_count = entry.hit_count();
                Some(AggregatedResult::cache_exact(
                    *fingerprint,
                    entry.into_payload(),
                    hit_count,
                ))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(fingerprint = %fingerprint.short(), error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn lookup_similar(
        &self,
        fingerprint: &Fingerprint,
        embedding: &[f32],
    ) -> Option<AggregatedResult> {
        let similarity = &self.inner.config.similarity;

        let candidates = match self
            .inner
            .index
            .query(embedding, similarity.top_k, similarity.threshold)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Similarity query failed, treating as miss");
                return None;
            }
        };

        for candidate in candidates {
            match self
                .inner
                .cache
                .record_hit(&candidate.fingerprint, self.inner.config.refresh_ttl_on_hit)
                .await
            {
                Ok(Some(entry)) => {
                    debug!(
                        fingerprint = %fingerprint.short(),
                        matched = %candidate.fingerprint.short(),
                        similarity = candidate.similarity,
                        "Similar cache hit"
                    );
                    let hit_count = entry.hit_count();
                    return Some(AggregatedResult::cache_similar(
                        *fingerprint,
                        candidate.fingerprint,
                        candidate.similarity,
                        entry.into_payload(),
                        hit_count,
                    ));
                }
                Ok(None) => {
                    debug!(matched = %candidate.fingerprint.short(), "Skipping dangling index entry");
                    if similarity.prune_tombstones {
                        if let Err(e) = self.inner.index.remove_matched(&candidate).await {
                            warn!(error = %e, "Failed to prune dangling index entry");
                        }
                    }
                }
                Err(e) => {
                    warn!(matched = %candidate.fingerprint.short(), error = %e, "Cache lookup for candidate failed");
                }
            }
        }

        None
    }

    async fn embed_for_lookup(&self, spec: &SpecificationRequest) -> Option<Vec<f32>> {
        if !self.inner.config.similarity.enabled {
            return None;
        }

        match self.embed(spec).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "Embedding failed, skipping similarity lookup");
                None
            }
        }
    }

    /// Embeds the normalized text with a timeout and one retry on transient failure
    async fn embed(&self, spec: &SpecificationRequest) -> Result<Vec<f32>, DomainError> {
        let config = &self.inner.config;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(
                config.embedding_timeout,
                self.inner.embedder.embed(spec.normalized()),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(DomainError::timeout(format!(
                    "Embedding did not complete within {}ms",
                    config.embedding_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(embedding) => return Ok(embedding),
                Err(e)
                    if config.embedding_retry_transient
                        && e.is_transient()
                        && attempt < EMBED_ATTEMPTS =>
                {
                    debug!(error = %e, "Transient embedding failure, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn generate(
        &self,
        spec: Arc<SpecificationRequest>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Arc<AggregatedResult>, DomainError> {
        let fingerprint = *spec.fingerprint();
        let this = self.clone();

        let (outcome, leader) = self
            .inner
            .flights
            .join_or_start(fingerprint, move || this.run_episode(spec, embedding));

        if !leader {
            record_single_flight_join();
            debug!(fingerprint = %fingerprint.short(), "Joined in-flight generation");
        }

        outcome.await
    }

    /// One generation episode, run by the single-flight leader
    async fn run_episode(
        self,
        spec: Arc<SpecificationRequest>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Arc<AggregatedResult>, DomainError> {
        let fingerprint = *spec.fingerprint();
        let span = info_span!(
            "generation_episode",
            episode_id = %Uuid::new_v4(),
            fingerprint = %fingerprint.short()
        );

        async move {
            // An episode for this key may have finished between our miss and
            // acquiring the slot.
            if let Some(result) = self.lookup_exact(&fingerprint).await {
                debug!("Entry written by a previous episode, skipping generation");
                return Ok(Arc::new(result));
            }

            let started = Instant::now();
            let outcome = self
                .inner
                .coordinator
                .fan_out(spec.clone(), &self.inner.backends)
                .await;
            record_generation_episode(outcome.is_ok(), started.elapsed());

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Generation failed, nothing cached");
                    return Err(e);
                }
            };

            info!(
                items = result.items.len(),
                failed_backends = result.errors.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Generation succeeded"
            );

            self.write_back(&spec, embedding, &result).await;

            Ok(Arc::new(result))
        }
        .instrument(span)
        .await
    }

    async fn write_back(
        &self,
        spec: &SpecificationRequest,
        embedding: Option<Vec<f32>>,
        result: &AggregatedResult,
    ) {
        let config = &self.inner.config;
        let fingerprint = *spec.fingerprint();

        let embedding = if config.similarity.enabled {
            let embedding = match embedding {
                Some(embedding) => Ok(embedding),
                None => self.embed(spec).await,
            };
            match embedding {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(error = %e, "No embedding for write-back, cache write skipped");
                    record_cache_write_skipped("embedding_unavailable");
                    return;
                }
            }
        } else {
            Vec::new()
        };

        let entry = CacheEntry::new(
            fingerprint,
            embedding.clone(),
            result.items.clone(),
            self.inner.clock.now(),
            config.ttl,
        );

        match self.inner.cache.put(entry, config.ttl).await {
            Ok(true) => debug!("Result cached"),
            Ok(false) => debug!("A newer entry was already stored"),
            Err(e) => {
                warn!(error = %e, "Cache write failed");
                record_cache_write_skipped("cache_error");
                return;
            }
        }

        if config.similarity.enabled {
            if let Err(e) = self.inner.index.insert(fingerprint, embedding).await {
                warn!(error = %e, "Similarity index insert failed");
            }
        }
    }
}

/// Builder for [`CacheOrchestrator`]
#[derive(Default)]
pub struct CacheOrchestratorBuilder {
    fingerprints: FingerprintComputer,
    cache: Option<Arc<dyn CacheStore>>,
    index: Option<Arc<dyn SimilarityIndex>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    coordinator: Option<GenerationCoordinator>,
    backends: Vec<Arc<dyn GeneratorBackend>>,
    clock: Option<Arc<dyn Clock>>,
    config: OrchestratorConfig,
}

impl CacheOrchestratorBuilder {
    pub fn fingerprint_computer(mut self, fingerprints: FingerprintComputer) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn similarity_index(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn coordinator(mut self, coordinator: GenerationCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn backends(mut self, backends: Vec<Arc<dyn GeneratorBackend>>) -> Self {
        self.backends = backends;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<CacheOrchestrator, DomainError> {
        let missing = |what: &str| DomainError::configuration(format!("Orchestrator requires {}", what));

        let cache = self.cache.ok_or_else(|| missing("a cache store"))?;
        let index = self.index.ok_or_else(|| missing("a similarity index"))?;
        let embedder = self.embedder.ok_or_else(|| missing("an embedding provider"))?;
        let coordinator = match self.coordinator {
            Some(coordinator) => coordinator,
            None => GenerationCoordinator::new(Default::default())?,
        };

        if self.backends.is_empty() {
            return Err(DomainError::configuration(
                "At least one generator backend is required",
            ));
        }

        self.config.validate()?;

        if self.config.similarity.enabled && embedder.dimensions() != index.dimensions() {
            return Err(DomainError::configuration(format!(
                "Embedding dimension {} does not match similarity index dimension {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        Ok(CacheOrchestrator {
            inner: Arc::new(Inner {
                fingerprints: self.fingerprints,
                cache,
                index,
                embedder,
                coordinator,
                backends: self.backends,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                config: self.config,
                flights: SingleFlight::new(),
            }),
        })
    }
}
