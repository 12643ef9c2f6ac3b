//! PMP Testgen Cache
//!
//! Semantic result cache and fan-out generation orchestrator for
//! specification-driven test case generation:
//! - Exact-match caching keyed by a normalized specification fingerprint
//! - Approximate reuse through cosine similarity over embeddings
//! - Single-flight fan-out to multiple generator backends with partial-failure tolerance
//! - In-memory, Redis or tiered cache stores with TTL expiry

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::clock::{Clock, SystemClock};
use domain::FingerprintComputer;
use infrastructure::{
    cache::{spawn_expiry_sweeper, CacheStoreFactory},
    embedding::EmbeddingProviderFactory,
    generation::{GenerationCoordinator, GeneratorBackendFactory},
    services::CacheOrchestrator,
    similarity::InMemorySimilarityIndex,
};
use tracing::info;

/// Create an orchestrator with default configuration
pub async fn create_orchestrator() -> anyhow::Result<CacheOrchestrator> {
    create_orchestrator_with_config(&AppConfig::default()).await
}

/// Create an orchestrator from configuration
///
/// Starts the background expiry sweeper when `cache.sweep_interval_secs` is
/// non-zero; it runs for the life of the runtime.
pub async fn create_orchestrator_with_config(
    config: &AppConfig,
) -> anyhow::Result<CacheOrchestrator> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cache = CacheStoreFactory::new()
        .create(&config.cache, clock.clone())
        .await?;
    info!(backend = cache.backend_name(), "Cache store initialized");

    if let Some(interval) = config.cache.sweep_interval() {
        spawn_expiry_sweeper(cache.clone(), interval);
    }

    let embedder = EmbeddingProviderFactory::new().create(&config.embedding)?;
    info!(
        provider = embedder.provider_name(),
        dimensions = embedder.dimensions(),
        "Embedding provider initialized"
    );

    let index = Arc::new(InMemorySimilarityIndex::from_config(
        config.embedding.dimensions,
        &config.similarity,
    ));

    let backends = GeneratorBackendFactory::new().create_all(&config.backends)?;
    info!(count = backends.len(), "Generator backends initialized");

    let orchestrator = CacheOrchestrator::builder()
        .fingerprint_computer(FingerprintComputer::new(config.fingerprint))
        .cache(cache)
        .similarity_index(index)
        .embedding_provider(embedder)
        .coordinator(GenerationCoordinator::new(config.generation.clone())?)
        .backends(backends)
        .clock(clock)
        .config(config.orchestrator_config())
        .build()?;

    Ok(orchestrator)
}
