//! Application services

mod cache_orchestrator;
mod single_flight;

pub use cache_orchestrator::{CacheOrchestrator, CacheOrchestratorBuilder, OrchestratorConfig};
pub use single_flight::SingleFlight;
