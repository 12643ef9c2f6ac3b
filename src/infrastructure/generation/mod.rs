//! Generation infrastructure - fan-out coordinator and backend implementations

mod coordinator;
mod factory;
mod llm_backend;
mod static_backend;

pub use coordinator::GenerationCoordinator;
pub use factory::{BackendConfig, BackendKind, GeneratorBackendFactory};
pub use llm_backend::{LlmGeneratorBackend, DEFAULT_INSTRUCTION};
pub use static_backend::StaticGeneratorBackend;
