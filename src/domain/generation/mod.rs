//! Generation domain - backends, items, tasks and aggregated results

mod backend;
mod config;
mod item;
mod result;
mod task;

pub use backend::{validate_backend_id, BackendId, GeneratorBackend, MAX_BACKEND_ID_LENGTH};
pub use config::{DedupPolicy, GenerationConfig};
pub use item::{GeneratedItem, TestCase, TestCaseBatch, TestCasePriority};
pub use result::{AggregatedResult, BackendErrorKind, BackendFailure, ResultSource};
pub use task::{GenerationTask, TaskStatus};

#[cfg(test)]
pub use backend::mock;
