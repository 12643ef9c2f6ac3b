//! Domain layer - specification keying, cache and generation contracts

pub mod cache;
pub mod clock;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod generation;
pub mod similarity;
pub mod specification;

pub use cache::{CacheEntry, CacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use embedding::EmbeddingProvider;
pub use error::DomainError;
pub use fingerprint::{Fingerprint, FingerprintComputer, NormalizationRule};
pub use generation::{
    AggregatedResult, BackendErrorKind, BackendFailure, BackendId, DedupPolicy, GeneratedItem,
    GenerationConfig, GenerationTask, GeneratorBackend, ResultSource, TaskStatus, TestCase,
};
pub use similarity::{SimilarityConfig, SimilarityIndex, SimilarityMatch, TieBreak};
pub use specification::SpecificationRequest;
