//! Similarity domain - approximate lookup over specification embeddings

mod config;
mod math;
mod repository;

pub use config::{SimilarityConfig, TieBreak};
pub use math::{cosine_similarity, l2_normalize};
pub use repository::{SimilarityIndex, SimilarityMatch};

#[cfg(test)]
pub use repository::MockSimilarityIndex;
