//! Embedding domain - text to fixed-dimension vectors

mod provider;

pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::mock;
