//! Similarity lookup configuration

use serde::{Deserialize, Serialize};

/// Ordering between candidates with equal similarity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    MostRecent,
    Oldest,
}

/// Configuration for similarity lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Whether similarity lookup and indexing are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum cosine similarity for a hit (inclusive)
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Candidates fetched per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Index capacity; the oldest inserts are evicted first
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default)]
    pub tie_break: TieBreak,

    /// Remove dangling fingerprints from the index when found
    #[serde(default = "default_enabled")]
    pub prune_tombstones: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> f32 {
    0.7
}

fn default_top_k() -> usize {
    3
}

fn default_max_entries() -> usize {
    10000
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            threshold: default_threshold(),
            top_k: default_top_k(),
            max_entries: default_max_entries(),
            tie_break: TieBreak::default(),
            prune_tombstones: default_enabled(),
        }
    }
}

impl SimilarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_prune_tombstones(mut self, prune: bool) -> Self {
        self.prune_tombstones = prune;
        self
    }
}
