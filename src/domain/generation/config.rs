//! Generation fan-out configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cross-backend duplicate handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Concatenate items as produced
    #[default]
    None,
    /// Drop items whose payload equals an earlier item's payload
    ExactPayload,
}

/// Configuration for the generation coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum backend calls in flight per episode
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,

    /// Per-attempt backend timeout in milliseconds
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    /// Retry once on transient failure
    #[serde(default = "default_true")]
    pub retry_transient: bool,

    /// Delay before the retry in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub dedup: DedupPolicy,
}

fn default_max_parallelism() -> usize {
    4
}

fn default_backend_timeout_ms() -> u64 {
    60_000
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_parallelism: default_max_parallelism(),
            backend_timeout_ms: default_backend_timeout_ms(),
            retry_transient: default_true(),
            retry_delay_ms: default_retry_delay_ms(),
            dedup: DedupPolicy::default(),
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = max;
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry_transient(mut self, retry: bool) -> Self {
        self.retry_transient = retry;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }
}
