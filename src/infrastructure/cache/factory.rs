//! Cache store factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::in_memory::{InMemoryCacheConfig, InMemoryCacheStore};
use super::redis::{RedisCacheConfig, RedisCacheStore};
use super::tiered::TieredCacheStore;
use crate::domain::cache::CacheStore;
use crate::domain::clock::Clock;
use crate::domain::DomainError;

/// Supported cache store backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendType {
    /// In-memory store using moka
    #[default]
    InMemory,
    /// Redis store
    Redis,
    /// In-memory front over Redis
    Tiered,
}

impl std::fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendType::InMemory => write!(f, "in_memory"),
            CacheBackendType::Redis => write!(f, "redis"),
            CacheBackendType::Tiered => write!(f, "tiered"),
        }
    }
}

impl std::str::FromStr for CacheBackendType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheBackendType::InMemory),
            "redis" => Ok(CacheBackendType::Redis),
            "tiered" => Ok(CacheBackendType::Tiered),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache backend: {}. Valid backends: in_memory, redis, tiered",
                s
            ))),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendType,

    /// Capacity of the in-memory store
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Entry time-to-live in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Restart the TTL window on every hit
    #[serde(default)]
    pub refresh_ttl_on_hit: bool,

    /// Background sweep period in seconds, 0 disables the sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "spec".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendType::default(),
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            refresh_ttl_on_hit: false,
            sweep_interval_secs: default_sweep_interval_secs(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl CacheConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: CacheBackendType::Redis,
            redis_url: url.into(),
            ..Default::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// `None` when the sweeper is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_max_entries(mut self, max: u64) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_refresh_ttl_on_hit(mut self, refresh: bool) -> Self {
        self.refresh_ttl_on_hit = refresh;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn in_memory_config(&self) -> InMemoryCacheConfig {
        InMemoryCacheConfig::default().with_max_capacity(self.max_entries)
    }

    fn redis_config(&self) -> RedisCacheConfig {
        RedisCacheConfig::new(self.redis_url.clone()).with_key_prefix(self.key_prefix.clone())
    }
}

/// Factory for creating cache stores
#[derive(Debug, Default)]
pub struct CacheStoreFactory;

impl CacheStoreFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(
        &self,
        config: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<dyn CacheStore>, DomainError> {
        if config.ttl_secs == 0 {
            return Err(DomainError::configuration(
                "cache.ttl_secs must be greater than 0",
            ));
        }

        match config.backend {
            CacheBackendType::InMemory => Ok(Arc::new(InMemoryCacheStore::with_clock(
                config.in_memory_config(),
                clock,
            ))),
            CacheBackendType::Redis => Ok(Arc::new(
                RedisCacheStore::with_clock(config.redis_config(), clock).await?,
            )),
            CacheBackendType::Tiered => {
                let front = Arc::new(InMemoryCacheStore::with_clock(
                    config.in_memory_config(),
                    clock.clone(),
                ));
                let back = Arc::new(RedisCacheStore::with_clock(config.redis_config(), clock.clone()).await?);

                Ok(Arc::new(TieredCacheStore::new(front, back, clock)))
            }
        }
    }
}
