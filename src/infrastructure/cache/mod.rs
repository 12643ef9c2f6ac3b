//! Cache infrastructure - cache store implementations

mod factory;
mod in_memory;
mod redis;
mod sweeper;
mod tiered;

pub use factory::{CacheBackendType, CacheConfig, CacheStoreFactory};
pub use in_memory::{InMemoryCacheConfig, InMemoryCacheStore};
pub use redis::{RedisCacheConfig, RedisCacheStore};
pub use sweeper::spawn_expiry_sweeper;
pub use tiered::TieredCacheStore;
