//! Cache domain - exact-match result store keyed by fingerprint

mod entry;
mod repository;

pub use entry::CacheEntry;
pub use repository::CacheStore;

#[cfg(test)]
pub use repository::MockCacheStore;
