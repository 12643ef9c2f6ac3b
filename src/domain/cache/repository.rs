//! Cache store trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::CacheEntry;
use crate::domain::fingerprint::Fingerprint;
use crate::domain::DomainError;

/// Key to entry store with TTL and recency-based eviction
///
/// Operations are atomic per key. An expired entry is never returned.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Returns the live entry for a fingerprint
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, DomainError>;

    /// Stores an entry with the given TTL
    ///
    /// Returns `false` when a stored entry with a strictly newer version
    /// rejected the write.
    async fn put(&self, entry: CacheEntry, ttl: Duration) -> Result<bool, DomainError>;

    /// Increments the hit counter of a live entry and returns the updated entry
    async fn record_hit(
        &self,
        fingerprint: &Fingerprint,
        refresh_ttl: bool,
    ) -> Result<Option<CacheEntry>, DomainError>;

    async fn contains(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError> {
        Ok(self.get(fingerprint).await?.is_some())
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError>;

    /// Drops expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<usize, DomainError>;

    /// Approximate number of stored entries
    async fn len(&self) -> Result<usize, DomainError>;

    fn backend_name(&self) -> &'static str;
}
