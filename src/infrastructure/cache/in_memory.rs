//! In-memory cache store using moka

use std::future::ready;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use moka::policy::EvictionPolicy;
use moka::Expiry;

use crate::domain::cache::{CacheEntry, CacheStore};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::fingerprint::Fingerprint;
use crate::domain::DomainError;

/// Configuration for the in-memory cache store
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries before least-recently-used eviction
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Tells moka when an entry lapses, measured against the injected clock
#[derive(Debug)]
struct EntryExpiry {
    clock: Arc<dyn Clock>,
}

impl EntryExpiry {
    fn remaining(&self, entry: &CacheEntry) -> Option<Duration> {
        Some(entry.remaining_ttl(self.clock.now()).unwrap_or(Duration::ZERO))
    }
}

impl Expiry<Fingerprint, Arc<CacheEntry>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &Fingerprint,
        value: &Arc<CacheEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.remaining(value)
    }

    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.remaining(value)
    }
}

/// Process-local cache store
///
/// - Per-key atomic updates through moka's entry compute API
/// - Least-recently-used eviction at capacity, without blocking other keys
/// - Expiry checked against the injected clock on every read
#[derive(Debug)]
pub struct InMemoryCacheStore {
    cache: MokaCache<Fingerprint, Arc<CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: InMemoryCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry {
                clock: clock.clone(),
            })
            .build();

        Self { cache, clock }
    }

    /// Removes the entry only if it is still expired when the key is locked
    async fn remove_if_expired(&self, fingerprint: Fingerprint) -> bool {
        let now = self.clock.now();

        let result = self
            .cache
            .entry(fingerprint)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(current) if current.value().is_expired(now) => Op::Remove,
                    _ => Op::Nop,
                };
                ready(op)
            })
            .await;

        matches!(result, CompResult::Removed(_))
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, DomainError> {
        match self.cache.get(fingerprint).await {
            Some(entry) if entry.is_expired(self.clock.now()) => {
                self.remove_if_expired(*fingerprint).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(CacheEntry::clone(&entry))),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry, ttl: Duration) -> Result<bool, DomainError> {
        let fingerprint = *entry.fingerprint();
        let incoming = Arc::new(entry.with_ttl(ttl));
        let now = self.clock.now();

        let result = self
            .cache
            .entry(fingerprint)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(current)
                        if !current.value().is_expired(now)
                            && !incoming.supersedes(current.value()) =>
                    {
                        Op::Nop
                    }
                    _ => Op::Put(incoming),
                };
                ready(op)
            })
            .await;

        Ok(!matches!(result, CompResult::Unchanged(_)))
    }

    async fn record_hit(
        &self,
        fingerprint: &Fingerprint,
        refresh_ttl: bool,
    ) -> Result<Option<CacheEntry>, DomainError> {
        let now = self.clock.now();

        let result = self
            .cache
            .entry(*fingerprint)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(current) if current.value().is_expired(now) => Op::Remove,
                    Some(current) => {
                        let mut updated = CacheEntry::clone(current.value());
                        updated.record_hit(now, refresh_ttl);
                        Op::Put(Arc::new(updated))
                    }
                    None => Op::Nop,
                };
                ready(op)
            })
            .await;

        match result {
            CompResult::ReplacedWith(entry) => Ok(Some(Arc::unwrap_or_clone(entry.into_value()))),
            _ => Ok(None),
        }
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError> {
        Ok(self.cache.remove(fingerprint).await.is_some())
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        let now = self.clock.now();
        let expired: Vec<Fingerprint> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| *key)
            .collect();

        let mut removed = 0;
        for fingerprint in expired {
            if self.remove_if_expired(fingerprint).await {
                removed += 1;
            }
        }

        self.cache.run_pending_tasks().await;
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::generation::{BackendId, GeneratedItem};
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    fn entry_for(text: &str, clock: &dyn Clock) -> CacheEntry {
        let item = GeneratedItem::from_value(
            BackendId::new("alpha").unwrap(),
            json!({"title": text}),
        )
        .unwrap();

        CacheEntry::new(
            Fingerprint::of_normalized(text),
            vec![1.0, 0.0],
            vec![item],
            clock.now(),
            TTL,
        )
    }

    fn store_with_clock() -> (InMemoryCacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = InMemoryCacheStore::with_clock(InMemoryCacheConfig::default(), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, clock) = store_with_clock();
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();

        assert!(store.put(entry.clone(), TTL).await.unwrap());

        let found = store.get(&fp).await.unwrap().unwrap();
        assert_eq!(found, entry);
        assert!(store.contains(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn test_miss() {
        let store = InMemoryCacheStore::new();
        let fp = Fingerprint::of_normalized("absent");

        assert!(store.get(&fp).await.unwrap().is_none());
        assert!(store.record_hit(&fp, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_boundary_under_simulated_clock() {
        let (store, clock) = store_with_clock();
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        store.put(entry, TTL).await.unwrap();

        clock.advance(Duration::from_secs(59));
        assert!(store.get(&fp).await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_hit_increments_counter() {
        let (store, clock) = store_with_clock();
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        store.put(entry, TTL).await.unwrap();

        let first = store.record_hit(&fp, false).await.unwrap().unwrap();
        let second = store.record_hit(&fp, false).await.unwrap().unwrap();

        assert_eq!(first.hit_count(), 1);
        assert_eq!(second.hit_count(), 2);
        assert_eq!(store.get(&fp).await.unwrap().unwrap().hit_count(), 2);
    }

    #[tokio::test]
    async fn test_record_hit_refreshes_ttl_when_asked() {
        let (store, clock) = store_with_clock();
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        store.put(entry, TTL).await.unwrap();

        clock.advance(Duration::from_secs(50));
        store.record_hit(&fp, true).await.unwrap();

        clock.advance(Duration::from_secs(50));
        assert!(store.get(&fp).await.unwrap().is_some());

        clock.advance(Duration::from_secs(10));
        assert!(store.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_hit_without_refresh_keeps_deadline() {
        let (store, clock) = store_with_clock();
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        store.put(entry, TTL).await.unwrap();

        clock.advance(Duration::from_secs(50));
        store.record_hit(&fp, false).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(store.get(&fp).await.unwrap().is_none());
        assert!(store.record_hit(&fp, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins_by_version() {
        let (store, clock) = store_with_clock();
        let older = entry_for("login", clock.as_ref());
        let newer = entry_for("login", clock.as_ref());
        let fp = *newer.fingerprint();
        assert!(newer.version() > older.version());

        assert!(store.put(newer.clone(), TTL).await.unwrap());
        assert!(!store.put(older, TTL).await.unwrap());

        assert_eq!(store.get(&fp).await.unwrap().unwrap().version(), newer.version());
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaced_regardless_of_version() {
        let (store, clock) = store_with_clock();
        store.put(entry_for("login", clock.as_ref()), TTL).await.unwrap();

        clock.advance(TTL);
        let stale_version = entry_for("login", clock.as_ref()).with_version(1);

        assert!(store.put(stale_version, TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_puts_keep_highest_version() {
        let (store, clock) = store_with_clock();
        let store = Arc::new(store);
        let entries: Vec<CacheEntry> = (0..20).map(|_| entry_for("login", clock.as_ref())).collect();
        let max_version = entries.iter().map(|e| e.version()).max().unwrap();
        let fp = *entries[0].fingerprint();

        let handles: Vec<_> = entries
            .into_iter()
            .rev()
            .map(|entry| {
                let store = store.clone();
                tokio::spawn(async move { store.put(entry, TTL).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get(&fp).await.unwrap().unwrap().version(), max_version);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_with_clock();
        store.put(entry_for("a", clock.as_ref()), TTL).await.unwrap();
        store.put(entry_for("b", clock.as_ref()), TTL).await.unwrap();

        clock.advance(Duration::from_secs(30));
        store
            .put(entry_for("c", clock.as_ref()), TTL)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(30));
        let removed = store.purge_expired().await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryCacheStore::new();
        let clock = SystemClock;
        let entry = entry_for("login", &clock);
        let fp = *entry.fingerprint();
        store.put(entry, TTL).await.unwrap();

        assert!(store.remove(&fp).await.unwrap());
        assert!(!store.remove(&fp).await.unwrap());
        assert!(store.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let store = InMemoryCacheStore::with_config(InMemoryCacheConfig::default().with_max_capacity(5));
        let clock = SystemClock;

        for i in 0..20 {
            store
                .put(entry_for(&format!("spec {}", i), &clock), TTL)
                .await
                .unwrap();
        }

        assert!(store.len().await.unwrap() <= 5);
    }

    #[tokio::test]
    async fn test_backend_name() {
        assert_eq!(InMemoryCacheStore::new().backend_name(), "in_memory");
    }
}
