//! In-memory front over a durable back store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::cache::{CacheEntry, CacheStore};
use crate::domain::clock::Clock;
use crate::domain::fingerprint::Fingerprint;
use crate::domain::DomainError;

/// Two-level cache store
///
/// Reads and hits try the front first and warm it from the back on a back
/// hit. A front hit updates the back hit counter in the background, so the
/// back count may briefly lag. The back decides last-write-wins. Back
/// failures are logged and the front keeps serving.
pub struct TieredCacheStore {
    front: Arc<dyn CacheStore>,
    back: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TieredCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCacheStore")
            .field("front", &self.front.backend_name())
            .field("back", &self.back.backend_name())
            .finish()
    }
}

impl TieredCacheStore {
    pub fn new(front: Arc<dyn CacheStore>, back: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { front, back, clock }
    }

    async fn warm_front(&self, entry: &CacheEntry) {
        if entry.is_expired(self.clock.now()) {
            return;
        }

        // Same window as the back copy: the entry keeps its own start and TTL
        if let Err(e) = self.front.put(entry.clone(), entry.ttl()).await {
            warn!(fingerprint = %entry.fingerprint(), error = %e, "Failed to warm front cache");
        }
    }
}

#[async_trait]
impl CacheStore for TieredCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, DomainError> {
        if let Some(entry) = self.front.get(fingerprint).await? {
            return Ok(Some(entry));
        }

        match self.back.get(fingerprint).await {
            Ok(Some(entry)) => {
                self.warm_front(&entry).await;
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Back cache read failed");
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: CacheEntry, ttl: Duration) -> Result<bool, DomainError> {
        let fingerprint = *entry.fingerprint();

        let back_accepted = match self.back.put(entry.clone(), ttl).await {
            Ok(accepted) => Some(accepted),
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Back cache write failed");
                None
            }
        };

        if back_accepted == Some(false) {
            // A newer version lives in the back; drop any stale front copy
            self.front.remove(&fingerprint).await?;
            return Ok(false);
        }

        let front_accepted = self.front.put(entry, ttl).await?;
        Ok(back_accepted.unwrap_or(front_accepted))
    }

    async fn record_hit(
        &self,
        fingerprint: &Fingerprint,
        refresh_ttl: bool,
    ) -> Result<Option<CacheEntry>, DomainError> {
        if let Some(entry) = self.front.record_hit(fingerprint, refresh_ttl).await? {
            // Front hits answer immediately; the back counter catches up off the request path
            let back = self.back.clone();
            let fingerprint = *fingerprint;
            tokio::spawn(async move {
                if let Err(e) = back.record_hit(&fingerprint, refresh_ttl).await {
                    warn!(fingerprint = %fingerprint, error = %e, "Back cache hit update failed");
                }
            });
            return Ok(Some(entry));
        }

        match self.back.record_hit(fingerprint, refresh_ttl).await {
            Ok(Some(entry)) => {
                self.warm_front(&entry).await;
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Back cache hit update failed");
                Ok(None)
            }
        }
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError> {
        let front = self.front.remove(fingerprint).await?;
        let back = self.back.remove(fingerprint).await.unwrap_or_else(|e| {
            warn!(fingerprint = %fingerprint, error = %e, "Back cache remove failed");
            false
        });

        Ok(front || back)
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        let front = self.front.purge_expired().await?;
        let back = self.back.purge_expired().await.unwrap_or_else(|e| {
            warn!(error = %e, "Back cache purge failed");
            0
        });

        Ok(front + back)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        match self.back.len().await {
            Ok(len) => Ok(len),
            Err(_) => self.front.len().await,
        }
    }

    fn backend_name(&self) -> &'static str {
        "tiered"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheStore;
    use crate::domain::clock::ManualClock;
    use crate::domain::generation::{BackendId, GeneratedItem};
    use crate::infrastructure::cache::{InMemoryCacheConfig, InMemoryCacheStore};
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

    fn memory(clock: &Arc<ManualClock>) -> Arc<InMemoryCacheStore> {
        Arc::new(InMemoryCacheStore::with_clock(
            InMemoryCacheConfig::default(),
            clock.clone(),
        ))
    }

    #[tokio::test]
    async fn test_back_hit_warms_front() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);
        let back = memory(&clock);
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        back.put(entry, TTL).await.unwrap();

        let tiered = TieredCacheStore::new(front.clone(), back, clock.clone());

        assert!(tiered.get(&fp).await.unwrap().is_some());
        assert!(front.get(&fp).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_writes_both_tiers() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);
        let back = memory(&clock);
        let tiered = TieredCacheStore::new(front.clone(), back.clone(), clock.clone());
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();

        assert!(tiered.put(entry, TTL).await.unwrap());

        assert!(front.contains(&fp).await.unwrap());
        assert!(back.contains(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn test_back_failure_is_soft() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);

        let mut back = MockCacheStore::new();
        back.expect_put()
            .returning(|_, _| Err(DomainError::cache("connection refused")));
        back.expect_get()
            .returning(|_| Err(DomainError::cache("connection refused")));
        back.expect_backend_name().return_const("redis");

        let tiered = TieredCacheStore::new(front, Arc::new(back), clock.clone());
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();

        assert!(tiered.put(entry, TTL).await.unwrap());
        assert!(tiered.get(&fp).await.unwrap().is_some());
        assert!(tiered
            .get(&Fingerprint::of_normalized("other"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rejected_back_write_drops_front_copy() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);
        let back = memory(&clock);
        let tiered = TieredCacheStore::new(front.clone(), back.clone(), clock.clone());

        let older = entry_for("login", clock.as_ref());
        let newer = entry_for("login", clock.as_ref());
        let fp = *older.fingerprint();
        front.put(older.clone(), TTL).await.unwrap();
        back.put(newer, TTL).await.unwrap();

        assert!(!tiered.put(older, TTL).await.unwrap());
        assert!(!front.contains(&fp).await.unwrap());
    }

    async fn back_hits(back: &InMemoryCacheStore, fp: &Fingerprint) -> u64 {
        for _ in 0..100 {
            let hits = back.get(fp).await.unwrap().map(|e| e.hit_count()).unwrap_or(0);
            if hits > 0 {
                return hits;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        0
    }

    #[tokio::test]
    async fn test_front_hit_short_circuits_back() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);
        let back = memory(&clock);
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        front.put(entry, TTL).await.unwrap();

        let tiered = TieredCacheStore::new(front, back, clock.clone());

        let hit = tiered.record_hit(&fp, false).await.unwrap().unwrap();
        assert_eq!(hit.hit_count(), 1);
    }

    #[tokio::test]
    async fn test_front_hit_updates_back_counter() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);
        let back = memory(&clock);
        let tiered = TieredCacheStore::new(front, back.clone(), clock.clone());
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        tiered.put(entry, TTL).await.unwrap();

        let hit = tiered.record_hit(&fp, false).await.unwrap().unwrap();

        assert_eq!(hit.hit_count(), 1);
        assert_eq!(back_hits(&back, &fp).await, 1);
    }

    #[tokio::test]
    async fn test_front_miss_counts_in_back_and_warms_front() {
        let clock = Arc::new(ManualClock::starting_now());
        let front = memory(&clock);
        let back = memory(&clock);
        let entry = entry_for("login", clock.as_ref());
        let fp = *entry.fingerprint();
        back.put(entry, TTL).await.unwrap();

        let tiered = TieredCacheStore::new(front.clone(), back.clone(), clock.clone());

        let hit = tiered.record_hit(&fp, false).await.unwrap().unwrap();
        assert_eq!(hit.hit_count(), 1);
        assert_eq!(back.get(&fp).await.unwrap().unwrap().hit_count(), 1);
        assert_eq!(front.get(&fp).await.unwrap().unwrap().hit_count(), 1);

        let again = tiered.record_hit(&fp, false).await.unwrap().unwrap();
        assert_eq!(again.hit_count(), 2);
    }

    #[tokio::test]
    async fn test_record_hit_miss_in_both_tiers() {
        let clock = Arc::new(ManualClock::starting_now());
        let tiered = TieredCacheStore::new(memory(&clock), memory(&clock), clock.clone());

        let hit = tiered
            .record_hit(&Fingerprint::of_normalized("unknown"), false)
            .await
            .unwrap();

        assert!(hit.is_none());
    }
}
