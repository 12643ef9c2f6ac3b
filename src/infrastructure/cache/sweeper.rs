//! Background expiry sweeper

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::cache::CacheStore;

/// Periodically purges expired entries from a cache store
///
/// Lazy expiry on read already guarantees no expired hit; the sweeper only
/// reclaims memory. Abort the returned handle to stop it.
pub fn spawn_expiry_sweeper(store: Arc<dyn CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    debug!(removed, backend = store.backend_name(), "Purged expired cache entries")
                }
                Err(e) => warn!(error = %e, "Cache expiry sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheEntry;
    use crate::domain::clock::{Clock, ManualClock};
    use crate::domain::fingerprint::Fingerprint;
    use crate::infrastructure::cache::{InMemoryCacheConfig, InMemoryCacheStore};

    #[tokio::test]
    async fn test_sweeper_purges_expired_entries() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(InMemoryCacheStore::with_clock(
            InMemoryCacheConfig::default(),
            clock.clone(),
        ));
        let ttl = Duration::from_secs(60);

        for text in ["a", "b", "c"] {
            let entry = CacheEntry::new(
                Fingerprint::of_normalized(text),
                vec![],
                vec![],
                clock.now(),
                ttl,
            );
            store.put(entry, ttl).await.unwrap();
        }
        clock.advance(ttl);

        let handle = spawn_expiry_sweeper(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(store.len().await.unwrap(), 0);
    }
}
