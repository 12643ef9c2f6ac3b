//! Per-key deduplication of in-flight work

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::domain::DomainError;

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, DomainError>>>;
type FlightMap<K, T> = Arc<Mutex<HashMap<K, SharedOutcome<T>>>>;

/// Removes the key once the work finishes, including on panic
struct Release<K: Hash + Eq, T> {
    flights: FlightMap<K, T>,
    key: K,
}

impl<K: Hash + Eq, T> Drop for Release<K, T> {
    fn drop(&mut self) {
        lock(&self.flights).remove(&self.key);
    }
}

fn lock<K, T>(flights: &FlightMap<K, T>) -> MutexGuard<'_, HashMap<K, SharedOutcome<T>>> {
    flights.lock().unwrap_or_else(|e| e.into_inner())
}

/// At most one in-flight computation per key
///
/// The first caller for a key becomes the leader: its work is spawned onto the
/// runtime and published as a shared future. Callers arriving while it runs
/// join that future and observe the same outcome, success or failure. The work
/// does not depend on any caller staying around, so dropping every waiter
/// leaves it running to completion.
pub struct SingleFlight<K, T> {
    flights: FlightMap<K, T>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Joins the flight for `key`, starting it with `work` when none exists
    ///
    /// Returns the shared outcome and whether this caller started the work.
    pub fn join_or_start<F, Fut>(&self, key: K, work: F) -> (SharedOutcome<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let mut flights = lock(&self.flights);

        if let Some(existing) = flights.get(&key) {
            return (existing.clone(), false);
        }

        let fut = work();
        let release = Release {
            flights: self.flights.clone(),
            key: key.clone(),
        };
        let handle = tokio::spawn(async move {
            let _release = release;
            fut.await
        });

        let outcome = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(DomainError::internal(format!(
                    "In-flight work did not complete: {}",
                    e
                ))),
            }
        }
        .boxed()
        .shared();

        flights.insert(key, outcome.clone());
        (outcome, true)
    }

    /// Number of keys with work in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.flights).contains_key(key)
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let in_flight = self.flights.lock().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("SingleFlight")
            .field("in_flight", &in_flight)
            .finish()
    }
}
