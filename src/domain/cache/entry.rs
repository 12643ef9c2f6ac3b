//! Cache entry

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::clock::next_write_stamp;
use crate::domain::fingerprint::Fingerprint;
use crate::domain::generation::GeneratedItem;

/// A generated result stored under its specification's fingerprint
///
/// The embedding is the vector of the same normalized specification that
/// produced the fingerprint. It is empty when similarity lookup is disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    fingerprint: Fingerprint,
    embedding: Vec<f32>,
    payload: Vec<GeneratedItem>,
    created_at: DateTime<Utc>,
    ttl_seconds: u64,
    /// Sub-second remainder of the TTL
    #[serde(default, skip_serializing_if = "is_zero")]
    ttl_subsec_nanos: u32,
    hit_count: u64,
    /// Start of the current TTL window when a hit restarted it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refreshed_at: Option<DateTime<Utc>>,
    /// Monotonic write stamp used for last-write-wins
    #[serde(default)]
    version: u64,
}

fn is_zero(nanos: &u32) -> bool {
    *nanos == 0
}

impl CacheEntry {
    pub fn new(
        fingerprint: Fingerprint,
        embedding: Vec<f32>,
        payload: Vec<GeneratedItem>,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            fingerprint,
            embedding,
            payload,
            created_at,
            ttl_seconds: ttl.as_secs(),
            ttl_subsec_nanos: ttl.subsec_nanos(),
            hit_count: 0,
            refreshed_at: None,
            version: next_write_stamp(),
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn payload(&self) -> &[GeneratedItem] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<GeneratedItem> {
        self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
            .saturating_add(Duration::from_nanos(u64::from(self.ttl_subsec_nanos)))
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_seconds = ttl.as_secs();
        self.ttl_subsec_nanos = ttl.subsec_nanos();
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_hit_count(mut self, hit_count: u64) -> Self {
        self.hit_count = hit_count;
        self
    }

    pub fn with_refreshed_at(mut self, refreshed_at: Option<DateTime<Utc>>) -> Self {
        self.refreshed_at = refreshed_at;
        self
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let window_start = self.refreshed_at.unwrap_or(self.created_at);
        chrono::Duration::from_std(self.ttl())
            .ok()
            .and_then(|ttl| window_start.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expired at or after `created_at + ttl` (or from the last refresh)
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at() - now)
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }

    /// Bumps the hit counter and optionally restarts the TTL window
    pub fn record_hit(&mut self, now: DateTime<Utc>, refresh_ttl: bool) {
        self.hit_count = self.hit_count.saturating_add(1);
        if refresh_ttl {
            self.refreshed_at = Some(now);
        }
    }

    /// Last-write-wins: a write is rejected only by a strictly newer stored version
    pub fn supersedes(&self, stored: &CacheEntry) -> bool {
        self.version >= stored.version
    }
}
