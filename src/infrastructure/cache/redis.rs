//! Redis cache store

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use crate::domain::cache::{CacheEntry, CacheStore};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::fingerprint::Fingerprint;
use crate::domain::DomainError;

/// Writes the entry unless the stored version is strictly newer
static PUT_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local current = redis.call('HGET', KEYS[1], 'version')
if current and tonumber(current) > tonumber(ARGV[2]) then
  return 0
end
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], 'entry', ARGV[1], 'hits', 0, 'version', ARGV[2], 'ttl', ARGV[3])
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return 1
",
    )
});

/// Increments hits and optionally restarts the TTL window
static HIT_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return nil
end
local hits = redis.call('HINCRBY', KEYS[1], 'hits', 1)
if ARGV[1] == '1' then
  redis.call('HSET', KEYS[1], 'refreshed_at', ARGV[2])
  redis.call('PEXPIRE', KEYS[1], redis.call('HGET', KEYS[1], 'ttl'))
end
return {redis.call('HGET', KEYS[1], 'entry'), hits, redis.call('HGET', KEYS[1], 'refreshed_at') or ''}
",
    )
});

/// Configuration for the Redis cache store
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Namespace in front of `:spec:{hex}`
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "spec".to_string(),
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

fn entry_key(prefix: &str, fingerprint: &Fingerprint) -> String {
    format!("{}:spec:{}", prefix, fingerprint.to_hex())
}

/// Key lifetime in whole milliseconds, rounded up so Redis never drops a live entry
fn expire_millis(ttl: Duration) -> u64 {
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    if ttl.as_nanos() % 1_000_000 == 0 {
        millis.max(1)
    } else {
        millis.saturating_add(1)
    }
}

fn parse_refreshed_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn decode_entry(
    raw: &str,
    hits: u64,
    refreshed_at: Option<DateTime<Utc>>,
) -> Result<CacheEntry, DomainError> {
    let entry: CacheEntry = serde_json::from_str(raw)
        .map_err(|e| DomainError::cache(format!("Corrupt cache entry: {}", e)))?;

    Ok(entry.with_hit_count(hits).with_refreshed_at(refreshed_at))
}

/// Durable cache store over Redis hashes
///
/// Each entry lives at `{prefix}:spec:{hex}` as a hash with the serialized
/// entry, its hit counter and its write version. Writes and hit updates run
/// as Lua scripts so they are atomic per key; Redis `PEXPIRE` enforces the TTL.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
    config: RedisCacheConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCacheStore {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        config: RedisCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            config,
            clock,
        })
    }

    fn key(&self, fingerprint: &Fingerprint) -> String {
        entry_key(&self.config.key_prefix, fingerprint)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, DomainError> {
        let key = self.key(fingerprint);
        let mut conn = self.connection.clone();

        let (raw, hits, refreshed): (Option<String>, Option<u64>, Option<String>) =
            redis::cmd("HMGET")
                .arg(&key)
                .arg("entry")
                .arg("hits")
                .arg("refreshed_at")
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to get '{}': {}", key, e)))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let entry = decode_entry(
            &raw,
            hits.unwrap_or_default(),
            refreshed.as_deref().and_then(parse_refreshed_at),
        )?;

        if entry.is_expired(self.clock.now()) {
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn put(&self, entry: CacheEntry, ttl: Duration) -> Result<bool, DomainError> {
        let key = self.key(entry.fingerprint());
        let entry = entry.with_ttl(ttl).with_hit_count(0).with_refreshed_at(None);
        let payload = serde_json::to_string(&entry)
            .map_err(|e| DomainError::cache(format!("Failed to serialize entry: {}", e)))?;
        let mut conn = self.connection.clone();

        let written: i64 = PUT_SCRIPT
            .key(&key)
            .arg(payload)
            .arg(entry.version())
            .arg(expire_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to put '{}': {}", key, e)))?;

        Ok(written == 1)
    }

    async fn record_hit(
        &self,
        fingerprint: &Fingerprint,
        refresh_ttl: bool,
    ) -> Result<Option<CacheEntry>, DomainError> {
        let key = self.key(fingerprint);
        let now = self.clock.now();
        let mut conn = self.connection.clone();

        let result: Option<(String, u64, String)> = HIT_SCRIPT
            .key(&key)
            .arg(if refresh_ttl { "1" } else { "0" })
            .arg(now.to_rfc3339())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to record hit '{}': {}", key, e)))?;

        let Some((raw, hits, refreshed)) = result else {
            return Ok(None);
        };

        let entry = decode_entry(&raw, hits, parse_refreshed_at(&refreshed))?;
        if entry.is_expired(now) {
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError> {
        let key = self.key(fingerprint);
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(&key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to delete '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        // Redis expires keys on its own
        Ok(0)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let pattern = format!("{}:spec:*", self.config.key_prefix);
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut count = 0usize;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to scan keys: {}", e)))?;

            count += keys.len();
            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
