//! Fast tier: TTL key/value cache
//!
//! Backed by Redis when the startup probe succeeds. Every write also lands in
//! an in-process map that never expires, so reads keep working when Redis is
//! down. The map is an availability backstop only; entries there outlive
//! their TTL.

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::MemoryResult;
use crate::capability::{Capability, TierState};
use crate::config::ShortTermConfig;

/// Upper bound on the startup liveness probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Fast tier store
pub struct ShortTermStore {
    cache: Capability<MultiplexedConnection>,
    url: Option<String>,
    fallback: RwLock<HashMap<String, String>>,
    default_ttl: u64,
}

impl ShortTermStore {
    /// Connect to the configured cache, degrading to fallback-only on failure
    pub async fn connect(config: &ShortTermConfig) -> Self {
        let url = config.url();

        let cache = match tokio::time::timeout(PROBE_TIMEOUT, probe(&url)).await {
            Ok(Ok(conn)) => {
                tracing::info!(host = %config.host, port = config.port, db = config.db, "Connected to short-term cache");
                Capability::Available(conn)
            }
            Ok(Err(e)) => {
                tracing::warn!(host = %config.host, port = config.port, error = %e, "Short-term cache unavailable, using in-memory fallback");
                Capability::degraded(e.to_string())
            }
            Err(_) => {
                tracing::warn!(host = %config.host, port = config.port, "Short-term cache probe timed out, using in-memory fallback");
                Capability::degraded(format!("probe timed out after {}s", PROBE_TIMEOUT.as_secs()))
            }
        };

        Self {
            cache,
            url: Some(url),
            fallback: RwLock::new(HashMap::new()),
            default_ttl: config.ttl,
        }
    }

    /// A store that never talks to an external cache
    pub fn fallback_only(default_ttl: u64) -> Self {
        Self {
            cache: Capability::degraded("external cache disabled"),
            url: None,
            fallback: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store a value.
    ///
    /// The fallback map is always written; the cache write is best effort.
    /// Returns false only when the value cannot be serialized.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Could not serialize short-term value");
                return false;
            }
        };

        self.fallback
            .write()
            .await
            .insert(key.to_string(), serialized.clone());

        if let Some(conn) = self.cache.get() {
            // EX rejects 0, so a zero TTL means "use the default"
            let ttl = ttl.filter(|ttl| *ttl > 0).unwrap_or(self.default_ttl);
            let mut conn = conn.clone();
            let result: redis::RedisResult<()> = redis::cmd("SET")
                .arg(key)
                .arg(&serialized)
                .arg("EX")
                .arg(ttl)
                .query_async(&mut conn)
                .await;

            if let Err(e) = result {
                tracing::warn!(key = %key, error = %e, "Short-term cache write failed, kept in fallback");
            }
        }

        tracing::debug!(key = %key, "Stored short-term value");
        true
    }

    /// Fetch a value: cache first, then the fallback map
    pub async fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.cache_get(key).await {
            Some(raw) => raw,
            None => self.fallback.read().await.get(key).cloned()?,
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Stored short-term value is not valid JSON");
                None
            }
        }
    }

    /// Fetch a value and deserialize it into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Short-term value has an unexpected shape");
                None
            }
        }
    }

    async fn cache_get(&self, key: &str) -> Option<String> {
        let mut conn = self.cache.get()?.clone();
        let result: redis::RedisResult<Option<String>> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;

        match result {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Short-term cache read failed, checking fallback");
                None
            }
        }
    }

    /// Entries held in the fallback map
    pub async fn fallback_len(&self) -> usize {
        self.fallback.read().await.len()
    }

    /// Keys in the cache database, when the cache is reachable
    pub async fn cache_key_count(&self) -> Option<u64> {
        let mut conn = self.cache.get()?.clone();
        let result: redis::RedisResult<u64> = redis::cmd("DBSIZE").query_async(&mut conn).await;

        match result {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Could not count short-term cache keys");
                None
            }
        }
    }

    /// Re-check the cache without changing the tier state
    pub async fn ping(&self) -> bool {
        if let Some(conn) = self.cache.get() {
            let mut conn = conn.clone();
            let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            return pong.is_ok();
        }

        match &self.url {
            Some(url) => matches!(tokio::time::timeout(PROBE_TIMEOUT, probe(url)).await, Ok(Ok(_))),
            None => false,
        }
    }

    pub fn is_cache_available(&self) -> bool {
        self.cache.is_available()
    }

    /// Why the cache is not in use, if it is not
    pub fn degraded_reason(&self) -> Option<&str> {
        self.cache.reason()
    }

    pub fn state(&self) -> TierState {
        self.cache.state()
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }
}

async fn probe(url: &str) -> MemoryResult<MultiplexedConnection> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(conn)
}
