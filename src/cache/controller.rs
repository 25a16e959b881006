//! Cache controller over the KV store.
//!
//! Entries live under the `cache:` namespace of the shared KV store so that
//! upload metadata and cache values can never collide. Expiry is checked at
//! read time: an entry past its instant is a miss even if the backend still
//! holds it, and is deleted on the way out.

use arc_swap::ArcSwap;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::pattern::PurgePattern;
use crate::clock;
use crate::config::schema::CacheConfig;
use crate::error::{GatewayError, GatewayResult, ValidationRule};
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::storage::{KvEntry, KvStore};

const NAMESPACE: &str = "cache:";
const MAX_KEY_BYTES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
}

impl CacheSettings {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            default_ttl_secs: config.default_ttl_secs,
            max_ttl_secs: config.max_ttl_secs,
        }
    }
}

pub struct CacheController {
    store: Arc<dyn KvStore>,
    settings: ArcSwap<CacheSettings>,
    store_timeout: Duration,
}

impl CacheController {
    pub fn new(store: Arc<dyn KvStore>, settings: CacheSettings, store_timeout: Duration) -> Self {
        Self {
            store,
            settings: ArcSwap::from_pointee(settings),
            store_timeout,
        }
    }

    pub fn settings(&self) -> CacheSettings {
        **self.settings.load()
    }

    /// Swap TTL settings; applies to the next write.
    pub fn update_settings(&self, settings: CacheSettings) {
        self.settings.store(Arc::new(settings));
    }

    pub async fn get(&self, key: &str) -> GatewayResult<Option<Bytes>> {
        self.get_at(key, clock::now_millis()).await
    }

    pub async fn get_at(&self, key: &str, now_ms: u64) -> GatewayResult<Option<Bytes>> {
        validate_key(key)?;
        let stored = namespaced(key);
        let entry = with_timeout(self.store_timeout, "kv.get", self.store.get(&stored)).await?;

        let value = match entry {
            Some(entry) if entry.is_live(now_ms) => Some(entry.value),
            Some(_) => {
                // Lazy eviction; the miss stands even if the delete fails.
                if let Err(e) =
                    with_timeout(self.store_timeout, "kv.delete", self.store.delete(&stored)).await
                {
                    tracing::warn!(key = %key, error = %e, "Failed to evict expired cache entry");
                }
                None
            }
            None => None,
        };
        metrics::record_cache_lookup(value.is_some());
        Ok(value)
    }

    /// Store `value`, returning the TTL actually applied in seconds.
    pub async fn set(&self, key: &str, value: Bytes, ttl_secs: Option<u64>) -> GatewayResult<u64> {
        self.set_at(key, value, ttl_secs, clock::now_millis()).await
    }

    pub async fn set_at(
        &self,
        key: &str,
        value: Bytes,
        ttl_secs: Option<u64>,
        now_ms: u64,
    ) -> GatewayResult<u64> {
        validate_key(key)?;
        let settings = self.settings();
        let ttl = match ttl_secs {
            Some(0) => {
                return Err(GatewayError::validation(
                    ValidationRule::InvalidTtl,
                    "ttl must be a positive number of seconds",
                ))
            }
            Some(ttl) => ttl.min(settings.max_ttl_secs),
            None => settings.default_ttl_secs,
        };

        let expires_at = now_ms.saturating_add(ttl.saturating_mul(1_000));
        with_timeout(
            self.store_timeout,
            "kv.put",
            self.store.put(&namespaced(key), KvEntry::new(value, Some(expires_at))),
        )
        .await?;
        tracing::debug!(key = %key, ttl_secs = ttl, "Cache entry stored");
        Ok(ttl)
    }

    /// Returns true if an entry was removed.
    pub async fn delete(&self, key: &str) -> GatewayResult<bool> {
        validate_key(key)?;
        with_timeout(self.store_timeout, "kv.delete", self.store.delete(&namespaced(key))).await
    }

    /// Remove every live key matching `pattern`; returns how many went.
    pub async fn purge(&self, pattern: &str) -> GatewayResult<usize> {
        self.purge_at(pattern, clock::now_millis()).await
    }

    pub async fn purge_at(&self, pattern: &str, now_ms: u64) -> GatewayResult<usize> {
        let pattern = PurgePattern::parse(pattern)?;
        let listing = format!("{NAMESPACE}{}", pattern.literal_prefix());
        let keys = with_timeout(self.store_timeout, "kv.list", self.store.list(&listing)).await?;

        let mut purged = 0;
        for stored in keys {
            let Some(key) = stored.strip_prefix(NAMESPACE) else {
                continue;
            };
            if !pattern.matches(key) {
                continue;
            }
            let live = with_timeout(self.store_timeout, "kv.get", self.store.get(&stored))
                .await?
                .is_some_and(|entry| entry.is_live(now_ms));
            let removed =
                with_timeout(self.store_timeout, "kv.delete", self.store.delete(&stored)).await?;
            if live && removed {
                purged += 1;
            }
        }

        metrics::record_cache_purged(purged);
        tracing::info!(purged = purged, "Cache purge completed");
        Ok(purged)
    }
}

fn namespaced(key: &str) -> String {
    format!("{NAMESPACE}{key}")
}

fn validate_key(key: &str) -> GatewayResult<()> {
    let message = if key.is_empty() {
        "cache key must not be empty"
    } else if key.len() > MAX_KEY_BYTES {
        "cache key exceeds 512 bytes"
    } else if key.chars().any(char::is_control) {
        "cache key contains control characters"
    } else {
        return Ok(());
    };
    Err(GatewayError::validation(ValidationRule::InvalidKey, message))
}
