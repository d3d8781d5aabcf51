//! Response cache keyed by upstream URL.
//!
//! # Responsibilities
//! - Look up a fresh entry for `(route, target URL)`
//! - Persist upstream successes (metadata first, then content)
//! - Invalidate one route, or sweep expired entries of every caching route
//!
//! # Design Decisions
//! - Key = SHA-256 of the built URL, so different parameter spellings that
//!   build the same URL share an entry
//! - Any partial or unreadable entry is a miss; cache errors never fail a request
//! - TTLs come from the pattern registry and are fixed for the process lifetime

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::store::{CacheStore, Slot};
use crate::cache::CacheError;
use crate::observability::metrics;
use crate::routing::PatternRegistry;

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Persisted alongside the content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub content_type: String,
    /// Epoch milliseconds at which the entry was stored.
    pub timestamp: u64,
}

/// A fresh cache hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub content: Bytes,
    pub content_type: String,
    pub stored_at_millis: u64,
    pub age: Duration,
    pub ttl: Duration,
}

impl CachedResponse {
    pub fn expires_in(&self) -> Duration {
        self.ttl.saturating_sub(self.age)
    }

    pub fn expires_at_millis(&self) -> u64 {
        expires_at_millis(self.stored_at_millis, self.ttl)
    }
}

/// `stored_at + ttl` in epoch milliseconds, saturating at `u64::MAX`.
pub fn expires_at_millis(stored_at_millis: u64, ttl: Duration) -> u64 {
    stored_at_millis.saturating_add(millis(ttl))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Stable cache key for a target URL.
pub fn cache_key(target_url: &str) -> String {
    format!("{:x}", Sha256::digest(target_url.as_bytes()))
}

/// Per-route cache over a [`CacheStore`].
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttls: BTreeMap<String, u64>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, registry: &PatternRegistry) -> Self {
        let ttls = registry
            .routes()
            .map(|route| (route.name().to_string(), route.cache_ttl_secs()))
            .collect();
        Self { store, clock, ttls }
    }

    /// TTL of `route`, or `None` when caching is disabled or the route is unknown.
    pub fn ttl(&self, route: &str) -> Option<Duration> {
        self.ttls
            .get(route)
            .copied()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Fresh entry for `target_url`, if any.
    pub async fn lookup(&self, route: &str, target_url: &str) -> Option<CachedResponse> {
        let ttl = self.ttl(route)?;
        let key = cache_key(target_url);
        match self.read_entry(route, &key, ttl).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(route = %route, key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn read_entry(
        &self,
        route: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let Some(raw_meta) = self.store.get(route, key, Slot::Metadata).await? else {
            return Ok(None);
        };
        let meta: CacheMetadata = serde_json::from_slice(&raw_meta)?;

        let age = Duration::from_millis(self.clock.now_millis().saturating_sub(meta.timestamp));
        if age >= ttl {
            return Ok(None);
        }

        let Some(content) = self.store.get(route, key, Slot::Content).await? else {
            return Ok(None);
        };

        Ok(Some(CachedResponse {
            content,
            content_type: meta.content_type,
            stored_at_millis: meta.timestamp,
            age,
            ttl,
        }))
    }

    /// Persist an upstream success. No-op for routes without caching.
    pub async fn store(
        &self,
        route: &str,
        target_url: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<(), CacheError> {
        if self.ttl(route).is_none() {
            return Ok(());
        }
        let key = cache_key(target_url);
        let meta = CacheMetadata {
            content_type: content_type.to_string(),
            timestamp: self.clock.now_millis(),
        };
        let meta = serde_json::to_vec(&meta)?;

        self.store.put(route, &key, Slot::Metadata, Bytes::from(meta)).await?;
        self.store.put(route, &key, Slot::Content, content).await?;

        tracing::debug!(route = %route, key = %key, "Stored response in cache");
        Ok(())
    }

    /// Delete every entry of `route`. Returns the number deleted.
    pub async fn invalidate_route(&self, route: &str) -> Result<usize, CacheError> {
        let mut deleted = 0;
        for key in self.store.scan_namespace(route).await? {
            if self.store.delete(route, &key).await? {
                deleted += 1;
            }
        }
        metrics::record_cache_evictions("invalidate", deleted);
        tracing::info!(route = %route, deleted, "Invalidated route cache");
        Ok(deleted)
    }

    /// Delete expired entries of every route with caching enabled.
    pub async fn sweep_expired(&self) -> usize {
        let mut total = 0;
        for (route, secs) in &self.ttls {
            if *secs == 0 {
                continue;
            }
            match self.sweep_route(route, Duration::from_secs(*secs)).await {
                Ok(deleted) => total += deleted,
                Err(e) => {
                    tracing::error!(route = %route, error = %e, "Cache sweep failed for route");
                }
            }
        }
        metrics::record_cache_evictions("expired", total);
        total
    }

    async fn sweep_route(&self, route: &str, ttl: Duration) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        let ttl_millis = millis(ttl);
        let mut deleted = 0;

        for key in self.store.scan_namespace(route).await? {
            let meta = self
                .store
                .get(route, &key, Slot::Metadata)
                .await?
                .and_then(|raw| serde_json::from_slice::<CacheMetadata>(&raw).ok());

            // Without readable metadata an entry can never become valid again.
            let expired = match meta {
                Some(meta) => now.saturating_sub(meta.timestamp) >= ttl_millis,
                None => true,
            };
            if expired && self.store.delete(route, &key).await? {
                deleted += 1;
            }
        }

        if deleted > 0 {
            tracing::debug!(route = %route, deleted, "Swept expired cache entries");
        }
        Ok(deleted)
    }
}
