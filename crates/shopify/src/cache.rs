//! Response cache for read calls.
//!
//! Entries are keyed by endpoint (REST) or operation plus variables
//! (GraphQL) and hold the parsed payload together with the response headers,
//! so pagination cursors can be recovered from a cached page. Validity is
//! checked against the entry's own timestamp; moka's TTL only bounds memory.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::ShopifyError;
use crate::executor::ApiResponse;

/// A cached response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Parsed response body.
    pub payload: Value,
    /// Lower-cased response headers.
    pub headers: BTreeMap<String, String>,
    /// When the entry was stored.
    pub stored_at: Instant,
}

impl CacheEntry {
    /// View the entry as an executor response.
    #[must_use]
    pub fn to_response(&self) -> ApiResponse {
        ApiResponse {
            data: self.payload.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// In-memory TTL cache of successful read responses.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Cache<String, CacheEntry>,
    ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { entries, ttl }
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any. Expired entries are dropped.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(key).await?;
        if entry.stored_at.elapsed() < self.ttl {
            debug!(key, "Cache hit");
            return Some(entry);
        }
        debug!(key, "Cache entry expired");
        self.entries.invalidate(key).await;
        None
    }

    /// Store a response.
    pub async fn set(&self, key: &str, payload: Value, headers: BTreeMap<String, String>) {
        let entry = CacheEntry {
            payload,
            headers,
            stored_at: Instant::now(),
        };
        self.entries.insert(key.to_string(), entry).await;
    }

    /// Drop one entry, or every entry when `key` is `None`.
    pub async fn invalidate(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                debug!(key, "Invalidating cache entry");
                self.entries.invalidate(key).await;
            }
            None => {
                debug!("Invalidating entire response cache");
                self.entries.invalidate_all();
            }
        }
    }

    /// Serve `key` from cache, or run `producer` and cache its result.
    ///
    /// `force_refresh` skips the lookup but still stores the new response.
    /// Failures are never cached.
    ///
    /// # Errors
    ///
    /// Returns whatever `producer` returns on failure.
    pub async fn fetch_cached<F, Fut>(
        &self,
        key: &str,
        producer: F,
        force_refresh: bool,
    ) -> Result<CacheEntry, ShopifyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ApiResponse, ShopifyError>>,
    {
        if !force_refresh && let Some(entry) = self.get(key).await {
            return Ok(entry);
        }
        debug!(key, force_refresh, "Cache miss");

        let response = producer().await?;
        let entry = CacheEntry {
            payload: response.data,
            headers: response.headers,
            stored_at: Instant::now(),
        };
        self.entries.insert(key.to_string(), entry.clone()).await;
        Ok(entry)
    }
}

/// Cache key for a REST endpoint (including its query string).
#[must_use]
pub fn rest_cache_key(endpoint: &str) -> String {
    format!("rest:{endpoint}")
}

/// Cache key for a GraphQL operation and its variables.
#[must_use]
pub fn graphql_cache_key(operation: &str, variables: &Value) -> String {
    format!("graphql:{operation}:{variables}")
}
