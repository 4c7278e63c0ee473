//! # Cache Module
//!
//! HTTP validators and a TTL-backed memoization store.
//!
//! [`CacheManager`] covers two concerns the cache middleware needs:
//!
//! - **Validators**: strong ETags derived from the serialized response body,
//!   `If-None-Match` / `If-Modified-Since` evaluation and `Cache-Control` /
//!   `Vary` header construction
//! - **Values**: `put` / `get` / `has` / `invalidate` over a [`TtlStore`], plus
//!   [`CacheManager::remember`], which runs its producer at most once per key
//!   per TTL window even when many callers race for the same key
//!
//! Values are stored as JSON, so anything `Serialize + DeserializeOwned` can be
//! cached.

mod http_date;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::message::{Request, Response};
use crate::store::{MemoryStore, TtlStore};

pub use http_date::{format_http_date, parse_http_date, truncate_to_seconds};

const KEY_PREFIX: &str = "cache:";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cached value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Producer(anyhow::Error),
}

/// Directives rendered into `Cache-Control` and `Vary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDirectives {
    pub max_age: u64,
    pub must_revalidate: bool,
    /// `private` instead of `public`.
    pub private: bool,
    pub vary: Vec<String>,
}

impl Default for CacheDirectives {
    fn default() -> Self {
        Self {
            max_age: 3600,
            must_revalidate: false,
            private: false,
            vary: Vec::new(),
        }
    }
}

impl CacheDirectives {
    #[must_use]
    pub fn cache_control(&self) -> String {
        let mut value = format!(
            "{}, max-age={}",
            if self.private { "private" } else { "public" },
            self.max_age
        );
        if self.must_revalidate {
            value.push_str(", must-revalidate");
        }
        value
    }
}

/// Validators and memoized values over a shared [`TtlStore`].
pub struct CacheManager {
    store: Arc<dyn TtlStore>,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CacheManager {
    #[must_use]
    pub fn new(store: Arc<dyn TtlStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::with_clock(Arc::clone(&clock)));
        Self::new(store, clock)
    }

    #[must_use]
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Quoted hex SHA-256 of `content`.
    #[must_use]
    pub fn generate_etag(&self, content: &[u8]) -> String {
        let hex: String = Sha256::digest(content)
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        format!("\"{hex}\"")
    }

    /// ETag of a response's serialized body.
    #[must_use]
    pub fn etag_for(&self, response: &Response) -> String {
        self.generate_etag(&response.body_bytes())
    }

    /// Whether `If-None-Match` matches `etag`.
    ///
    /// Accepts `*`, comma-separated lists and weak (`W/`) forms.
    #[must_use]
    pub fn is_not_modified(&self, request: &Request, etag: &str) -> bool {
        let Some(header) = request.get_header("If-None-Match") else {
            return false;
        };
        let wanted = strip_weak(etag.trim());
        header
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || strip_weak(candidate) == wanted)
    }

    /// Whether `If-Modified-Since` is at or after `last_modified` (to the second).
    #[must_use]
    pub fn check_last_modified(&self, request: &Request, last_modified: SystemTime) -> bool {
        request
            .get_header("If-Modified-Since")
            .and_then(parse_http_date)
            .is_some_and(|since| since >= truncate_to_seconds(last_modified))
    }

    pub fn set_cache_headers(&self, response: &mut Response, directives: &CacheDirectives) {
        response.set_header("Cache-Control", directives.cache_control());
        if !directives.vary.is_empty() {
            response.append_vary(&directives.vary.join(", "));
        }
    }

    /// # Errors
    ///
    /// [`CacheError::Serialization`] when `value` cannot be represented as JSON.
    pub fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        self.store
            .put(&Self::storage_key(key), serde_json::to_value(value)?, ttl);
        Ok(())
    }

    /// # Errors
    ///
    /// [`CacheError::Serialization`] when the stored value is not a `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.store
            .get(&Self::storage_key(key))
            .map(serde_json::from_value)
            .transpose()
            .map_err(CacheError::from)
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.store.contains(&Self::storage_key(key))
    }

    /// Remove `key`, returning whether it was cached.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.store.remove(&Self::storage_key(key));
        debug!(key = %key, removed, "Cache entry invalidated");
        removed
    }

    /// Drop every entry in the underlying store.
    pub fn flush(&self) {
        self.store.flush();
    }

    /// Cached value for `key`, or the result of `producer` stored for `ttl`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Serialization`] when the value does not round-trip as JSON.
    pub fn remember<T, F>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.try_remember(key, ttl, || Ok(producer()))
    }

    /// Fallible form of [`CacheManager::remember`]; failures are not cached.
    ///
    /// Concurrent callers for the same key are serialized: exactly one runs
    /// `producer`, the rest wait and read its result. The per-key lock is not
    /// reentrant: a `producer` that calls `remember` or `try_remember` for the
    /// same `key` deadlocks. Other keys are fine.
    ///
    /// # Errors
    ///
    /// [`CacheError::Producer`] when `producer` fails, or
    /// [`CacheError::Serialization`] as for `remember`.
    pub fn try_remember<T, F>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> anyhow::Result<T>,
    {
        let storage_key = Self::storage_key(key);
        if let Some(hit) = self.store.get(&storage_key) {
            return Ok(serde_json::from_value(hit)?);
        }

        let lock = Arc::clone(self.locks.entry(storage_key.clone()).or_default().value());
        let result = {
            let _guard = lock.lock();
            match self.store.get(&storage_key) {
                Some(hit) => serde_json::from_value(hit).map_err(CacheError::from),
                None => {
                    debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache miss, producing value");
                    producer().map_err(CacheError::Producer).and_then(|value| {
                        self.store
                            .put(&storage_key, serde_json::to_value(&value)?, ttl);
                        Ok(value)
                    })
                }
            }
        };

        drop(lock);
        self.locks
            .remove_if(&storage_key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    fn storage_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
