//! Shared key/value storage with per-entry expiry.
//!
//! The rate limiter keeps its window counters here and the cache manager its
//! memoized values. Both only talk to the [`TtlStore`] trait, so a single
//! [`MemoryStore`] can back both or each can get its own.

mod memory;

use std::time::{Duration, SystemTime};

use serde_json::Value;

pub use memory::MemoryStore;

/// Key/value store whose entries expire.
///
/// Expired entries behave exactly like absent ones for every operation.
pub trait TtlStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Insert or replace `key`, expiring `ttl` from now.
    fn put(&self, key: &str, value: Value, ttl: Duration);

    /// Remove `key`, returning whether a live entry was present.
    fn remove(&self, key: &str) -> bool;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Atomically add one to the counter at `key`.
    ///
    /// A missing or expired counter starts at 1 and expires `ttl` from now;
    /// an existing one keeps its original expiry. Returns the new count.
    fn increment(&self, key: &str, ttl: Duration) -> u64;

    /// Expiry instant of a live entry.
    fn expires_at(&self, key: &str) -> Option<SystemTime>;

    /// Drop every entry.
    fn flush(&self);
}
