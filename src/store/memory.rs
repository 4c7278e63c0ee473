use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::TtlStore;
use crate::clock::{Clock, SystemClock};

/// Writes between sweeps of expired entries.
const DEFAULT_PURGE_INTERVAL: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: SystemTime,
}

/// In-process [`TtlStore`] behind a single mutex.
///
/// Every operation, including the read-modify-write of
/// [`increment`](TtlStore::increment), runs under the lock, so concurrent
/// callers never lose updates. Expired entries are dropped lazily when
/// touched, and every `purge_interval` writes (`put` or `increment`) the whole
/// map is swept, so keys nobody touches again are reclaimed too.
/// [`MemoryStore::purge_expired`] sweeps on demand.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    writes: AtomicUsize,
    purge_interval: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            writes: AtomicUsize::new(0),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    /// Sweep expired entries every `writes` writes instead of every 1024.
    #[must_use]
    pub fn with_purge_interval(mut self, writes: usize) -> Self {
        self.purge_interval = writes.max(1);
        self
    }

    /// Number of stored entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        Self::sweep(&mut self.entries.lock(), now)
    }

    fn sweep(entries: &mut HashMap<String, Entry>, now: SystemTime) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "Expired store entries purged");
        }
        purged
    }

    fn sweep_due(&self) -> bool {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        writes % self.purge_interval == 0
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str, now: SystemTime) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
            return None;
        }
        entries.get_mut(key)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl TtlStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Self::live(&mut entries, key, now).map(|e| e.value.clone())
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if self.sweep_due() {
            Self::sweep(&mut entries, now);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .lock()
            .remove(key)
            .is_some_and(|e| e.expires_at > now)
    }

    fn increment(&self, key: &str, ttl: Duration) -> u64 {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if self.sweep_due() {
            Self::sweep(&mut entries, now);
        }
        if let Some(entry) = Self::live(&mut entries, key, now) {
            if let Some(count) = entry.value.as_u64() {
                let next = count.saturating_add(1);
                entry.value = Value::from(next);
                return next;
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::from(1u64),
                expires_at: now + ttl,
            },
        );
        1
    }

    fn expires_at(&self, key: &str) -> Option<SystemTime> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Self::live(&mut entries, key, now).map(|e| e.expires_at)
    }

    fn flush(&self) {
        self.entries.lock().clear();
    }
}
