//! # Rate Limit Module
//!
//! Fixed-window admission counting keyed by caller identity.
//!
//! The first hit of a window creates the counter and starts the window; every
//! later hit in the same window only increments it. Once the window expires
//! the counter vanishes with it and the next hit starts a fresh window.
//!
//! ```text
//!  hit  hit  hit  ✗    ✗          hit ...
//!  |----------- window ---------|-----------
//!  1    2    3   (count >= max)   1
//! ```
//!
//! [`RateLimiter`] is just the counter; deciding which limit applies to a
//! request is [`RateLimitPolicy`]'s job, and the middleware that combines them
//! lives in [`crate::middleware::RateLimitMiddleware`].

mod policy;

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use crate::clock::{Clock, SystemClock};
use crate::store::{MemoryStore, TtlStore};

pub use policy::{RateLimitPolicy, RateLimitRule, RateLimitScope};

const KEY_PREFIX: &str = "rate_limit:";

/// Fixed-window counter over a shared [`TtlStore`].
///
/// The clock must be the same one the store measures expiry with.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn TtlStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn TtlStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Limiter over a private [`MemoryStore`] on the wall clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Limiter over a private [`MemoryStore`] driven by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::with_clock(Arc::clone(&clock)));
        Self::new(store, clock)
    }

    /// Whether `key` has used up its `max_attempts` in the current window.
    #[must_use]
    pub fn too_many_attempts(&self, key: &str, max_attempts: u64) -> bool {
        self.attempts(key) >= max_attempts
    }

    /// Record one attempt, starting a `window`-long window if none is open.
    ///
    /// Returns the count including this attempt.
    pub fn hit(&self, key: &str, window: Duration) -> u64 {
        self.store.increment(&Self::storage_key(key), window)
    }

    /// Attempts recorded in the current window.
    #[must_use]
    pub fn attempts(&self, key: &str) -> u64 {
        self.store
            .get(&Self::storage_key(key))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn remaining(&self, key: &str, max_attempts: u64) -> u64 {
        max_attempts.saturating_sub(self.attempts(key))
    }

    /// Whole seconds, rounded up, until the current window ends; 0 without one.
    #[must_use]
    pub fn available_in(&self, key: &str) -> u64 {
        let Some(expires_at) = self.store.expires_at(&Self::storage_key(key)) else {
            return 0;
        };
        expires_at
            .duration_since(self.clock.now())
            .map(ceil_secs)
            .unwrap_or(0)
    }

    /// Unix timestamp at which the current window ends.
    ///
    /// Without an open window this is the current time.
    #[must_use]
    pub fn reset_at(&self, key: &str) -> u64 {
        match self.store.expires_at(&Self::storage_key(key)) {
            Some(expires_at) => expires_at
                .duration_since(UNIX_EPOCH)
                .map(ceil_secs)
                .unwrap_or(0),
            None => self.clock.unix_seconds(),
        }
    }

    /// Forget the counter for `key`.
    pub fn clear(&self, key: &str) {
        self.store.remove(&Self::storage_key(key));
    }

    fn storage_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        (clock, limiter)
    }

    #[test]
    fn trips_once_max_is_reached() {
        let (_clock, limiter) = limiter();
        let window = Duration::from_secs(10);
        for _ in 0..3 {
            assert!(!limiter.too_many_attempts("k", 3));
            limiter.hit("k", window);
        }
        assert!(limiter.too_many_attempts("k", 3));
        assert_eq!(limiter.remaining("k", 3), 0);

        let wait = limiter.available_in("k");
        assert!(wait > 0 && wait <= 10, "available_in = {wait}");
    }

    #[test]
    fn window_resets_after_expiry() {
        let (clock, limiter) = limiter();
        limiter.hit("k", Duration::from_secs(10));
        limiter.hit("k", Duration::from_secs(10));
        assert_eq!(limiter.reset_at("k"), 1_700_000_010);

        clock.advance(Duration::from_secs(10));
        assert_eq!(limiter.attempts("k"), 0);
        assert_eq!(limiter.available_in("k"), 0);
        assert_eq!(limiter.hit("k", Duration::from_secs(10)), 1);
        assert_eq!(limiter.reset_at("k"), 1_700_000_020);
    }

    #[test]
    fn available_in_rounds_up() {
        let (clock, limiter) = limiter();
        limiter.hit("k", Duration::from_secs(10));
        clock.advance(Duration::from_millis(8_500));
        assert_eq!(limiter.available_in("k"), 2);
    }

    #[test]
    fn clear_forgets_the_counter() {
        let (_clock, limiter) = limiter();
        limiter.hit("k", Duration::from_secs(10));
        limiter.clear("k");
        assert_eq!(limiter.attempts("k"), 0);
        assert_eq!(limiter.remaining("k", 5), 5);
    }

    #[test]
    fn keys_are_independent() {
        let (_clock, limiter) = limiter();
        limiter.hit("a", Duration::from_secs(10));
        assert_eq!(limiter.attempts("a"), 1);
        assert_eq!(limiter.attempts("b"), 0);
    }
}
