//! Keyed expiring store.
//!
//! A concurrent map from string keys to values that each carry an absolute
//! expiry. It is the single primitive behind both the login token store and
//! the rate limiter.
//!
//! # Expiry
//!
//! An entry is logically absent once `now >= expires_at`. Reads apply this
//! rule lazily, so correctness never depends on the background sweep having
//! run; [`ExpiringStore::sweep_expired`] only reclaims memory.
//!
//! # Concurrency
//!
//! The key space is split across a fixed number of shards, each guarded by its
//! own [`parking_lot::Mutex`]. A key always hashes to the same shard, so every
//! operation on one key is serialized (linearizable), while unrelated keys only
//! contend when they happen to share a shard. No lock is ever held across an
//! `.await`; every operation is a short critical section.
//!
//! # Example
//!
//! ```
//! use relay_core::environment::SystemClock;
//! use relay_core::store::ExpiringStore;
//! use std::sync::Arc;
//!
//! let hits: ExpiringStore<u32> = ExpiringStore::new("hits", Arc::new(SystemClock));
//!
//! // Atomic read-modify-write
//! let count = hits.mutate("client-1", |current| {
//!     (current.copied().unwrap_or(0) + 1, chrono::Duration::minutes(1))
//! });
//! assert_eq!(count, 1);
//! ```

use crate::environment::Clock;
use crate::sweeper::Sweepable;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, RandomState};
use std::sync::Arc;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

/// A value held by the store together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    /// Key the entry is stored under.
    pub key: String,

    /// Stored payload.
    pub value: V,

    /// Instant at which the entry becomes logically absent.
    pub expires_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    /// Create a new entry.
    #[must_use]
    pub const fn new(key: String, value: V, expires_at: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            expires_at,
        }
    }

    /// Returns `true` once `now` has reached the entry's expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

type Shard<V> = Mutex<HashMap<String, Entry<V>>>;

/// Sharded in-memory store with per-entry expiry.
///
/// All operations are infallible and complete in map-lookup time. The store is
/// meant to be wrapped in an [`Arc`] and shared by every request handler plus
/// the [`Sweeper`](crate::sweeper::Sweeper).
pub struct ExpiringStore<V> {
    /// Store name, used as a metrics label and in logs.
    name: &'static str,
    shards: Box<[Shard<V>]>,
    hasher: RandomState,
    clock: Arc<dyn Clock>,
}

impl<V> ExpiringStore<V> {
    /// Create a store with [`DEFAULT_SHARDS`] shards.
    #[must_use]
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self::with_shards(name, clock, DEFAULT_SHARDS)
    }

    /// Create a store with an explicit shard count.
    ///
    /// A shard count of zero is treated as one (a single global lock).
    #[must_use]
    pub fn with_shards(name: &'static str, clock: Arc<dyn Clock>, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            name,
            shards,
            hasher: RandomState::new(),
            clock,
        }
    }

    /// Store name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[allow(clippy::cast_possible_truncation)] // Only the low bits select a shard
    fn shard_for(&self, key: &str) -> &Shard<V> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Insert or replace the entry for `key`, expiring `ttl` from now.
    ///
    /// Last write wins; an existing entry is replaced, never merged.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut shard = self.shard_for(&key).lock();
        let expires_at = deadline(self.clock.now(), ttl);
        shard.insert(key.clone(), Entry::new(key, value, expires_at));
    }

    /// Atomically read and remove the entry for `key`.
    ///
    /// Returns the value only if the entry was present and unexpired. An
    /// expired entry is removed as a side effect but reported as absent. When
    /// several callers race on the same key, at most one observes `Some`.
    pub fn take(&self, key: &str) -> Option<V> {
        let mut shard = self.shard_for(key).lock();
        let now = self.clock.now();
        let entry = shard.remove(key)?;
        (!entry.is_expired(now)).then_some(entry.value)
    }

    /// Remove the entry for `key`.
    ///
    /// Returns `true` if a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let mut shard = self.shard_for(key).lock();
        let now = self.clock.now();
        shard.remove(key).is_some_and(|entry| !entry.is_expired(now))
    }

    /// Atomically compute a new value from the current one and store it.
    ///
    /// `f` receives the live value (or `None` if absent or expired) and the
    /// time of the operation, and returns the value to store, its TTL, and an
    /// outcome handed back to the caller. The shard lock is held for the whole
    /// call, so `f` must not block.
    pub fn mutate_with<F, R>(&self, key: &str, f: F) -> R
    where
        F: FnOnce(Option<&V>, DateTime<Utc>) -> (V, Duration, R),
    {
        let mut shard = self.shard_for(key).lock();
        let now = self.clock.now();

        let current = shard
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| &entry.value);
        let (value, ttl, outcome) = f(current, now);

        shard.insert(
            key.to_owned(),
            Entry::new(key.to_owned(), value, deadline(now, ttl)),
        );
        outcome
    }

    /// Remove every entry whose expiry is at or before the time of the call.
    ///
    /// Shards are locked one at a time so unrelated keys are blocked only
    /// briefly. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        let mut remaining = 0;

        for shard in &*self.shards {
            let mut guard = shard.lock();
            let before = guard.len();
            guard.retain(|_, entry| !entry.is_expired(now));
            removed += before - guard.len();
            remaining += guard.len();
        }

        metrics::counter!("relay_store_swept_total", "store" => self.name)
            .increment(removed as u64);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("relay_store_entries", "store" => self.name).set(remaining as f64);

        removed
    }

    /// Number of physically stored entries, including expired entries that
    /// have not been swept yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Returns `true` if no entries are physically stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }
}

impl<V: Clone> ExpiringStore<V> {
    /// Return the live value for `key` without removing it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let shard = self.shard_for(key).lock();
        let now = self.clock.now();
        shard
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Atomically replace the value for `key` with `f(current)`.
    ///
    /// Returns the newly stored value. See [`ExpiringStore::mutate_with`].
    pub fn mutate<F>(&self, key: &str, f: F) -> V
    where
        F: FnOnce(Option<&V>) -> (V, Duration),
    {
        self.mutate_with(key, |current, _now| {
            let (value, ttl) = f(current);
            let stored = value.clone();
            (value, ttl, stored)
        })
    }
}

impl<V: Send> Sweepable for ExpiringStore<V> {
    fn name(&self) -> &str {
        self.name
    }

    fn sweep_expired(&self) -> usize {
        Self::sweep_expired(self)
    }
}

impl<V> fmt::Debug for ExpiringStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("name", &self.name)
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// `now + ttl`, saturating at the maximum representable time.
fn deadline(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct StepClock(Mutex<DateTime<Utc>>);

    impl StepClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            )))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock();
            *now += by;
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn store_with(clock: &Arc<StepClock>) -> ExpiringStore<String> {
        ExpiringStore::new("test", clock.clone())
    }

    #[test]
    fn test_put_then_get() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("k", "v".to_string(), Duration::seconds(10));

        assert_eq!(store.get("k").as_deref(), Some("v"));
        // get does not remove
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("k", "first".to_string(), Duration::seconds(1));
        store.put("k", "second".to_string(), Duration::seconds(60));
        clock.advance(Duration::seconds(5));

        // Replacement also carries the new expiry
        assert_eq!(store.get("k").as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_treats_expired_entry_as_absent() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("k", "v".to_string(), Duration::seconds(10));
        clock.advance(Duration::seconds(10));

        assert_eq!(store.get("k"), None);
        // Still physically present until swept
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_take_is_single_use() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("k", "v".to_string(), Duration::seconds(10));

        assert_eq!(store.take("k").as_deref(), Some("v"));
        assert_eq!(store.take("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_take_removes_expired_entry_without_returning_it() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("k", "v".to_string(), Duration::seconds(10));
        clock.advance(Duration::seconds(11));

        assert_eq!(store.take("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_reports_live_entries_only() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("live", "v".to_string(), Duration::seconds(10));
        store.put("dead", "v".to_string(), Duration::zero());

        assert!(store.remove("live"));
        assert!(!store.remove("dead"));
        assert!(!store.remove("missing"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_mutate_sees_absence_then_previous_value() {
        let clock = StepClock::new();
        let store: ExpiringStore<u32> = ExpiringStore::new("counter", clock.clone());

        let bump = |current: Option<&u32>| (current.copied().unwrap_or(0) + 1, Duration::seconds(30));

        assert_eq!(store.mutate("k", bump), 1);
        assert_eq!(store.mutate("k", bump), 2);
        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_mutate_treats_expired_value_as_absent() {
        let clock = StepClock::new();
        let store: ExpiringStore<u32> = ExpiringStore::new("counter", clock.clone());

        store.put("k", 41, Duration::seconds(1));
        clock.advance(Duration::seconds(2));

        let seen = store.mutate_with("k", |current, _| (0, Duration::seconds(1), current.copied()));
        assert_eq!(seen, None);
    }

    #[test]
    fn test_mutate_with_receives_store_time() {
        let clock = StepClock::new();
        let store: ExpiringStore<u32> = ExpiringStore::new("counter", clock.clone());
        clock.advance(Duration::minutes(3));

        let observed = store.mutate_with("k", |_, now| (1, Duration::seconds(1), now));
        assert_eq!(observed, clock.now());
    }

    #[test]
    fn test_sweep_removes_only_expired_entries() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("short", "a".to_string(), Duration::seconds(5));
        store.put("exact", "b".to_string(), Duration::seconds(10));
        store.put("long", "c".to_string(), Duration::seconds(60));
        clock.advance(Duration::seconds(10));

        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").as_deref(), Some("c"));

        // Nothing left to sweep
        assert_eq!(store.sweep_expired(), 0);
    }

    #[test]
    fn test_single_shard_store_behaves_the_same() {
        let clock = StepClock::new();
        let store: ExpiringStore<u8> = ExpiringStore::with_shards("single", clock.clone(), 0);

        for i in 0..10u8 {
            store.put(format!("k{i}"), i, Duration::seconds(i64::from(i) + 1));
        }
        clock.advance(Duration::seconds(5));

        assert_eq!(store.sweep_expired(), 5);
        assert_eq!(store.get("k9"), Some(9));
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_overflowing() {
        let clock = StepClock::new();
        let store = store_with(&clock);

        store.put("k", "v".to_string(), Duration::MAX);
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
