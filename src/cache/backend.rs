//! Bounded in-memory LRU store.
//!
//! [`BoundedCache`] is the storage engine shared by the response and
//! attachment caches. It enforces three limits at once:
//!
//! - an entry-count bound,
//! - an aggregate approximate-size bound,
//! - a per-entry time-to-live.
//!
//! Recency is refreshed by both reads and writes. When an insert would break
//! either bound, least-recently-used entries are evicted until it does not.

use super::key::CacheKey;
use lru::LruCache;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Size charged for an entry whose size could not be estimated.
pub const FALLBACK_ENTRY_SIZE: usize = 1024;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// Pushed out by the entry-count or size bound.
    Capacity,
    /// TTL elapsed.
    Expired,
    /// Overwritten (or dropped) by a `set` on the same key.
    Replaced,
    /// Removed by `clear` or `remove`.
    Cleared,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvictionReason::Capacity => "capacity",
            EvictionReason::Expired => "expired",
            EvictionReason::Replaced => "replaced",
            EvictionReason::Cleared => "cleared",
        };
        f.write_str(s)
    }
}

/// Diagnostic hook invoked for every disposed entry.
///
/// Runs after the cache lock is released; it may read the cache again.
pub type EvictionListener = Arc<dyn Fn(&CacheKey, EvictionReason) + Send + Sync>;

/// Estimates the in-memory footprint of a value. `None` means "unknown".
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> Option<usize> + Send + Sync>;

/// An immutable cached value plus its bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub created_at: Instant,
    pub ttl: Duration,
    pub approximate_size: usize,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            created_at: self.created_at,
            ttl: self.ttl,
            approximate_size: self.approximate_size,
        }
    }
}

impl<V> CacheEntry<V> {
    fn new(value: Arc<V>, ttl: Duration, approximate_size: usize) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            approximate_size,
        }
    }

    /// An entry is dead once `ttl` has fully elapsed; a zero TTL is dead at birth.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    /// Time left before expiry.
    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Count and size of the live entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOccupancy {
    pub entry_count: usize,
    pub approximate_size: usize,
}

struct Store<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    total_size: usize,
}

/// Thread-safe LRU cache bounded by entry count, aggregate size, and TTL.
pub struct BoundedCache<V> {
    name: &'static str,
    max_entries: usize,
    max_size: usize,
    default_ttl: Duration,
    estimator: SizeEstimator<V>,
    listener: Option<EvictionListener>,
    store: Mutex<Store<V>>,
}

impl<V> BoundedCache<V> {
    /// `max_entries` and `max_size` are clamped to at least 1.
    pub fn new(
        name: &'static str,
        max_entries: usize,
        max_size: usize,
        default_ttl: Duration,
        estimator: SizeEstimator<V>,
    ) -> Self {
        Self {
            name,
            max_entries: max_entries.max(1),
            max_size: max_size.max(1),
            default_ttl,
            estimator,
            listener: None,
            store: Mutex::new(Store {
                entries: LruCache::unbounded(),
                total_size: 0,
            }),
        }
    }

    pub fn with_eviction_listener(mut self, listener: EvictionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, Store<V>> {
        // Store invariants are restored before any user code runs, so a
        // poisoned lock still guards consistent data.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispose(&self, key: &CacheKey, reason: EvictionReason) {
        debug!(cache = self.name, key = key.short(), %reason, "cache entry disposed");
        if let Some(listener) = &self.listener {
            listener(key, reason);
        }
    }

    fn estimate(&self, value: &V) -> usize {
        match (self.estimator)(value) {
            Some(size) => size,
            None => {
                warn!(
                    cache = self.name,
                    fallback = FALLBACK_ENTRY_SIZE,
                    "size estimation failed, using fallback"
                );
                FALLBACK_ENTRY_SIZE
            }
        }
    }

    /// Live entry for `key`, refreshing its recency. Expired entries are
    /// removed and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let mut store = self.lock();
        let expired = store.entries.peek(key)?.is_expired();
        if expired {
            if let Some(old) = store.entries.pop(key) {
                store.total_size -= old.approximate_size;
            }
            drop(store);
            self.dispose(key, EvictionReason::Expired);
            return None;
        }
        store.entries.get(key).cloned()
    }

    /// Like [`get`](Self::get) without touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.lock()
            .entries
            .peek(key)
            .filter(|e| !e.is_expired())
            .cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.peek(key).is_some()
    }

    /// Store `value` under `key`. `ttl` overrides the default for this entry only.
    ///
    /// A value larger than the whole size budget is not stored; any previous
    /// entry under the same key is dropped so a stale value is never served.
    pub fn set(&self, key: CacheKey, value: V, ttl: Option<Duration>) {
        self.set_shared(key, Arc::new(value), ttl);
    }

    /// [`set`](Self::set) for a value that is already shared.
    pub fn set_shared(&self, key: CacheKey, value: Arc<V>, ttl: Option<Duration>) {
        let size = self.estimate(&value);
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut disposed: Vec<(CacheKey, EvictionReason)> = Vec::new();
        {
            let mut store = self.lock();

            if let Some(old) = store.entries.pop(&key) {
                store.total_size -= old.approximate_size;
                disposed.push((key.clone(), EvictionReason::Replaced));
            }

            if size > self.max_size {
                warn!(
                    cache = self.name,
                    key = key.short(),
                    size,
                    max_size = self.max_size,
                    "entry exceeds cache size budget, not stored"
                );
            } else {
                Self::purge_expired_locked(&mut store, &mut disposed);
                while store.entries.len() >= self.max_entries
                    || store.total_size + size > self.max_size
                {
                    match store.entries.pop_lru() {
                        Some((lru_key, old)) => {
                            store.total_size -= old.approximate_size;
                            disposed.push((lru_key, EvictionReason::Capacity));
                        }
                        None => break,
                    }
                }
                store.total_size += size;
                store.entries.put(key, CacheEntry::new(value, ttl, size));
            }
        }
        for (k, reason) in disposed {
            self.dispose(&k, reason);
        }
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let removed = {
            let mut store = self.lock();
            let removed = store.entries.pop(key);
            if let Some(old) = &removed {
                store.total_size -= old.approximate_size;
            }
            removed
        };
        if removed.is_some() {
            self.dispose(key, EvictionReason::Cleared);
        }
        removed.filter(|e| !e.is_expired())
    }

    pub fn clear(&self) {
        let drained: Vec<CacheKey> = {
            let mut store = self.lock();
            let keys = store.entries.iter().map(|(k, _)| k.clone()).collect();
            store.entries.clear();
            store.total_size = 0;
            keys
        };
        for k in drained {
            self.dispose(&k, EvictionReason::Cleared);
        }
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut disposed = Vec::new();
        {
            let mut store = self.lock();
            Self::purge_expired_locked(&mut store, &mut disposed);
        }
        let n = disposed.len();
        for (k, reason) in disposed {
            self.dispose(&k, reason);
        }
        n
    }

    fn purge_expired_locked(store: &mut Store<V>, disposed: &mut Vec<(CacheKey, EvictionReason)>) {
        let now = Instant::now();
        let expired: Vec<CacheKey> = store
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            if let Some(old) = store.entries.pop(&k) {
                store.total_size -= old.approximate_size;
                disposed.push((k, EvictionReason::Expired));
            }
        }
    }

    /// Live entries and their combined size. Expired entries still awaiting
    /// purge are not counted. Read-only.
    pub fn occupancy(&self) -> CacheOccupancy {
        let store = self.lock();
        let now = Instant::now();
        store
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired_at(now))
            .fold(CacheOccupancy::default(), |acc, (_, e)| CacheOccupancy {
                entry_count: acc.entry_count + 1,
                approximate_size: acc.approximate_size + e.approximate_size,
            })
    }

    pub fn len(&self) -> usize {
        self.occupancy().entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("max_entries", &self.max_entries)
            .field("max_size", &self.max_size)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
