//! In-flight request coalescing.
//!
//! [`InFlightRegistry`] guarantees at most one running fetch per key. The
//! first caller registers a shared future; callers arriving before it settles
//! await that same future and observe the same `Ok` or `Err`. The entry is
//! removed as soon as the fetch settles, whatever the outcome, so a failure
//! never blocks later attempts.
//!
//! The registry only coalesces overlapping requests. Storing results is the
//! caller's job.
//!
//! ```rust
//! use research_cache::{CacheKey, InFlightRegistry};
//!
//! # tokio_test::block_on(async {
//! let registry: InFlightRegistry<String, String> = InFlightRegistry::new();
//! let key = CacheKey::from("k");
//! let out = registry
//!     .run_deduplicated(&key, || async { Ok::<_, String>("answer".to_string()) })
//!     .await;
//! assert_eq!(out.unwrap(), "answer");
//! assert_eq!(registry.in_flight_count(), 0);
//! # });
//! ```

use crate::cache::CacheKey;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type Fetch<T, E> = BoxFuture<'static, Result<T, E>>;

struct Slot<T, E> {
    generation: u64,
    fetch: WeakShared<Fetch<T, E>>,
}

struct Inner<T, E> {
    slots: Mutex<HashMap<CacheKey, Slot<T, E>>>,
    next_generation: AtomicU64,
}

impl<T, E> Inner<T, E> {
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot<T, E>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_if_current(&self, key: &CacheKey, generation: u64) {
        let mut slots = self.lock();
        if slots.get(key).map(|s| s.generation) == Some(generation) {
            slots.remove(key);
        }
    }
}

/// Clears the registry slot when the fetch future completes or is dropped.
struct SettleGuard<T, E> {
    inner: Arc<Inner<T, E>>,
    key: CacheKey,
    generation: u64,
}

impl<T, E> Drop for SettleGuard<T, E> {
    fn drop(&mut self) {
        self.inner.remove_if_current(&self.key, self.generation);
    }
}

/// Per-key single-flight registry.
///
/// `T` and `E` must be `Clone` because every joined caller receives its own
/// copy of the outcome. Wrap a non-`Clone` error in `Arc`.
pub struct InFlightRegistry<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for InFlightRegistry<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for InFlightRegistry<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for InFlightRegistry<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl<T, E> InFlightRegistry<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Number of keys with a fetch currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inner.lock().contains_key(key)
    }
}

impl<T, E> InFlightRegistry<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Run `fetcher` unless a fetch for `key` is already running, in which case
    /// wait for that one instead.
    ///
    /// `fetcher` is invoked lazily, after the slot is registered.
    pub async fn run_deduplicated<F, Fut>(&self, key: &CacheKey, fetcher: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (fetch, joined) = self.join_or_register(key, fetcher);
        if joined {
            debug!(key = key.short(), "joined in-flight fetch");
        }
        fetch.await
    }

    /// Like [`run_deduplicated`](Self::run_deduplicated) but also reports
    /// whether this caller joined an existing fetch.
    pub async fn run_tracked<F, Fut>(&self, key: &CacheKey, fetcher: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (fetch, joined) = self.join_or_register(key, fetcher);
        (fetch.await, joined)
    }

    // Check and insert happen under one lock acquisition; no await in between.
    fn join_or_register<F, Fut>(&self, key: &CacheKey, fetcher: F) -> (Shared<Fetch<T, E>>, bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut slots = self.inner.lock();

        if let Some(existing) = slots.get(key).and_then(|s| s.fetch.upgrade()) {
            return (existing, true);
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let guard = SettleGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            generation,
        };
        let short = key.short().to_string();
        let fetch: Fetch<T, E> = async move {
            let _guard = guard;
            debug!(key = %short, "starting fetch");
            let out = fetcher().await;
            debug!(key = %short, ok = out.is_ok(), "fetch settled");
            out
        }
        .boxed();
        let shared = fetch.shared();

        // A freshly built Shared always holds its future, so downgrade succeeds.
        if let Some(weak) = shared.downgrade() {
            slots.insert(
                key.clone(),
                Slot {
                    generation,
                    fetch: weak,
                },
            );
        }
        (shared, false)
    }
}
