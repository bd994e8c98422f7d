//! Cache manager.
//!
//! [`ResearchCache`] owns the response cache, the attachment cache, the TTL
//! policy, and the in-flight registry. Build one at startup and share it by
//! `Arc`; there is no global instance.

use super::attachment::{Attachment, AttachmentCache};
use super::backend::{CacheEntry, CacheOccupancy, EvictionListener};
use super::config::ResearchCacheConfig;
use super::key::{CacheKey, CacheKeyGenerator};
use super::response::{CachedResponse, ResponseCache};
use super::ttl::TtlPolicy;
use crate::error::FetchError;
use crate::inflight::InFlightRegistry;
use crate::types::ResearchRequest;
use crate::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Occupancy and lookup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub response_cache: CacheOccupancy,
    pub attachment_cache: CacheOccupancy,
    pub in_flight_count: usize,
    pub hits: u64,
    pub misses: u64,
    /// Callers that joined a fetch already running for their key.
    pub coalesced: u64,
    /// Upstream fetches actually started.
    pub fetches: u64,
    pub fetch_failures: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
        }
    }

    fn reset(&self) {
        for c in [
            &self.hits,
            &self.misses,
            &self.coalesced,
            &self.fetches,
            &self.fetch_failures,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Where a [`CacheLookup`] result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    /// This caller ran the upstream fetch.
    Fetched,
    /// This caller joined another caller's fetch.
    Coalesced,
}

/// Result of [`ResearchCache::get_or_fetch`].
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub key: CacheKey,
    pub response: Arc<CachedResponse>,
    pub source: ResponseSource,
}

/// Response cache, attachment cache, and request coalescing behind one handle.
pub struct ResearchCache {
    config: ResearchCacheConfig,
    keys: CacheKeyGenerator,
    policy: TtlPolicy,
    responses: Arc<ResponseCache>,
    attachments: AttachmentCache,
    in_flight: InFlightRegistry<Arc<CachedResponse>, FetchError>,
    stats: Arc<AtomicStats>,
}

impl std::fmt::Debug for ResearchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchCache")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl ResearchCache {
    pub fn new(config: ResearchCacheConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like [`new`](Self::new), reporting every disposed entry of both caches
    /// to `listener`.
    pub fn with_eviction_listener(
        config: ResearchCacheConfig,
        listener: EvictionListener,
    ) -> Result<Self> {
        Self::build(config, Some(listener))
    }

    fn build(config: ResearchCacheConfig, listener: Option<EvictionListener>) -> Result<Self> {
        config.validate()?;
        let policy = TtlPolicy::new(config.ttl);
        let mut responses = ResponseCache::new(&config.response, policy.table().general);
        let mut attachments = AttachmentCache::new(&config.attachments, policy.attachment());
        if let Some(listener) = listener {
            responses = responses.with_eviction_listener(Arc::clone(&listener));
            attachments = attachments.with_eviction_listener(listener);
        }
        let keys = match &config.key_salt {
            Some(salt) => CacheKeyGenerator::new().with_salt(salt.clone()),
            None => CacheKeyGenerator::new(),
        };
        info!(
            enabled = config.enabled,
            max_entries = config.response.max_entries,
            max_size_bytes = config.response.max_size_bytes,
            attachment_max_entries = config.attachments.max_entries,
            "research cache initialized"
        );
        Ok(Self {
            config,
            keys,
            policy,
            responses: Arc::new(responses),
            attachments,
            in_flight: InFlightRegistry::new(),
            stats: Arc::new(AtomicStats::new()),
        })
    }

    pub fn config(&self) -> &ResearchCacheConfig {
        &self.config
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    pub fn key_for(&self, request: &ResearchRequest) -> Result<CacheKey> {
        self.keys.key_for_request(request)
    }

    pub fn ttl_for(&self, request: &ResearchRequest) -> Duration {
        self.policy.select_for_request(request)
    }

    pub fn get_cached_response(&self, key: &CacheKey) -> Option<CacheEntry<CachedResponse>> {
        match self.responses.get(key) {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key.short(), model = %entry.value.model, "response cache hit");
                Some(entry)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = key.short(), "response cache miss");
                None
            }
        }
    }

    /// Overwrites any entry for `key`. Without `ttl` the configured default applies.
    pub fn set_cached_response(
        &self,
        key: &CacheKey,
        data: Value,
        model: impl Into<String>,
        ttl: Option<Duration>,
    ) {
        self.responses.set(key, data, model, ttl);
    }

    /// Coalesce concurrent fetches for `key`. Does not touch the response cache.
    pub async fn run_deduplicated<F, Fut>(
        &self,
        key: &CacheKey,
        fetcher: F,
    ) -> std::result::Result<Arc<CachedResponse>, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<CachedResponse, FetchError>> + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        let (result, joined) = self
            .in_flight
            .run_tracked(key, move || async move {
                stats.fetches.fetch_add(1, Ordering::Relaxed);
                match fetcher().await {
                    Ok(resp) => Ok(Arc::new(resp)),
                    Err(e) => {
                        stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        Err(e)
                    }
                }
            })
            .await;
        if joined {
            self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Serve `request` from the cache, or fetch it once for all concurrent
    /// callers and cache the answer with the TTL its characteristics call for.
    ///
    /// A failed fetch is returned to every joined caller and nothing is cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        request: &ResearchRequest,
        fetcher: F,
    ) -> Result<CacheLookup>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<CachedResponse, FetchError>> + Send + 'static,
    {
        let key = self.key_for(request)?;

        if self.config.enabled {
            if let Some(entry) = self.get_cached_response(&key) {
                return Ok(CacheLookup {
                    key,
                    response: entry.value,
                    source: ResponseSource::Cache,
                });
            }
        }

        let ttl = self.ttl_for(request);
        let store = self.config.enabled.then(|| Arc::clone(&self.responses));
        let stats = Arc::clone(&self.stats);
        let store_key = key.clone();

        // Storing happens inside the shared fetch, before the in-flight slot is
        // released, so there is no window where a key is in neither place.
        let (result, joined) = self
            .in_flight
            .run_tracked(&key, move || async move {
                stats.fetches.fetch_add(1, Ordering::Relaxed);
                match fetcher().await {
                    Ok(resp) => {
                        let resp = Arc::new(resp);
                        if let Some(store) = store {
                            store.insert(&store_key, Arc::clone(&resp), Some(ttl));
                        }
                        Ok(resp)
                    }
                    Err(e) => {
                        stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        Err(e)
                    }
                }
            })
            .await;

        let response = result?;
        let source = if joined {
            self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
            // The joined fetch may belong to `run_deduplicated`, which never stores.
            if self.config.enabled && !self.responses.contains(&key) {
                self.responses.insert(&key, Arc::clone(&response), Some(ttl));
            }
            ResponseSource::Coalesced
        } else {
            ResponseSource::Fetched
        };
        Ok(CacheLookup {
            key,
            response,
            source,
        })
    }

    pub fn get_cached_attachment(&self, hash: &CacheKey) -> Option<CacheEntry<Attachment>> {
        self.attachments.get(hash)
    }

    pub fn set_cached_attachment(&self, hash: &CacheKey, attachment: Attachment) {
        self.attachments.set(hash, attachment);
    }

    /// Store an attachment under its own content hash and return the hash.
    pub fn put_attachment(&self, attachment: Attachment) -> CacheKey {
        self.attachments.put(attachment)
    }

    /// Snapshot of live occupancy and counters. Read-only.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            response_cache: self.responses.occupancy(),
            attachment_cache: self.attachments.occupancy(),
            in_flight_count: self.in_flight.in_flight_count(),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            coalesced: self.stats.coalesced.load(Ordering::Relaxed),
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            fetch_failures: self.stats.fetch_failures.load(Ordering::Relaxed),
        }
    }

    /// Drop expired entries from both caches. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.responses.purge_expired() + self.attachments.purge_expired()
    }

    /// Empty both caches and reset counters. Running fetches are left alone.
    pub fn clear_all(&self) {
        self.responses.clear();
        self.attachments.clear();
        self.stats.reset();
        info!("research cache cleared");
    }
}
