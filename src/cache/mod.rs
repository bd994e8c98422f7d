//! 响应缓存模块：有界 LRU 响应缓存、附件缓存与 TTL 策略。
//!
//! # Response Caching Module
//!
//! This module decides whether a previously computed research answer can be
//! reused, and keeps memory bounded while doing so.
//!
//! ## Overview
//!
//! Upstream research calls are slow, expensive, and non-deterministic.
//! Caching them:
//! - Avoids paying twice for the same question
//! - Returns repeated queries immediately
//! - Keeps time-sensitive answers fresh through per-request TTLs
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResearchCache`] | Owns both caches, the TTL policy, and request coalescing |
//! | [`ResearchCacheConfig`] | Bounds, TTL table, and switches |
//! | [`BoundedCache`] | LRU store bounded by entry count, bytes, and TTL |
//! | [`ResponseCache`] | Upstream answers keyed by canonical request key |
//! | [`AttachmentCache`] | Binary attachments keyed by content hash |
//! | [`TtlPolicy`] | Picks an expiry from request characteristics |
//! | [`CacheKey`] | Canonical request hash |
//!
//! ## Example
//!
//! ```rust
//! use research_cache::cache::{ResearchCache, ResearchCacheConfig};
//! use research_cache::types::ResearchRequest;
//! use std::time::Duration;
//!
//! let cache = ResearchCache::new(
//!     ResearchCacheConfig::new()
//!         .with_response_bounds(1000, 64 * 1024 * 1024)
//!         .with_default_ttl(Duration::from_secs(900)),
//! )
//! .unwrap();
//!
//! let request = ResearchRequest::new("How does raft elect a leader?", "sonar");
//! let key = cache.key_for(&request).unwrap();
//! cache.set_cached_response(&key, serde_json::json!({"answer": "..."}), "sonar", None);
//! assert!(cache.get_cached_response(&key).is_some());
//! ```
//!
//! ## Cache Key Generation
//!
//! Keys are the SHA-256 of the request parameters serialized as JSON with
//! object keys sorted, so field order never matters. Bookkeeping fields such
//! as request ids are excluded.

mod attachment;
mod backend;
mod config;
mod key;
mod manager;
mod response;
mod ttl;

pub use attachment::{content_hash, Attachment, AttachmentCache};
pub use backend::{
    BoundedCache, CacheEntry, CacheOccupancy, EvictionListener, EvictionReason, SizeEstimator,
    FALLBACK_ENTRY_SIZE,
};
pub use config::{
    BoundedCacheConfig, ResearchCacheConfig, ENV_ATTACHMENT_MAX_ENTRIES,
    ENV_ATTACHMENT_MAX_SIZE_BYTES, ENV_DEFAULT_TTL_SECS, ENV_ENABLED, ENV_MAX_ENTRIES,
    ENV_MAX_SIZE_BYTES,
};
pub use key::{canonicalize, CacheKey, CacheKeyGenerator};
pub use manager::{CacheLookup, CacheStats, ResearchCache, ResponseSource};
pub use response::{CachedResponse, ResponseCache};
pub use ttl::{CacheTtl, RequestCharacteristics, TtlPolicy, VolatilityClass};
