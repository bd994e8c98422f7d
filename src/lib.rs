//! # research-cache
//!
//! 研究查询桥接层的响应缓存与并发请求去重子系统。
//!
//! Response cache and in-flight request deduplication for bridges that send
//! research queries to a hosted, non-deterministic search/answer API.
//!
//! ## Overview
//!
//! Upstream research calls are slow, costly, and return different text each
//! time. This crate decides when a previous answer can be reused, keeps the
//! memory spent on answers bounded, and makes sure that concurrent identical
//! requests trigger at most one upstream call.
//!
//! ## Key Features
//!
//! - **Canonical keys**: order-independent SHA-256 keys via [`cache::canonicalize`]
//! - **Bounded LRU**: entry-count, byte-size, and TTL limits via [`cache::BoundedCache`]
//! - **TTL policy**: recency-aware expiry via [`cache::TtlPolicy`]
//! - **Coalescing**: single-flight fetches via [`InFlightRegistry`]
//! - **Attachments**: content-addressed blob cache via [`cache::AttachmentCache`]
//! - **Introspection**: occupancy and counters via [`cache::ResearchCache::stats`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use research_cache::cache::{CachedResponse, ResearchCache, ResearchCacheConfig};
//! use research_cache::types::{RecencyFilter, ResearchRequest};
//! use research_cache::FetchError;
//!
//! #[tokio::main]
//! async fn main() -> research_cache::Result<()> {
//!     research_cache::telemetry::init_tracing();
//!     let cache = ResearchCache::new(ResearchCacheConfig::from_env()?)?;
//!
//!     let request = ResearchRequest::new("latest rust release", "sonar")
//!         .with_recency(RecencyFilter::Week);
//!     let lookup = cache
//!         .get_or_fetch(&request, || async {
//!             // call the upstream API here
//!             Ok::<_, FetchError>(CachedResponse {
//!                 data: serde_json::json!({"answer": "..."}),
//!                 model: "sonar".into(),
//!             })
//!         })
//!         .await?;
//!     println!("{:?} {}", lookup.source, lookup.response.data);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Keys, bounded caches, TTL policy, and the [`cache::ResearchCache`] facade |
//! | [`inflight`] | Per-key single-flight registry |
//! | [`types`] | Research request parameters |
//! | [`telemetry`] | Logging setup and eviction event sinks |

pub mod cache;
pub mod inflight;
pub mod telemetry;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheKey, CacheStats, ResearchCache, ResearchCacheConfig};
pub use inflight::InFlightRegistry;
pub use types::ResearchRequest;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, FetchError};
