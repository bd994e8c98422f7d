//! Content-addressed attachment cache.
//!
//! Attachments are keyed by the SHA-256 of their raw bytes, not by the
//! request that carried them, so the same file submitted with different
//! query parameters occupies a single slot.

use super::backend::{BoundedCache, CacheEntry, CacheOccupancy, EvictionListener, SizeEstimator};
use super::config::BoundedCacheConfig;
use super::key::{sha256_hex, CacheKey};
use crate::{Error, ErrorContext, Result};
use base64::Engine as _;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Hash of an attachment payload.
pub fn content_hash(bytes: &[u8]) -> CacheKey {
    CacheKey::new(sha256_hex(bytes))
}

/// Binary attachment content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content: Bytes,
    pub mime_type: String,
    pub source_url: Option<String>,
}

impl Attachment {
    pub fn new(content: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
            source_url: None,
        }
    }

    /// Decode a base64 payload. The hash is taken over the decoded bytes, so
    /// this shares a slot with the same content given raw.
    pub fn from_base64(encoded: &str, mime_type: impl Into<String>) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                Error::attachment_with_context(
                    "invalid base64 payload",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("attachment_cache"),
                )
            })?;
        Ok(Self::new(bytes, mime_type))
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let malformed = || {
            Error::attachment_with_context(
                "malformed data URL",
                ErrorContext::new()
                    .with_details("expected data:<mime>;base64,<payload>")
                    .with_source("attachment_cache"),
            )
        };
        let rest = url.strip_prefix("data:").ok_or_else(malformed)?;
        let (meta, payload) = rest.split_once(',').ok_or_else(malformed)?;
        let mime = meta.strip_suffix(";base64").ok_or_else(malformed)?;
        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        Self::from_base64(payload, mime)
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn content_hash(&self) -> CacheKey {
        content_hash(&self.content)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.content)
    }
}

/// Bounded LRU of attachments, independent of the response cache.
#[derive(Debug)]
pub struct AttachmentCache {
    inner: BoundedCache<Attachment>,
}

impl AttachmentCache {
    pub fn new(config: &BoundedCacheConfig, ttl: Duration) -> Self {
        let estimator: SizeEstimator<Attachment> = Arc::new(|a: &Attachment| Some(a.size()));
        Self {
            inner: BoundedCache::new(
                "attachment",
                config.max_entries,
                config.max_size_bytes,
                ttl,
                estimator,
            ),
        }
    }

    pub fn with_eviction_listener(mut self, listener: EvictionListener) -> Self {
        self.inner = self.inner.with_eviction_listener(listener);
        self
    }

    pub fn get(&self, hash: &CacheKey) -> Option<CacheEntry<Attachment>> {
        self.inner.get(hash)
    }

    /// Store under a caller-supplied hash.
    pub fn set(&self, hash: &CacheKey, attachment: Attachment) {
        self.inner.set(hash.clone(), attachment, None);
    }

    /// Hash the payload and store it. Returns the hash.
    pub fn put(&self, attachment: Attachment) -> CacheKey {
        let hash = attachment.content_hash();
        self.inner.set(hash.clone(), attachment, None);
        hash
    }

    pub fn get_by_content(&self, bytes: &[u8]) -> Option<CacheEntry<Attachment>> {
        self.inner.get(&content_hash(bytes))
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    pub fn occupancy(&self) -> CacheOccupancy {
        self.inner.occupancy()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
