//! Response cache keyed by canonical request key.

use super::backend::{BoundedCache, CacheEntry, CacheOccupancy, EvictionListener, SizeEstimator};
use super::config::BoundedCacheConfig;
use super::key::CacheKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A cached upstream answer and the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub data: Value,
    pub model: String,
}

fn json_size(resp: &CachedResponse) -> Option<usize> {
    serde_json::to_vec(&resp.data)
        .ok()
        .map(|bytes| bytes.len() + resp.model.len())
}

/// Bounded LRU of upstream answers.
#[derive(Debug)]
pub struct ResponseCache {
    inner: BoundedCache<CachedResponse>,
}

impl ResponseCache {
    pub fn new(config: &BoundedCacheConfig, default_ttl: Duration) -> Self {
        let estimator: SizeEstimator<CachedResponse> = Arc::new(json_size);
        Self {
            inner: BoundedCache::new(
                "response",
                config.max_entries,
                config.max_size_bytes,
                default_ttl,
                estimator,
            ),
        }
    }

    pub fn with_eviction_listener(mut self, listener: EvictionListener) -> Self {
        self.inner = self.inner.with_eviction_listener(listener);
        self
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<CachedResponse>> {
        self.inner.get(key)
    }

    /// Overwrites any entry under `key`. `ttl` applies to this entry only.
    pub fn set(&self, key: &CacheKey, data: Value, model: impl Into<String>, ttl: Option<Duration>) {
        let value = CachedResponse {
            data,
            model: model.into(),
        };
        self.inner.set(key.clone(), value, ttl);
    }

    /// Store an already shared response without copying it.
    pub fn insert(&self, key: &CacheKey, response: Arc<CachedResponse>, ttl: Option<Duration>) {
        self.inner.set_shared(key.clone(), response, ttl);
    }

    /// Live-entry check that leaves recency untouched.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.contains(key)
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.inner.remove(key).is_some()
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

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(max_entries: usize) -> ResponseCache {
        ResponseCache::new(
            &BoundedCacheConfig::new(max_entries, 1024 * 1024),
            Duration::from_secs(1800),
        )
    }

    #[test]
    fn test_set_get_round() {
        let c = cache(10);
        let key = CacheKey::from("k1");
        c.set(&key, json!({"answer": "42", "citations": []}), "sonar", None);
        let entry = c.get(&key).unwrap();
        assert_eq!(entry.value.model, "sonar");
        assert_eq!(entry.value.data["answer"], "42");
        assert_eq!(entry.ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_size_is_json_length_plus_label() {
        let c = cache(10);
        let key = CacheKey::from("k");
        c.set(&key, json!("abc"), "m", None);
        // "\"abc\"" is 5 bytes, "m" is 1
        assert_eq!(c.get(&key).unwrap().approximate_size, 6);
        assert_eq!(c.occupancy().approximate_size, 6);
    }

    #[test]
    fn test_overwrite_replaces_whole_entry() {
        let c = cache(10);
        let key = CacheKey::from("k");
        c.set(&key, json!(1), "old-model", Some(Duration::from_secs(5)));
        c.set(&key, json!(2), "new-model", None);
        let entry = c.get(&key).unwrap();
        assert_eq!(entry.value.data, json!(2));
        assert_eq!(entry.value.model, "new-model");
        assert_eq!(entry.ttl, Duration::from_secs(1800));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let c = cache(10);
        c.set(&"a".into(), json!(1), "m", None);
        c.set(&"b".into(), json!(2), "m", None);
        assert!(c.contains(&"a".into()));
        assert!(c.remove(&"a".into()));
        assert!(!c.contains(&"a".into()));
        assert!(!c.remove(&"a".into()));
        c.clear();
        assert!(c.is_empty());
    }
}
