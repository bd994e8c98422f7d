//! 遥测模块：日志初始化与缓存淘汰事件收集。
//!
//! Telemetry helpers.
//!
//! Eviction notifications are diagnostics only; nothing in the cache depends
//! on them being observed.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`init_tracing`] | Installs an env-filtered `tracing` subscriber |
//! | [`EvictionEvent`] | A disposed key and the reason |
//! | [`InMemoryEvictionSink`] | Bounded in-memory event log for tests and debugging |

use crate::cache::{CacheKey, EvictionListener, EvictionReason};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Install a `tracing-subscriber` formatter filtered by `RUST_LOG`
/// (default `info`). Safe to call more than once.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionEvent {
    pub key: CacheKey,
    pub reason: EvictionReason,
}

/// In-memory sink for eviction events. Keeps the most recent `max_events`.
#[derive(Clone)]
pub struct InMemoryEvictionSink {
    events: Arc<Mutex<VecDeque<EvictionEvent>>>,
    max_events: usize,
}

impl InMemoryEvictionSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max.max(1),
        }
    }

    /// A listener feeding this sink, for [`crate::cache::ResearchCache::with_eviction_listener`].
    pub fn listener(&self) -> EvictionListener {
        let sink = self.clone();
        Arc::new(move |key: &CacheKey, reason: EvictionReason| sink.record(key, reason))
    }

    pub fn record(&self, key: &CacheKey, reason: EvictionReason) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(EvictionEvent {
            key: key.clone(),
            reason,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn get_events(&self) -> Vec<EvictionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn count(&self, reason: EvictionReason) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.reason == reason)
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_keeps_most_recent() {
        let sink = InMemoryEvictionSink::new(2);
        sink.record(&"a".into(), EvictionReason::Capacity);
        sink.record(&"b".into(), EvictionReason::Expired);
        sink.record(&"c".into(), EvictionReason::Capacity);
        let keys: Vec<String> = sink.get_events().iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(sink.count(EvictionReason::Capacity), 1);
    }

    #[test]
    fn test_listener_feeds_sink() {
        let sink = InMemoryEvictionSink::new(10);
        let listener = sink.listener();
        listener(&"k".into(), EvictionReason::Replaced);
        assert_eq!(
            sink.get_events(),
            vec![EvictionEvent {
                key: "k".into(),
                reason: EvictionReason::Replaced
            }]
        );
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
