//! End-to-end cache behavior through the public API.

use research_cache::cache::{
    canonicalize, Attachment, BoundedCacheConfig, EvictionReason, ResponseCache,
};
use research_cache::telemetry::InMemoryEvictionSink;
use research_cache::types::{RecencyFilter, ResearchRequest};
use research_cache::{CacheKey, ResearchCache, ResearchCacheConfig};
use serde_json::{json, Map, Value};
use std::time::Duration;

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let cache = ResearchCache::new(ResearchCacheConfig::default()).unwrap();
    let key = CacheKey::from("k1");
    cache.set_cached_response(&key, json!({"answer": 1}), "sonar", Some(Duration::from_millis(5)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(cache.get_cached_response(&key).is_none());
}

#[test]
fn test_two_entry_cache_evicts_oldest() {
    let sink = InMemoryEvictionSink::new(16);
    let cache = ResearchCache::with_eviction_listener(
        ResearchCacheConfig::default().with_response_bounds(2, 1024 * 1024),
        sink.listener(),
    )
    .unwrap();
    for k in ["a", "b", "c"] {
        cache.set_cached_response(&k.into(), json!(k), "sonar", None);
    }
    assert!(cache.get_cached_response(&"a".into()).is_none());
    assert!(cache.get_cached_response(&"b".into()).is_some());
    assert!(cache.get_cached_response(&"c".into()).is_some());

    let events = sink.get_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, CacheKey::from("a"));
    assert_eq!(events[0].reason, EvictionReason::Capacity);
}

#[test]
fn test_n_plus_one_inserts_evict_least_recently_used() {
    let sink = InMemoryEvictionSink::new(16);
    let n = 5;
    let cache = ResponseCache::new(&BoundedCacheConfig::new(n, 1 << 20), Duration::from_secs(60))
        .with_eviction_listener(sink.listener());
    for i in 0..n {
        cache.set(&format!("k{i}").into(), json!(i), "m", None);
    }
    // refresh everything except k2
    for i in (0..n).filter(|i| *i != 2) {
        assert!(cache.get(&format!("k{i}").into()).is_some());
    }
    cache.set(&"new".into(), json!("new"), "m", None);

    let events = sink.get_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, CacheKey::from("k2"));
    assert_eq!(cache.len(), n);
}

#[test]
fn test_zero_ttl_reported_absent() {
    let cache = ResearchCache::new(ResearchCacheConfig::default()).unwrap();
    let key = CacheKey::from("instant");
    cache.set_cached_response(&key, json!(null), "sonar", Some(Duration::ZERO));
    assert!(cache.get_cached_response(&key).is_none());
}

#[test]
fn test_stats_match_retrievable_entries() {
    let cache = ResearchCache::new(ResearchCacheConfig::default()).unwrap();
    cache.set_cached_response(&"live1".into(), json!("x"), "m", None);
    cache.set_cached_response(&"live2".into(), json!("y"), "m", None);
    cache.set_cached_response(&"dead".into(), json!("z"), "m", Some(Duration::ZERO));
    cache.put_attachment(Attachment::new(vec![7u8; 10], "application/pdf"));

    let stats = cache.stats();
    let retrievable = ["live1", "live2", "dead"]
        .iter()
        .filter(|k| cache.get_cached_response(&(**k).into()).is_some())
        .count();
    assert_eq!(stats.response_cache.entry_count, retrievable);
    assert_eq!(stats.response_cache.entry_count, 2);
    assert_eq!(stats.attachment_cache.entry_count, 1);
    assert_eq!(stats.attachment_cache.approximate_size, 10);
    assert_eq!(stats.in_flight_count, 0);
}

#[test]
fn test_property_order_independent_keys() {
    let fields = [
        ("query", json!("compare tokio and async-std")),
        ("model", json!("sonar-pro")),
        ("temperature", json!(0.3)),
        ("return_related_questions", json!(true)),
        ("search_domain_filter", json!(["docs.rs", "github.com"])),
    ];
    let mut forward = Map::new();
    for (k, v) in fields.iter() {
        forward.insert(k.to_string(), v.clone());
    }
    let mut reverse = Map::new();
    for (k, v) in fields.iter().rev() {
        reverse.insert(k.to_string(), v.clone());
    }
    assert_eq!(
        canonicalize(&Value::Object(forward)).unwrap(),
        canonicalize(&Value::Object(reverse)).unwrap()
    );
}

#[test]
fn test_identical_attachments_share_slot_across_requests() {
    let cache = ResearchCache::new(ResearchCacheConfig::default()).unwrap();
    let pdf = b"%PDF-1.4 report".to_vec();
    let first = cache.put_attachment(
        Attachment::new(pdf.clone(), "application/pdf").with_source_url("https://a.example/r.pdf"),
    );
    let second = cache.put_attachment(Attachment::from_base64(
        &Attachment::new(pdf, "application/pdf").to_base64(),
        "application/pdf",
    )
    .unwrap());
    assert_eq!(first, second);
    assert_eq!(cache.stats().attachment_cache.entry_count, 1);
}

#[test]
fn test_config_from_yaml_drives_policy() -> anyhow::Result<()> {
    let cfg = ResearchCacheConfig::from_yaml_str(
        r#"
enabled: true
response:
  max_entries: 3
  max_size_bytes: 65536
attachments:
  max_entries: 2
  max_size_bytes: 1048576
ttl:
  volatile: 60
  general: 600
"#,
    )?;
    let cache = ResearchCache::new(cfg)?;
    let day = ResearchRequest::new("q", "sonar").with_recency(RecencyFilter::Day);
    let week = ResearchRequest::new("q", "sonar").with_recency(RecencyFilter::Week);
    assert_eq!(cache.ttl_for(&day), Duration::from_secs(60));
    assert_eq!(cache.ttl_for(&week), Duration::from_secs(600));
    Ok(())
}
