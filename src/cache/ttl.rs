//! Expiry policy for cached responses.
//!
//! Answers whose correctness depends on recency must expire quickly, while
//! expensive multi-step research results are kept longest. [`TtlPolicy`]
//! applies an ordered rule list over [`RequestCharacteristics`]; the first
//! matching rule picks a [`VolatilityClass`], and the [`CacheTtl`] table maps
//! that class to a duration.

use crate::types::{RecencyFilter, ResearchRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Volatility classes of cached content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolatilityClass {
    StableTechnical,
    General,
    Volatile,
    ExpensiveDeepResult,
    AttachmentContent,
}

/// Duration per volatility class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtl {
    #[serde(with = "duration_secs")]
    pub stable_technical: Duration,
    #[serde(with = "duration_secs")]
    pub general: Duration,
    #[serde(with = "duration_secs")]
    pub volatile: Duration,
    #[serde(with = "duration_secs")]
    pub expensive_deep_result: Duration,
    #[serde(with = "duration_secs")]
    pub attachment_content: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            stable_technical: Duration::from_secs(60 * 60),
            general: Duration::from_secs(30 * 60),
            volatile: Duration::from_secs(5 * 60),
            expensive_deep_result: Duration::from_secs(2 * 60 * 60),
            attachment_content: Duration::from_secs(60 * 60),
        }
    }
}

impl CacheTtl {
    pub fn duration_for(&self, class: VolatilityClass) -> Duration {
        match class {
            VolatilityClass::StableTechnical => self.stable_technical,
            VolatilityClass::General => self.general,
            VolatilityClass::Volatile => self.volatile,
            VolatilityClass::ExpensiveDeepResult => self.expensive_deep_result,
            VolatilityClass::AttachmentContent => self.attachment_content,
        }
    }
}

/// The request properties the policy looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCharacteristics {
    pub deep_research: bool,
    pub recency: Option<RecencyFilter>,
}

impl RequestCharacteristics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deep_research(mut self, deep: bool) -> Self {
        self.deep_research = deep;
        self
    }

    pub fn with_recency(mut self, recency: RecencyFilter) -> Self {
        self.recency = Some(recency);
        self
    }
}

impl From<&ResearchRequest> for RequestCharacteristics {
    fn from(req: &ResearchRequest) -> Self {
        Self {
            deep_research: req.is_deep_research(),
            recency: req.recency,
        }
    }
}

/// Rule-based TTL selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlPolicy {
    table: CacheTtl,
}

impl TtlPolicy {
    pub fn new(table: CacheTtl) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CacheTtl {
        &self.table
    }

    /// Rules in order, first match wins:
    /// 1. deep research
    /// 2. recency of a day or less
    /// 3. recency of a week (same duration as the default)
    /// 4. everything else
    pub fn classify(&self, chars: &RequestCharacteristics) -> VolatilityClass {
        if chars.deep_research {
            return VolatilityClass::ExpensiveDeepResult;
        }
        match chars.recency {
            Some(r) if r.is_within_day() => VolatilityClass::Volatile,
            // Week shares the general TTL.
            Some(RecencyFilter::Week) => VolatilityClass::General,
            _ => VolatilityClass::General,
        }
    }

    pub fn select(&self, chars: &RequestCharacteristics) -> Duration {
        self.table.duration_for(self.classify(chars))
    }

    pub fn select_for_request(&self, req: &ResearchRequest) -> Duration {
        self.select(&RequestCharacteristics::from(req))
    }

    /// Flat TTL for attachment content.
    pub fn attachment(&self) -> Duration {
        self.table.attachment_content
    }
}

/// Serde adapter storing a [`Duration`] as whole seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchMode;

    #[test]
    fn test_default_table() {
        let t = CacheTtl::default();
        assert_eq!(t.expensive_deep_result, Duration::from_secs(7200));
        assert_eq!(t.volatile, Duration::from_secs(300));
        assert_eq!(t.general, Duration::from_secs(1800));
        assert_eq!(t.stable_technical, Duration::from_secs(3600));
        assert_eq!(t.attachment_content, Duration::from_secs(3600));
    }

    #[test]
    fn test_deep_research_wins_over_recency() {
        let p = TtlPolicy::default();
        let chars = RequestCharacteristics::new()
            .with_deep_research(true)
            .with_recency(RecencyFilter::Day);
        assert_eq!(p.classify(&chars), VolatilityClass::ExpensiveDeepResult);
        assert_eq!(p.select(&chars), Duration::from_secs(7200));
    }

    #[test]
    fn test_day_and_hour_are_volatile() {
        let p = TtlPolicy::default();
        for r in [RecencyFilter::Day, RecencyFilter::Hour] {
            let chars = RequestCharacteristics::new().with_recency(r);
            assert_eq!(p.select(&chars), Duration::from_secs(300));
        }
    }

    #[test]
    fn test_week_matches_default() {
        let p = TtlPolicy::default();
        let week = p.select(&RequestCharacteristics::new().with_recency(RecencyFilter::Week));
        let none = p.select(&RequestCharacteristics::new());
        assert_eq!(week, none);
        assert_eq!(week, Duration::from_secs(1800));
    }

    #[test]
    fn test_month_and_year_use_default() {
        let p = TtlPolicy::default();
        for r in [RecencyFilter::Month, RecencyFilter::Year] {
            let chars = RequestCharacteristics::new().with_recency(r);
            assert_eq!(p.classify(&chars), VolatilityClass::General);
        }
    }

    #[test]
    fn test_from_request() {
        let p = TtlPolicy::default();
        let req = ResearchRequest::new("q", "m")
            .with_search_mode(SearchMode::DeepResearch)
            .with_recency(RecencyFilter::Hour);
        assert_eq!(p.select_for_request(&req), Duration::from_secs(7200));
        let req = ResearchRequest::new("q", "m").with_recency(RecencyFilter::Day);
        assert_eq!(p.select_for_request(&req), Duration::from_secs(300));
    }

    #[test]
    fn test_custom_table() {
        let table = CacheTtl {
            general: Duration::from_secs(10),
            ..Default::default()
        };
        let p = TtlPolicy::new(table);
        assert_eq!(p.select(&RequestCharacteristics::new()), Duration::from_secs(10));
        assert_eq!(p.attachment(), Duration::from_secs(3600));
    }

    #[test]
    fn test_table_serde_seconds() {
        let json = serde_json::to_value(CacheTtl::default()).unwrap();
        assert_eq!(json["volatile"], 300);
        let parsed: CacheTtl = serde_json::from_str(r#"{"general": 60}"#).unwrap();
        assert_eq!(parsed.general, Duration::from_secs(60));
        assert_eq!(parsed.volatile, Duration::from_secs(300));
    }
}
