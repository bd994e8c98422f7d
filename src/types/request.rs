//! Research request parameters as seen by the cache layer.

use serde::{Deserialize, Serialize};

/// How much work the upstream service puts into an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Single-pass search and answer.
    #[default]
    Standard,
    /// Search followed by a reasoning pass.
    Reasoning,
    /// Multi-step research that issues many searches. Slow and costly.
    DeepResearch,
}

/// Restricts search results to a recent time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RecencyFilter {
    /// True for windows no wider than a single day.
    pub fn is_within_day(&self) -> bool {
        matches!(self, RecencyFilter::Hour | RecencyFilter::Day)
    }
}

/// A research query plus every parameter that shapes the answer.
///
/// Serializing this struct yields exactly the fields that feed the cache key.
/// `request_id` and `log_context` are bookkeeping and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    pub model: String,
    #[serde(default)]
    pub search_mode: SearchMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_filter: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency: Option<RecencyFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub return_related_questions: bool,
    #[serde(default)]
    pub return_images: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip)]
    pub request_id: Option<String>,
    #[serde(skip)]
    pub log_context: Option<String>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model: model.into(),
            request_id: Some(uuid::Uuid::new_v4().to_string()),
            ..Default::default()
        }
    }

    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    pub fn with_domain_filter<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_filter = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_recency(mut self, recency: RecencyFilter) -> Self {
        self.recency = Some(recency);
        self
    }

    pub fn with_date_range(mut self, after: Option<String>, before: Option<String>) -> Self {
        self.after_date = after;
        self.before_date = before;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_related_questions(mut self, enabled: bool) -> Self {
        self.return_related_questions = enabled;
        self
    }

    pub fn with_images(mut self, enabled: bool) -> Self {
        self.return_images = enabled;
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_log_context(mut self, ctx: impl Into<String>) -> Self {
        self.log_context = Some(ctx.into());
        self
    }

    pub fn is_deep_research(&self) -> bool {
        self.search_mode == SearchMode::DeepResearch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_request_id() {
        let a = ResearchRequest::new("q", "m");
        let b = ResearchRequest::new("q", "m");
        assert!(a.request_id.is_some());
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_bookkeeping_fields_not_serialized() {
        let req = ResearchRequest::new("rust lru crates", "sonar")
            .with_request_id("req-1")
            .with_log_context("agent=planner");
        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("request_id"));
        assert!(!obj.contains_key("log_context"));
        assert_eq!(obj["query"], "rust lru crates");
        assert_eq!(obj["search_mode"], "standard");
    }

    #[test]
    fn test_unset_optionals_are_omitted() {
        let json = serde_json::to_value(ResearchRequest::new("q", "m")).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("recency"));
        assert!(!obj.contains_key("temperature"));
        assert!(!obj.contains_key("domain_filter"));
    }

    #[test]
    fn test_recency_within_day() {
        assert!(RecencyFilter::Hour.is_within_day());
        assert!(RecencyFilter::Day.is_within_day());
        assert!(!RecencyFilter::Week.is_within_day());
        assert!(!RecencyFilter::Year.is_within_day());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let req: ResearchRequest = serde_json::from_str(
            r#"{"query": "q", "model": "sonar-deep-research", "search_mode": "deep_research"}"#,
        )
        .unwrap();
        assert!(req.is_deep_research());
        assert!(req.request_id.is_none());
        assert!(!req.return_related_questions);
    }
}
