use thiserror::Error;

/// Where a configuration or attachment error came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Config path such as `response.max_entries`, or the env variable name.
    pub field_path: Option<String>,
    /// The rejected input, e.g. `got 'lots'`.
    pub details: Option<String>,
    /// `config`, `env` or `attachment_cache`.
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Failure reported by an upstream fetch.
///
/// Cloneable so that every caller coalesced onto one fetch receives the same
/// error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", format_status(.status))]
pub struct FetchError {
    pub message: String,
    /// HTTP status of the upstream response, when there was one.
    pub status: Option<u16>,
    pub retryable: bool,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retryable: false,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self.retryable = status == 429 || status >= 500;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Capture any error as its display text.
    pub fn from_display(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string())
    }
}

/// Unified error type for the cache subsystem.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Attachment error: {message}{}", format_context(.context))]
    Attachment {
        message: String,
        context: ErrorContext,
    },

    #[error("Upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" (HTTP {})", s),
        None => String::new(),
    }
}

// Renders as " (field: .., details: .., source: ..)", omitting absent parts.
fn format_context(ctx: &ErrorContext) -> String {
    let parts: Vec<String> = [
        ("field", &ctx.field_path),
        ("details", &ctx.details),
        ("source", &ctx.source),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.as_deref().map(|v| format!("{}: {}", label, v)))
    .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn attachment_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Attachment {
            message: msg.into(),
            context,
        }
    }

    /// Context of configuration and attachment errors.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Attachment { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = Error::configuration_with_context(
            "max_entries must be greater than zero",
            ErrorContext::new()
                .with_field_path("response.max_entries")
                .with_source("config"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Configuration error: max_entries"));
        assert!(msg.contains("field: response.max_entries"));
        assert!(msg.contains("source: config"));
    }

    #[test]
    fn test_context_renders_in_field_details_source_order() {
        let ctx = ErrorContext::new()
            .with_source("env")
            .with_details("got 'lots'")
            .with_field_path("RESEARCH_CACHE_MAX_ENTRIES");
        assert_eq!(
            format_context(&ctx),
            " (field: RESEARCH_CACHE_MAX_ENTRIES, details: got 'lots', source: env)"
        );
        assert_eq!(format_context(&ErrorContext::new().with_details("x")), " (details: x)");
    }

    #[test]
    fn test_error_display_without_context() {
        let err = Error::attachment_with_context("bad payload", ErrorContext::new());
        assert_eq!(err.to_string(), "Attachment error: bad payload");
        assert!(err.context().is_some());
    }

    #[test]
    fn test_fetch_error_display_and_retryable() {
        let err = FetchError::new("rate limited").with_status(429);
        assert_eq!(err.to_string(), "rate limited (HTTP 429)");
        assert!(err.retryable);
        assert!(!FetchError::new("bad request").with_status(400).retryable);
        assert_eq!(FetchError::from_display("boom").to_string(), "boom");

        let wrapped = Error::from(err.clone());
        assert_eq!(wrapped.to_string(), "Upstream fetch failed: rate limited (HTTP 429)");
        assert!(matches!(wrapped, Error::Fetch(e) if e == err));
    }

    #[test]
    fn test_serialization_error_has_no_context() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.context().is_none());
    }
}
