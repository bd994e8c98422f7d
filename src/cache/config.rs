//! Cache configuration.
//!
//! Defaults are sized for a single agent bridge process. Settings can be
//! loaded from YAML and overlaid with `RESEARCH_CACHE_*` environment variables.

use super::ttl::CacheTtl;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_ENABLED: &str = "RESEARCH_CACHE_ENABLED";
pub const ENV_MAX_ENTRIES: &str = "RESEARCH_CACHE_MAX_ENTRIES";
pub const ENV_MAX_SIZE_BYTES: &str = "RESEARCH_CACHE_MAX_SIZE_BYTES";
pub const ENV_ATTACHMENT_MAX_ENTRIES: &str = "RESEARCH_CACHE_ATTACHMENT_MAX_ENTRIES";
pub const ENV_ATTACHMENT_MAX_SIZE_BYTES: &str = "RESEARCH_CACHE_ATTACHMENT_MAX_SIZE_BYTES";
pub const ENV_DEFAULT_TTL_SECS: &str = "RESEARCH_CACHE_DEFAULT_TTL_SECS";

/// Bounds of a single LRU store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedCacheConfig {
    pub max_entries: usize,
    pub max_size_bytes: usize,
}

impl BoundedCacheConfig {
    pub fn new(max_entries: usize, max_size_bytes: usize) -> Self {
        Self {
            max_entries,
            max_size_bytes,
        }
    }

    /// 500 entries, 50 MiB.
    pub fn responses() -> Self {
        Self::new(500, 50 * 1024 * 1024)
    }

    /// 100 entries, 200 MiB.
    pub fn attachments() -> Self {
        Self::new(100, 200 * 1024 * 1024)
    }

    /// Fill fields missing from a config section with the given section defaults.
    fn merged(base: Self, partial: PartialBounds) -> Self {
        Self {
            max_entries: partial.max_entries.unwrap_or(base.max_entries),
            max_size_bytes: partial.max_size_bytes.unwrap_or(base.max_size_bytes),
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "max_entries must be greater than zero",
                ErrorContext::new()
                    .with_field_path(format!("{}.max_entries", section))
                    .with_source("config"),
            ));
        }
        if self.max_size_bytes == 0 {
            return Err(Error::configuration_with_context(
                "max_size_bytes must be greater than zero",
                ErrorContext::new()
                    .with_field_path(format!("{}.max_size_bytes", section))
                    .with_source("config"),
            ));
        }
        Ok(())
    }
}

// A YAML section may name only some bounds; the rest come from that section's defaults.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialBounds {
    max_entries: Option<usize>,
    max_size_bytes: Option<usize>,
}

fn response_bounds<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BoundedCacheConfig, D::Error> {
    let partial = PartialBounds::deserialize(d)?;
    Ok(BoundedCacheConfig::merged(BoundedCacheConfig::responses(), partial))
}

fn attachment_bounds<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BoundedCacheConfig, D::Error> {
    let partial = PartialBounds::deserialize(d)?;
    Ok(BoundedCacheConfig::merged(BoundedCacheConfig::attachments(), partial))
}

/// Top-level configuration for [`super::ResearchCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchCacheConfig {
    /// When false, responses are neither read from nor written to the cache.
    /// In-flight coalescing stays active.
    pub enabled: bool,
    #[serde(deserialize_with = "response_bounds")]
    pub response: BoundedCacheConfig,
    #[serde(deserialize_with = "attachment_bounds")]
    pub attachments: BoundedCacheConfig,
    pub ttl: CacheTtl,
    /// Namespace mixed into every response key.
    pub key_salt: Option<String>,
}

impl Default for ResearchCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response: BoundedCacheConfig::responses(),
            attachments: BoundedCacheConfig::attachments(),
            ttl: CacheTtl::default(),
            key_salt: None,
        }
    }
}

impl ResearchCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_response_bounds(mut self, max_entries: usize, max_size_bytes: usize) -> Self {
        self.response = BoundedCacheConfig::new(max_entries, max_size_bytes);
        self
    }

    pub fn with_attachment_bounds(mut self, max_entries: usize, max_size_bytes: usize) -> Self {
        self.attachments = BoundedCacheConfig::new(max_entries, max_size_bytes);
        self
    }

    pub fn with_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Default TTL for responses stored without an explicit one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.ttl.general = ttl;
        self
    }

    pub fn with_key_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = Some(salt.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.response.validate("response")?;
        self.attachments.validate("attachments")?;
        Ok(())
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply any `RESEARCH_CACHE_*` variables that are set.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_ENTRIES) {
            self.response.max_entries = parse_number(ENV_MAX_ENTRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_SIZE_BYTES) {
            self.response.max_size_bytes = parse_number(ENV_MAX_SIZE_BYTES, &v)?;
        }
        if let Some(v) = lookup(ENV_ATTACHMENT_MAX_ENTRIES) {
            self.attachments.max_entries = parse_number(ENV_ATTACHMENT_MAX_ENTRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_ATTACHMENT_MAX_SIZE_BYTES) {
            self.attachments.max_size_bytes = parse_number(ENV_ATTACHMENT_MAX_SIZE_BYTES, &v)?;
        }
        if let Some(v) = lookup(ENV_DEFAULT_TTL_SECS) {
            let secs: u64 = parse_number(ENV_DEFAULT_TTL_SECS, &v)?;
            self.ttl.general = Duration::from_secs(secs);
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        Error::configuration_with_context(
            "expected a non-negative integer",
            ErrorContext::new()
                .with_field_path(name)
                .with_details(format!("got '{}'", raw))
                .with_source("env"),
        )
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration_with_context(
            "expected a boolean",
            ErrorContext::new()
                .with_field_path(name)
                .with_details(format!("got '{}'", raw))
                .with_source("env"),
        )),
    }
}
