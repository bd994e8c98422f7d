//! Cache key generation.
//!
//! A key is the SHA-256 of a canonical JSON encoding of the request
//! parameters: object keys are sorted at every depth, so two parameter sets
//! that differ only in insertion order hash identically. Array order is kept.

use crate::types::ResearchRequest;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Leading characters of the key, for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .hash
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.hash.len());
        &self.hash[..end]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.hash
    }
}

/// Derive the cache key for any serializable parameter set.
///
/// Fails only when `params` cannot be represented as JSON (for instance a map
/// with non-string keys). That is a caller bug and is surfaced as
/// [`crate::Error::Serialization`].
pub fn canonicalize<P: Serialize + ?Sized>(params: &P) -> Result<CacheKey> {
    let value = sort_keys(serde_json::to_value(params)?);
    let canonical = serde_json::to_vec(&value)?;
    Ok(CacheKey::new(sha256_hex(&canonical)))
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[derive(Serialize)]
struct Salted<'a, P> {
    salt: &'a str,
    params: &'a P,
}

/// Key generator with an optional namespace salt.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self { salt: None }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn generate<P: Serialize>(&self, params: &P) -> Result<CacheKey> {
        match self.salt.as_deref() {
            Some(salt) => canonicalize(&Salted { salt, params }),
            None => canonicalize(params),
        }
    }

    pub fn key_for_request(&self, request: &ResearchRequest) -> Result<CacheKey> {
        self.generate(request)
    }
}
