//! API key handling.
//!
//! Resolution precedence (highest first):
//! 1. Explicit value passed to the adapter constructor
//! 2. `PARALLEL_AI_API_KEY` environment variable
//! 3. Configuration error naming the variable

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "PARALLEL_AI_API_KEY";

/// Placeholder used wherever the key would otherwise be printed
const REDACTED: &str = "**********";

/// Secret API key. `Debug`, `Display` and `Serialize` never reveal it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Resolve the API key from an explicit value or an environment lookup.
///
/// `lookup` receives the variable name; pass `|k| std::env::var(k).ok()`
/// for the process environment. Blank values are treated as absent.
pub fn resolve_api_key<F>(explicit: Option<&str>, lookup: F) -> Result<ApiKey>
where
    F: FnOnce(&str) -> Option<String>,
{
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(ApiKey::new(key));
    }

    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        return Ok(ApiKey::new(key.trim()));
    }

    Err(Error::Configuration(format!(
        "Parallel AI API key not found. Please pass it as an argument or set the {} environment variable.",
        API_KEY_ENV
    )))
}

/// Resolve against the process environment
pub fn resolve_from_env(explicit: Option<&str>) -> Result<ApiKey> {
    resolve_api_key(explicit, |name| std::env::var(name).ok())
}

/// Secret fields of an adapter mapped to the environment variable they come from
pub fn secrets() -> &'static [(&'static str, &'static str)] {
    &[("api_key", API_KEY_ENV)]
}
