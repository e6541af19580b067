//! Client settings and layered configuration.
//!
//! Library callers build a [`ClientSettings`] directly. The CLI resolves one
//! from these sources (highest priority first):
//! 1. Command-line flags
//! 2. Environment variables (PARALLEL_AI_BASE_URL, PARALLEL_AI_TIMEOUT_SECONDS,
//!    PARALLEL_AI_MAX_RETRIES)
//! 3. Config file (.parallel-web/config.yaml, or PARALLEL_WEB_CONFIG)
//! 4. Defaults
//!
//! The API key never comes from the config file; see [`crate::credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{Processor, DEFAULT_CHAT_MODEL};
use crate::transport::{join_url, RetryPolicy};

/// Vendor production endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.parallel.ai";

/// Retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Chat and extract deadline when not overridden. Search uses the
/// processor-specific default instead.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const BASE_URL_ENV: &str = "PARALLEL_AI_BASE_URL";
pub const TIMEOUT_ENV: &str = "PARALLEL_AI_TIMEOUT_SECONDS";
pub const MAX_RETRIES_ENV: &str = "PARALLEL_AI_MAX_RETRIES";
pub const CONFIG_PATH_ENV: &str = "PARALLEL_WEB_CONFIG";

/// Config file schema version this build understands
pub const CONFIG_VERSION: &str = "1";

/// Transport settings shared by all adapters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSettings {
    /// Vendor base URL
    pub base_url: String,

    /// Whole-request deadline override
    pub timeout: Option<Duration>,

    /// Retries for connection errors, timeouts and 5xx responses
    pub max_retries: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Absolute URL for a vendor path
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Deadline for a request, falling back to `default`
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub chat: Option<ChatSection>,
    #[serde(default)]
    pub search: Option<SearchSection>,
    #[serde(default)]
    pub extract: Option<ExtractSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    pub processor: Option<Processor>,
    pub max_results: Option<u32>,
    pub max_chars_per_result: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractSection {
    pub max_chars_per_extract: Option<u32>,
}

/// Defaults applied to CLI searches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDefaults {
    pub processor: Processor,
    pub max_results: u32,
    pub max_chars_per_result: u32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            processor: Processor::Base,
            max_results: 10,
            max_chars_per_result: 1500,
        }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub client: ClientSettings,
    pub chat_model: String,
    pub search: SearchDefaults,
    pub max_chars_per_extract: Option<u32>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".parallel-web").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge an optional config file with environment values.
///
/// `lookup` receives a variable name and returns its value, which keeps
/// this function free of process-global state.
pub fn resolve_config<F>(file: Option<(PathBuf, ConfigFile)>, lookup: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let (config_file, parsed) = match file {
        Some((path, parsed)) => (Some(path), parsed),
        None => (None, ConfigFile::default()),
    };

    if let Some(version) = parsed.version.as_deref() {
        if version.trim() != CONFIG_VERSION {
            anyhow::bail!(
                "Unsupported config file version {:?} (expected {:?})",
                version,
                CONFIG_VERSION
            );
        }
    }

    let base_url = lookup(BASE_URL_ENV)
        .filter(|v| !v.trim().is_empty())
        .or(parsed.api.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let timeout_seconds = match lookup(TIMEOUT_ENV) {
        Some(raw) => Some(
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds", TIMEOUT_ENV))?,
        ),
        None => parsed.api.timeout_seconds,
    };

    let max_retries = match lookup(MAX_RETRIES_ENV) {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .with_context(|| format!("{} must be a non-negative integer", MAX_RETRIES_ENV))?,
        None => parsed.api.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
    };

    let chat_model = parsed
        .chat
        .and_then(|c| c.model)
        .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());

    let defaults = SearchDefaults::default();
    let search = match parsed.search {
        Some(s) => SearchDefaults {
            processor: s.processor.unwrap_or(defaults.processor),
            max_results: s.max_results.unwrap_or(defaults.max_results),
            max_chars_per_result: s
                .max_chars_per_result
                .unwrap_or(defaults.max_chars_per_result),
        },
        None => defaults,
    };

    Ok(ResolvedConfig {
        client: ClientSettings {
            base_url,
            timeout: timeout_seconds.map(Duration::from_secs),
            max_retries,
        },
        chat_model,
        search,
        max_chars_per_extract: parsed.extract.and_then(|e| e.max_chars_per_extract),
        config_file,
    })
}

/// Load configuration from all sources using the process environment
pub fn load_config() -> Result<ResolvedConfig> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    let path = match explicit {
        Some(path) => Some(path),
        None => std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_file(&cwd)),
    };

    let file = match path {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve_config(file, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = resolve_config(None, env(&[])).unwrap();
        assert_eq!(config.client, ClientSettings::default());
        assert_eq!(config.chat_model, "speed");
        assert_eq!(config.search, SearchDefaults::default());
        assert!(config.max_chars_per_extract.is_none());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".parallel-web");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1"
api:
  base_url: http://localhost:9999
  timeout_seconds: 30
  max_retries: 5
chat:
  model: speed
search:
  processor: pro
  max_results: 20
extract:
  max_chars_per_extract: 4000
"#
        )
        .unwrap();

        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, config_path);

        let parsed = load_config_file(&found).unwrap();
        let config = resolve_config(Some((found, parsed)), env(&[])).unwrap();
        assert_eq!(config.client.base_url, "http://localhost:9999");
        assert_eq!(config.client.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.client.max_retries, 5);
        assert_eq!(config.search.processor, Processor::Pro);
        assert_eq!(config.search.max_results, 20);
        assert_eq!(config.search.max_chars_per_result, 1500);
        assert_eq!(config.max_chars_per_extract, Some(4000));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            api: ApiSection {
                base_url: Some("http://from-file".into()),
                timeout_seconds: Some(30),
                max_retries: Some(5),
            },
            ..Default::default()
        };
        let config = resolve_config(
            Some((PathBuf::from("/tmp/config.yaml"), file)),
            env(&[
                (BASE_URL_ENV, "http://from-env"),
                (TIMEOUT_ENV, "7"),
                (MAX_RETRIES_ENV, "0"),
            ]),
        )
        .unwrap();

        assert_eq!(config.client.base_url, "http://from-env");
        assert_eq!(config.client.timeout, Some(Duration::from_secs(7)));
        assert_eq!(config.client.max_retries, 0);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let result = resolve_config(None, env(&[(TIMEOUT_ENV, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_config_version_is_rejected() {
        let path = PathBuf::from("/tmp/config.yaml");
        let file = ConfigFile {
            version: Some("2".into()),
            ..Default::default()
        };
        let err = resolve_config(Some((path.clone(), file)), env(&[])).unwrap_err();
        assert!(err.to_string().contains("Unsupported config file version"));

        let file = ConfigFile {
            version: Some("1".into()),
            ..Default::default()
        };
        assert!(resolve_config(Some((path, file)), env(&[])).is_ok());
    }

    #[test]
    fn test_endpoint_and_timeout() {
        let settings = ClientSettings::with_base_url("https://api.parallel.ai/");
        assert_eq!(
            settings.endpoint("/v1beta/search"),
            "https://api.parallel.ai/v1beta/search"
        );
        assert_eq!(settings.timeout_or(DEFAULT_TIMEOUT), DEFAULT_TIMEOUT);
        assert_eq!(settings.retry_policy().max_attempts, 3);
    }
}
