//! Search request/response types and request validation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MAX_SEARCH_QUERIES: usize = 5;
pub const MAX_QUERY_CHARS: usize = 200;
pub const MAX_OBJECTIVE_CHARS: usize = 5000;
pub const MIN_RESULTS: u32 = 1;
pub const MAX_RESULTS: u32 = 40;
pub const MIN_CHARS_PER_RESULT: u32 = 100;

fn default_max_results() -> u32 {
    10
}
fn default_max_chars_per_result() -> u32 {
    1500
}

/// Vendor processing tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    /// Fast, cheap (typical 4-5s)
    #[default]
    Base,
    /// Slow, thorough (typical 45-70s)
    Pro,
}

impl Processor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Pro => "pro",
        }
    }

    /// Request deadline used when the caller does not override it
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Base => Duration::from_secs(10),
            Self::Pro => Duration::from_secs(90),
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Processor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "pro" => Ok(Self::Pro),
            other => Err(Error::validation(format!(
                "processor must be 'base' or 'pro', got '{}'",
                other
            ))),
        }
    }
}

/// Domain filters applied by the vendor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePolicy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_domains: Vec<String>,
}

impl SourcePolicy {
    pub fn is_empty(&self) -> bool {
        self.include_domains.is_empty() && self.exclude_domains.is_empty()
    }
}

/// A web search request. Exactly one of `objective` and `search_queries`
/// must be provided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Natural-language research goal
    #[serde(default)]
    pub objective: Option<String>,

    /// Explicit keyword queries
    #[serde(default)]
    pub search_queries: Option<Vec<String>>,

    #[serde(default)]
    pub processor: Processor,

    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_max_chars_per_result")]
    pub max_chars_per_result: u32,

    #[serde(default)]
    pub source_policy: Option<SourcePolicy>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            objective: None,
            search_queries: None,
            processor: Processor::default(),
            max_results: default_max_results(),
            max_chars_per_result: default_max_chars_per_result(),
            source_policy: None,
        }
    }
}

impl SearchRequest {
    pub fn objective(objective: impl Into<String>) -> Self {
        Self {
            objective: Some(objective.into()),
            ..Default::default()
        }
    }

    pub fn queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            search_queries: Some(queries.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Objective, if non-blank
    pub fn effective_objective(&self) -> Option<&str> {
        self.objective.as_deref().filter(|o| !o.trim().is_empty())
    }

    /// Queries, if the list is non-empty
    pub fn effective_queries(&self) -> Option<&[String]> {
        self.search_queries.as_deref().filter(|q| !q.is_empty())
    }

    /// Check the request against vendor limits. Runs before any I/O.
    pub fn validate(&self) -> Result<()> {
        let objective = self.effective_objective();
        let queries = self.effective_queries();

        match (objective, queries) {
            (None, None) => {
                return Err(Error::validation(
                    "Either 'objective' or 'search_queries' must be provided",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "Provide either 'objective' or 'search_queries', not both",
                ))
            }
            _ => {}
        }

        if let Some(queries) = queries {
            if queries.len() > MAX_SEARCH_QUERIES {
                return Err(Error::validation(format!(
                    "Maximum {} search queries allowed",
                    MAX_SEARCH_QUERIES
                )));
            }
            if queries.iter().any(|q| q.chars().count() > MAX_QUERY_CHARS) {
                return Err(Error::validation(format!(
                    "Each search query must be {} characters or less",
                    MAX_QUERY_CHARS
                )));
            }
        }

        if let Some(objective) = objective {
            if objective.chars().count() > MAX_OBJECTIVE_CHARS {
                return Err(Error::validation(format!(
                    "Objective must be {} characters or less",
                    MAX_OBJECTIVE_CHARS
                )));
            }
        }

        if !(MIN_RESULTS..=MAX_RESULTS).contains(&self.max_results) {
            return Err(Error::validation(format!(
                "max_results must be between {} and {}",
                MIN_RESULTS, MAX_RESULTS
            )));
        }

        if self.max_chars_per_result < MIN_CHARS_PER_RESULT {
            return Err(Error::validation(format!(
                "max_chars_per_result must be at least {}",
                MIN_CHARS_PER_RESULT
            )));
        }

        Ok(())
    }

    /// Number of explicit queries sent (0 for objective searches)
    pub fn query_count(&self) -> usize {
        self.effective_queries().map_or(0, <[String]>::len)
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Relevant snippets, in vendor order
    #[serde(default)]
    pub excerpts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
}

/// Search response, in vendor relevance order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub search_id: String,

    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Per-call observability data, returned alongside (not inside) the response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMetadata {
    pub search_duration_seconds: f64,
    pub result_count: usize,
    pub max_results_requested: u32,
    pub actual_results_returned: usize,
    pub processor_used: Processor,
    pub query_count: usize,
    pub objective_provided: bool,
    pub source_policy_applied: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_domains: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_domains: Option<Vec<String>>,

    pub timestamp: DateTime<Utc>,
}

impl SearchMetadata {
    /// Metadata for a completed call, stamped with the current time
    pub fn new(request: &SearchRequest, result_count: usize, elapsed: Duration) -> Self {
        let policy = request.source_policy.as_ref().filter(|p| !p.is_empty());
        let non_empty = |domains: &[String]| (!domains.is_empty()).then(|| domains.to_vec());

        Self {
            search_duration_seconds: elapsed.as_secs_f64(),
            result_count,
            max_results_requested: request.max_results,
            actual_results_returned: result_count,
            processor_used: request.processor,
            query_count: request.query_count(),
            objective_provided: request.effective_objective().is_some(),
            source_policy_applied: policy.is_some(),
            included_domains: policy.and_then(|p| non_empty(p.include_domains.as_slice())),
            excluded_domains: policy.and_then(|p| non_empty(p.exclude_domains.as_slice())),
            timestamp: Utc::now(),
        }
    }
}
