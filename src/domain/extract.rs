//! Extraction request and per-URL result types.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Batch extraction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub urls: Vec<String>,

    /// Per-URL content cap, in characters. Forwarded to the vendor and
    /// enforced again on the returned content.
    #[serde(default)]
    pub max_chars_per_extract: Option<u32>,
}

impl ExtractRequest {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            max_chars_per_extract: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(Error::validation("At least one URL must be provided"));
        }
        if self.urls.iter().any(|u| u.trim().is_empty()) {
            return Err(Error::validation("URLs must not be empty"));
        }
        if self.max_chars_per_extract == Some(0) {
            return Err(Error::validation("max_chars_per_extract must be greater than 0"));
        }
        Ok(())
    }
}

/// Outcome for a single URL. A failure here is data, not an error: the
/// batch call still succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractItem {
    Success {
        url: String,
        #[serde(default)]
        title: Option<String>,
        /// Page content as markdown
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        publish_date: Option<String>,
    },
    Failure {
        url: String,
        /// Vendor error classification, passed through verbatim
        error_type: String,
        /// Human-readable description
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_status_code: Option<u16>,
    },
}

impl ExtractItem {
    pub fn url(&self) -> &str {
        match self {
            Self::Success { url, .. } | Self::Failure { url, .. } => url,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Success { content, .. } | Self::Failure { content, .. } => content,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Truncate to at most `max_chars` characters, never splitting a
/// multi-byte character.
pub fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
}
