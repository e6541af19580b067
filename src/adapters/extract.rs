//! Batch content extraction tool.
//!
//! One request covers the whole batch. Per-URL failures reported by the
//! vendor come back as [`ExtractItem::Failure`] entries; only a failure of
//! the batch call itself is an error.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{parse_args, Connection, Tool};
use crate::blocking;
use crate::config::DEFAULT_TIMEOUT;
use crate::domain::{truncate_chars, ExtractItem, ExtractRequest};
use crate::error::Result;
use crate::transport::HttpRequest;

pub const EXTRACT_PATH: &str = "/v1beta/extract";
pub const TOOL_NAME: &str = "parallel_extract";

/// Error type used when the vendor returns nothing at all for a URL
pub const MISSING_RESULT: &str = "missing_result";

const DESCRIPTION: &str = "Extract clean, structured content from web pages. \
    Input should be a list of URLs to extract content from. \
    Returns extracted content formatted as markdown.";

/// Extract tool backed by the vendor extract API
#[derive(Debug, Clone, Serialize)]
pub struct ParallelExtractTool {
    connection: Connection,
    /// Default cap applied when a request does not set its own
    max_chars_per_extract: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    extract_id: Option<String>,
    #[serde(default)]
    results: Vec<ExtractedPage>,
    #[serde(default)]
    errors: Vec<ExtractError>,
}

#[derive(Debug, Deserialize)]
struct ExtractedPage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    full_content: Option<String>,
    #[serde(default)]
    excerpts: Vec<String>,
    #[serde(default)]
    publish_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractError {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    http_status_code: Option<u16>,
}

/// One vendor entry, before it is assigned to an input URL
#[derive(Debug)]
enum VendorEntry {
    Page(ExtractedPage),
    Error(ExtractError),
}

impl VendorEntry {
    fn url(&self) -> Option<&str> {
        match self {
            Self::Page(page) => page.url.as_deref(),
            Self::Error(error) => error.url.as_deref(),
        }
    }

    fn into_item(self, url: &str, max_chars: Option<u32>) -> ExtractItem {
        match self {
            Self::Page(page) => success_item(page, url, max_chars),
            Self::Error(error) => failure_item(error, url),
        }
    }
}

impl ParallelExtractTool {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            max_chars_per_extract: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Connection::from_env()?))
    }

    pub fn with_max_chars(mut self, max_chars: u32) -> Self {
        self.max_chars_per_extract = Some(max_chars);
        self
    }

    pub fn max_chars_per_extract(&self) -> Option<u32> {
        self.max_chars_per_extract
    }

    fn effective_max_chars(&self, request: &ExtractRequest) -> Option<u32> {
        request.max_chars_per_extract.or(self.max_chars_per_extract)
    }

    /// Wire payload for a batch
    pub fn build_payload(urls: &[String], max_chars: Option<u32>) -> Value {
        let full_content = match max_chars {
            Some(max) => json!({ "max_chars_per_result": max }),
            None => json!(true),
        };
        json!({
            "urls": urls,
            "full_content": full_content,
        })
    }

    /// Extract every URL in one call. The output has one item per input
    /// URL, in input order.
    pub async fn extract(&self, request: &ExtractRequest) -> Result<Vec<ExtractItem>> {
        request.validate()?;
        let max_chars = self.effective_max_chars(request);

        let settings = self.connection.settings();
        let http = HttpRequest {
            url: settings.endpoint(EXTRACT_PATH),
            auth: self.connection.api_key_header(),
            body: Self::build_payload(&request.urls, max_chars),
            timeout: settings.timeout_or(DEFAULT_TIMEOUT),
            stream: false,
        };

        let value = self.connection.transport().post_json(http).await?;
        let response: ExtractResponse = serde_json::from_value(value)?;

        let items = align_to_input(&request.urls, response.results, response.errors, max_chars);
        let failed = items.iter().filter(|i| !i.is_success()).count();
        info!(
            extract_id = response.extract_id.as_deref().unwrap_or("-"),
            urls = request.urls.len(),
            failed,
            "extract completed"
        );

        Ok(items)
    }

    pub async fn extract_urls<I, S>(&self, urls: I) -> Result<Vec<ExtractItem>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extract(&ExtractRequest::new(urls)).await
    }

    pub fn extract_blocking(&self, request: &ExtractRequest) -> Result<Vec<ExtractItem>> {
        blocking::run(self.extract(request))
    }

    /// Blocking form of [`Tool::call`]
    pub fn call_blocking(&self, args: Value) -> Result<Value> {
        blocking::run(self.call(args))
    }
}

#[async_trait]
impl Tool for ParallelExtractTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "description": "List of URLs to extract content from",
                },
                "max_chars_per_extract": {"type": "integer", "minimum": 1},
            },
            "required": ["urls"],
        })
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let request: ExtractRequest = parse_args(args)?;
        let items = self.extract(&request).await?;
        Ok(serde_json::to_value(items)?)
    }
}

fn url_key(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

/// Re-order vendor results and errors to match the requested URLs.
///
/// Entries are first matched by URL; duplicated input URLs consume them in
/// order. Entries whose URL is absent or differs from every request (the
/// vendor may report a redirect target or a normalised form) then fill the
/// remaining slots in vendor order, results before errors.
fn align_to_input(
    urls: &[String],
    results: Vec<ExtractedPage>,
    errors: Vec<ExtractError>,
    max_chars: Option<u32>,
) -> Vec<ExtractItem> {
    let entries: Vec<VendorEntry> = results
        .into_iter()
        .map(VendorEntry::Page)
        .chain(errors.into_iter().map(VendorEntry::Error))
        .collect();

    let mut slots: Vec<Option<usize>> = {
        let mut by_url: HashMap<&str, VecDeque<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if let Some(key) = entry.url().map(url_key).filter(|k| !k.is_empty()) {
                by_url.entry(key).or_default().push_back(idx);
            }
        }

        urls.iter()
            .map(|url| by_url.get_mut(url_key(url)).and_then(VecDeque::pop_front))
            .collect()
    };

    let mut taken = vec![false; entries.len()];
    for idx in slots.iter().flatten() {
        taken[*idx] = true;
    }

    let mut leftovers = (0..entries.len()).filter(|idx| !taken[*idx]);
    let mut reassigned = 0;
    for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
        match leftovers.next() {
            Some(idx) => {
                *slot = Some(idx);
                reassigned += 1;
            }
            None => break,
        }
    }

    let unmatched = leftovers.count();
    if reassigned > 0 {
        debug!(reassigned, "vendor entries assigned by position");
    }
    if unmatched > 0 {
        warn!(unmatched, "surplus vendor entries dropped");
    }

    let mut entries: Vec<Option<VendorEntry>> = entries.into_iter().map(Some).collect();
    urls.iter()
        .zip(slots)
        .map(|(url, slot)| match slot.and_then(|idx| entries[idx].take()) {
            Some(entry) => entry.into_item(url, max_chars),
            None => missing_item(url),
        })
        .collect()
}

/// Output items carry the requested URL so callers can pair them with
/// their input
fn success_item(page: ExtractedPage, url: &str, max_chars: Option<u32>) -> ExtractItem {
    let mut content = match page.full_content {
        Some(content) => content,
        None => page.excerpts.join("\n\n"),
    };
    if let Some(max) = max_chars {
        truncate_chars(&mut content, max as usize);
    }

    ExtractItem::Success {
        url: url.to_string(),
        title: page.title,
        content,
        publish_date: page.publish_date,
    }
}

fn failure_item(error: ExtractError, url: &str) -> ExtractItem {
    let error_type = error
        .error_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "unknown_error".to_string());

    let detail = error
        .message
        .filter(|m| !m.is_empty())
        .or(error.content.filter(|c| !c.is_empty()))
        .unwrap_or_else(|| error_type.clone());

    ExtractItem::Failure {
        url: url.to_string(),
        error_type,
        content: format!("Error: {}", detail),
        http_status_code: error.http_status_code,
    }
}

fn missing_item(url: &str) -> ExtractItem {
    ExtractItem::Failure {
        url: url.to_string(),
        error_type: MISSING_RESULT.to_string(),
        content: "Error: no result returned for this URL".to_string(),
        http_status_code: None,
    }
}
