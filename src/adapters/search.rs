//! Web search tool.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{parse_args, Connection, Tool};
use crate::blocking;
use crate::domain::search::{MAX_OBJECTIVE_CHARS, MAX_QUERY_CHARS, MAX_SEARCH_QUERIES};
use crate::domain::{SearchMetadata, SearchRequest, SearchResponse};
use crate::error::Result;
use crate::transport::HttpRequest;

pub const SEARCH_PATH: &str = "/v1beta/search";
pub const TOOL_NAME: &str = "parallel_web_search";

const DESCRIPTION: &str = "Search the web using Parallel AI. Provide either a natural-language \
    objective or up to 5 keyword queries. Returns ranked results with URLs, titles and \
    relevant excerpts.";

/// Search tool backed by the vendor search API
#[derive(Debug, Clone, Serialize)]
pub struct ParallelSearchTool {
    connection: Connection,
}

/// Tool-call arguments: the request plus output options
#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(flatten)]
    request: SearchRequest,
    /// Attach `search_metadata` to the output
    #[serde(default)]
    include_metadata: bool,
}

impl ParallelSearchTool {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Connection::from_env()?))
    }

    /// Wire payload for a validated request
    pub fn build_payload(request: &SearchRequest) -> Value {
        let mut payload = json!({
            "processor": request.processor,
            "max_results": request.max_results,
            "max_chars_per_result": request.max_chars_per_result,
        });

        if let Some(objective) = request.effective_objective() {
            payload["objective"] = json!(objective);
        }
        if let Some(queries) = request.effective_queries() {
            payload["search_queries"] = json!(queries);
        }
        if let Some(policy) = request.source_policy.as_ref().filter(|p| !p.is_empty()) {
            payload["source_policy"] = json!(policy);
        }

        payload
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.search_with_metadata(request)
            .await
            .map(|(response, _)| response)
    }

    /// Search and also return per-call metadata.
    ///
    /// Validation runs first; an invalid request never reaches the network.
    pub async fn search_with_metadata(
        &self,
        request: &SearchRequest,
    ) -> Result<(SearchResponse, SearchMetadata)> {
        request.validate()?;

        let settings = self.connection.settings();
        let http = HttpRequest {
            url: settings.endpoint(SEARCH_PATH),
            auth: self.connection.api_key_header(),
            body: Self::build_payload(request),
            timeout: settings.timeout_or(request.processor.default_timeout()),
            stream: false,
        };

        let started = Instant::now();
        let value = self.connection.transport().post_json(http).await?;
        let response: SearchResponse = serde_json::from_value(value)?;

        let metadata = SearchMetadata::new(request, response.results.len(), started.elapsed());

        info!(
            search_id = %response.search_id,
            processor = %metadata.processor_used,
            results = metadata.result_count,
            duration_ms = (metadata.search_duration_seconds * 1000.0) as u64,
            "search completed"
        );

        Ok((response, metadata))
    }

    pub fn search_blocking(&self, request: &SearchRequest) -> Result<SearchResponse> {
        blocking::run(self.search(request))
    }

    /// Blocking form of [`Tool::call`]
    pub fn call_blocking(&self, args: Value) -> Result<Value> {
        blocking::run(self.call(args))
    }
}

#[async_trait]
impl Tool for ParallelSearchTool {
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
                "objective": {
                    "type": "string",
                    "description": "Natural-language description of what to find.",
                    "maxLength": MAX_OBJECTIVE_CHARS,
                },
                "search_queries": {
                    "type": "array",
                    "items": {"type": "string", "maxLength": MAX_QUERY_CHARS},
                    "maxItems": MAX_SEARCH_QUERIES,
                    "description": "Keyword queries. Use instead of objective.",
                },
                "processor": {
                    "type": "string",
                    "enum": ["base", "pro"],
                    "default": "base",
                },
                "max_results": {"type": "integer", "minimum": 1, "maximum": 40, "default": 10},
                "max_chars_per_result": {"type": "integer", "minimum": 100, "default": 1500},
                "source_policy": {
                    "type": "object",
                    "properties": {
                        "include_domains": {"type": "array", "items": {"type": "string"}},
                        "exclude_domains": {"type": "array", "items": {"type": "string"}},
                    },
                },
                "include_metadata": {"type": "boolean", "default": false},
            },
        })
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let args: SearchArgs = parse_args(args)?;
        let (response, metadata) = self.search_with_metadata(&args.request).await?;

        let mut output = serde_json::to_value(response)?;
        if args.include_metadata {
            output["search_metadata"] = serde_json::to_value(metadata)?;
        }
        Ok(output)
    }
}
