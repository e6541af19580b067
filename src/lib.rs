//! parallel-web - Parallel AI adapters for LLM orchestration frameworks
//!
//! Exposes three vendor operations behind framework-style interfaces:
//! - chat completions as a [`ChatModel`] (blocking, async, streaming)
//! - web search as a [`Tool`]
//! - batch page extraction as a [`Tool`]
//!
//! # Modules
//!
//! - `adapters`: ChatModel/Tool traits and the three vendor adapters
//! - `transport`: HTTP transport seam, retries and SSE decoding
//! - `domain`: request and response types
//! - `credentials`: API key resolution
//! - `config`: client settings and CLI config file
//! - `blocking`: synchronous wrappers over the async API
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! export PARALLEL_AI_API_KEY=...
//! parallel-web chat "What is 2+2?"
//! parallel-web search --objective "renewable energy policy 2024" --max-results 5
//! parallel-web extract https://example.com
//! ```

pub mod adapters;
pub mod blocking;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod transport;

// Re-export main types at crate root for convenience
pub use adapters::{
    ChatModel, ChatStream, Connection, ConnectionBuilder, ParallelChat, ParallelExtractTool,
    ParallelSearchTool, Tool, ToolSpec,
};
pub use blocking::BlockingStream;
pub use config::ClientSettings;
pub use credentials::{ApiKey, API_KEY_ENV};
pub use domain::{
    ChatChunk, ChatOptions, ChatResponse, ExtractItem, ExtractRequest, Message, Processor, Role,
    SearchMetadata, SearchRequest, SearchResponse, SearchResult, SourcePolicy,
};
pub use error::{Error, Result};
pub use transport::{HttpRequest, HttpTransport, ReqwestTransport};
