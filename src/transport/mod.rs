//! HTTP transport seam.
//!
//! Adapters build an [`HttpRequest`] and hand it to an [`HttpTransport`].
//! The production implementation is [`ReqwestTransport`]; tests substitute
//! their own implementation to script vendor responses and count calls.

pub mod http;
pub mod retry;
pub mod sse;

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use crate::credentials::ApiKey;
use crate::error::Result;

pub use http::ReqwestTransport;
pub use retry::RetryPolicy;

/// Raw response body chunks, in arrival order
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// How the API key is attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <key>`
    Bearer(ApiKey),
    /// `<name>: <key>`
    Header { name: &'static str, key: ApiKey },
}

impl Auth {
    pub fn key(&self) -> &ApiKey {
        match self {
            Self::Bearer(key) | Self::Header { key, .. } => key,
        }
    }
}

/// A single outbound JSON POST
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub auth: Auth,
    pub body: Value,
    /// Whole-request deadline (connect + read)
    pub timeout: Duration,
    /// Ask for a server-sent event stream
    pub stream: bool,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Body is omitted: it carries user content
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

/// Sends requests to the vendor. Implementations own retry and timeout
/// handling; callers see one result per logical request.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// POST and decode a JSON response body
    async fn post_json(&self, request: HttpRequest) -> Result<Value>;

    /// POST and return the response body as it arrives.
    ///
    /// Dropping the returned stream closes the connection.
    async fn post_stream(&self, request: HttpRequest) -> Result<ByteStream>;
}

/// Join a base URL and a path without doubling or dropping slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
