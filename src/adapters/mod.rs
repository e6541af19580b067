//! Framework-facing adapter interfaces.
//!
//! An orchestrator drives chat models through [`ChatModel`] and the search
//! and extract endpoints through [`Tool`]. Each concrete adapter also offers
//! blocking counterparts for callers outside an async runtime.

pub mod chat;
pub mod connection;
pub mod extract;
pub mod search;

use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientSettings;
use crate::domain::{ChatChunk, ChatResponse, Message};
use crate::error::{Error, Result};
use crate::transport::{HttpTransport, ReqwestTransport};

pub use chat::ParallelChat;
pub use connection::{Connection, ConnectionBuilder};
pub use extract::ParallelExtractTool;
pub use search::ParallelSearchTool;

/// Lazy, single-pass stream of reply fragments
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// Conversational model interface
#[async_trait]
pub trait ChatModel: Send + Sync + Debug {
    /// Adapter type identifier, used in traces
    fn llm_type(&self) -> &str;

    /// Parameters that identify this model configuration (never secrets)
    fn identifying_params(&self) -> Value;

    /// Send the conversation and wait for the full reply
    async fn invoke(&self, messages: &[Message]) -> Result<ChatResponse>;

    /// Send the conversation and receive the reply incrementally
    async fn stream(&self, messages: &[Message]) -> Result<ChatStream>;
}

/// Tool metadata for discovery and schema presentation
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for tool arguments
    pub args_schema: Value,
}

/// Interface for invokable tools
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn args_schema(&self) -> Value;

    /// Invoke the tool with named arguments
    async fn call(&self, args: Value) -> Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            args_schema: self.args_schema(),
        }
    }
}

/// Parse JSON args into a typed struct for tool calls
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|err| Error::Validation(err.to_string()))
}

/// Default transport for the given settings
pub(crate) fn default_transport(settings: &ClientSettings) -> Result<Arc<dyn HttpTransport>> {
    Ok(Arc::new(ReqwestTransport::new(settings.retry_policy())?))
}
