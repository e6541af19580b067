//! Chat completions adapter.
//!
//! Speaks the vendor's OpenAI-compatible `/chat/completions` endpoint.
//! Adjacent same-role turns are merged before sending, generic sampling
//! parameters are dropped, and usage metadata is never reported.

use std::time::Instant;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ChatModel, ChatStream, Connection};
use crate::blocking::{self, BlockingStream};
use crate::config::DEFAULT_TIMEOUT;
use crate::domain::{merge_consecutive, ChatChunk, ChatOptions, ChatResponse, Message};
use crate::error::{Error, Result};
use crate::transport::sse::{self, DataStream};
use crate::transport::HttpRequest;

pub const CHAT_PATH: &str = "/chat/completions";

/// Adapter type name reported to the framework
pub const LLM_TYPE: &str = "parallel-chat";

/// Terminal SSE payload
const DONE_MARKER: &str = "[DONE]";

/// Chat model backed by the vendor chat API
#[derive(Debug, Clone, Serialize)]
pub struct ParallelChat {
    connection: Connection,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ParallelChat {
    pub fn new(connection: Connection, options: ChatOptions) -> Self {
        Self {
            connection,
            options,
        }
    }

    /// Default model, key from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Connection::from_env()?, ChatOptions::default()))
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Build the wire payload. Only model, merged messages, the stream flag
    /// and the response format are sent.
    pub fn build_payload(&self, messages: &[Message], stream: bool) -> Result<Value> {
        if messages.is_empty() {
            return Err(Error::validation("At least one message is required"));
        }
        if self.options.model.trim().is_empty() {
            return Err(Error::validation("model must not be empty"));
        }

        let merged = merge_consecutive(messages);
        let mut body = json!({
            "model": self.options.model,
            "messages": merged,
            "stream": stream,
        });

        if let Some(format) = &self.options.response_format {
            body["response_format"] = format.clone();
        }

        Ok(body)
    }

    fn request(&self, body: Value, stream: bool) -> HttpRequest {
        let settings = self.connection.settings();
        HttpRequest {
            url: settings.endpoint(CHAT_PATH),
            auth: self.connection.bearer(),
            body,
            timeout: settings.timeout_or(DEFAULT_TIMEOUT),
            stream,
        }
    }

    /// Blocking form of [`ChatModel::invoke`]
    pub fn invoke_blocking(&self, messages: &[Message]) -> Result<ChatResponse> {
        blocking::run(self.invoke(messages))
    }

    /// Blocking form of [`ChatModel::stream`]. Dropping the iterator closes
    /// the connection.
    pub fn stream_blocking(&self, messages: &[Message]) -> Result<BlockingStream<ChatChunk>> {
        let stream = blocking::run(self.stream(messages))?;
        BlockingStream::new(stream)
    }
}

#[async_trait]
impl ChatModel for ParallelChat {
    fn llm_type(&self) -> &str {
        LLM_TYPE
    }

    fn identifying_params(&self) -> Value {
        json!({
            "model": self.options.model,
            "base_url": self.connection.settings().base_url,
        })
    }

    async fn invoke(&self, messages: &[Message]) -> Result<ChatResponse> {
        let body = self.build_payload(messages, false)?;
        let started = Instant::now();
        debug!(model = %self.options.model, messages = messages.len(), "chat request");

        let value = self
            .connection
            .transport()
            .post_json(self.request(body, false))
            .await?;

        let response: CompletionResponse = serde_json::from_value(value)?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Decode("chat response contained no choices".to_string()))?;

        info!(
            model = %self.options.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completed"
        );

        Ok(ChatResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            model: response.model,
            finish_reason: choice.finish_reason,
            usage: None,
        })
    }

    async fn stream(&self, messages: &[Message]) -> Result<ChatStream> {
        let body = self.build_payload(messages, true)?;
        debug!(model = %self.options.model, messages = messages.len(), "chat stream request");

        let bytes = self
            .connection
            .transport()
            .post_stream(self.request(body, true))
            .await?;

        Ok(chunk_stream(sse::data_events(bytes)))
    }
}

/// Map SSE payloads to reply fragments, stopping at the end marker.
///
/// The event stream is dropped as soon as the marker, an error, or the end
/// of the body is reached.
fn chunk_stream(events: DataStream) -> ChatStream {
    let chunks = stream::unfold(Some(events), |state| async move {
        let mut events = state?;
        loop {
            match events.next().await {
                None => return None,
                Some(Err(err)) => return Some((Err(err), None)),
                Some(Ok(data)) => {
                    let data = data.trim();
                    if data == DONE_MARKER {
                        return None;
                    }
                    match parse_chunk(data) {
                        Ok(Some(chunk)) => return Some((Ok(chunk), Some(events))),
                        Ok(None) => continue,
                        Err(err) => return Some((Err(err), None)),
                    }
                }
            }
        }
    });

    Box::pin(chunks)
}

/// Decode one streamed payload. Frames with neither text nor a finish
/// reason (role announcements, keep-alives) yield `None`.
fn parse_chunk(data: &str) -> Result<Option<ChatChunk>> {
    let chunk: CompletionChunk = serde_json::from_str(data)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    let content = choice.delta.content.unwrap_or_default();
    if content.is_empty() && choice.finish_reason.is_none() {
        return Ok(None);
    }

    Ok(Some(ChatChunk {
        content,
        finish_reason: choice.finish_reason,
    }))
}
