//! Conversation types for the chat adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default vendor chat model
pub const DEFAULT_CHAT_MODEL: &str = "speed";

/// Separator used when adjacent same-role turns are merged
const MERGE_SEPARATOR: &str = "\n";

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Assistant reply from a blocking chat call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub message: Message,

    /// Model name echoed by the vendor (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Why generation stopped (if reported)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Token accounting. The vendor does not report usage, so this is
    /// always `None`; it is never estimated.
    pub usage: Option<Usage>,
}

/// Token usage (reserved; never populated by this adapter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One incremental fragment of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatChunk {
    /// Text delta (may be empty for role-only or final frames)
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Chat request options.
///
/// Only `model` and `response_format` reach the wire. The remaining fields
/// exist so callers written against generic chat-model interfaces can pass
/// them; they are accepted and ignored because the vendor ignores them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Forwarded. Vendor model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Forwarded. Structured output schema (`{"type": "json_schema", ...}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,

    /// Accepted but ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Accepted but ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Accepted but ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Accepted but ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

fn default_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: default_model(),
            response_format: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
        }
    }
}

impl ChatOptions {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Merge runs of adjacent same-role turns into one turn.
///
/// The vendor rejects consecutive messages with the same role. Contents are
/// joined with a newline and the first turn's role is kept; the relative
/// order of everything else is unchanged.
pub fn merge_consecutive(messages: &[Message]) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());

    for message in messages {
        match merged.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str(MERGE_SEPARATOR);
                last.content.push_str(&message.content);
            }
            _ => merged.push(message.clone()),
        }
    }

    merged
}
