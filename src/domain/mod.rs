//! Request and response types for the three vendor operations.
//!
//! This module contains the core data structures:
//! - Message: conversation turns and chat options
//! - Search: search requests, results and metadata
//! - Extract: extraction requests and per-URL outcomes

pub mod extract;
pub mod message;
pub mod search;

// Re-export commonly used types
pub use extract::{truncate_chars, ExtractItem, ExtractRequest};
pub use message::{
    merge_consecutive, ChatChunk, ChatOptions, ChatResponse, Message, Role, Usage,
    DEFAULT_CHAT_MODEL,
};
pub use search::{
    Processor, SearchMetadata, SearchRequest, SearchResponse, SearchResult, SourcePolicy,
};
