//! Model provider trait.

use async_trait::async_trait;

use super::error::LlmError;
use super::types::{ChatRequest, ChatResponse, ModelStream};

/// Interface to an upstream model completion API.
///
/// `chat` is the single-shot form used for the authoritative tool-call
/// reconciliation pass; `chat_stream` is used for both streaming passes of
/// a turn. Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Non-streaming chat completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Streaming chat completion decoded into typed events.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ModelStream, LlmError>;
}
