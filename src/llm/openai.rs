//! OpenAI-compatible model provider.
//!
//! Works against OpenAI, OpenRouter, Ollama, and other compatible APIs.
//! The streaming adapter decodes chunked SSE frames into [`StreamEvent`]s
//! once, at the boundary; downstream code never re-inspects raw payloads.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::LlmError;
use super::provider::ModelProvider;
use super::types::{ChatRequest, ChatResponse, Message, ModelStream, StreamEvent, ToolDefinition};
use crate::sse_decode::SseFrameStream;

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        req
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self.request(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        Ok(response.json().await?)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ModelStream, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let stream_request = StreamRequest {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            tools: request.tools,
            stream: true,
        };

        let response = self.request(&url).json(&stream_request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let frames = SseFrameStream::new(response.bytes_stream());
        Ok(Box::pin(StreamAdapter::new(frames)))
    }
}

#[derive(serde::Serialize)]
struct StreamRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    stream: bool,
}

// ============================================================================
// Streaming Adapter
// ============================================================================

/// Converts assembled SSE frames into typed [`StreamEvent`]s.
///
/// Tool-call deltas are forwarded as-is without accumulating argument
/// fragments; a frame whose payload fails to parse is logged and skipped
/// rather than aborting the stream.
struct StreamAdapter<S> {
    inner: SseFrameStream<S>,
    pending: VecDeque<StreamEvent>,
    done: bool,
    saw_terminal: bool,
}

impl<S> StreamAdapter<S> {
    fn new(inner: SseFrameStream<S>) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            done: false,
            saw_terminal: false,
        }
    }

    /// Decode one frame's payload into zero or more events.
    fn decode_frame(&mut self, data: &str) {
        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(data = %data, error = %e, "skipping malformed stream frame");
                return;
            }
        };

        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };

        // Content and tool deltas are mutually exclusive per frame.
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                self.pending.push_back(StreamEvent::Content(content));
            }
            return;
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                let (name, argument_fragment) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                self.pending.push_back(StreamEvent::ToolCallDelta {
                    index: tc.index,
                    id: tc.id,
                    name,
                    argument_fragment,
                });
            }
        }
    }
}

impl<S, E> Stream for StreamAdapter<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<LlmError>,
{
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    if frame.data.is_empty() {
                        continue;
                    }
                    if frame.data == "[DONE]" {
                        self.done = true;
                        self.saw_terminal = true;
                        return Poll::Ready(Some(Ok(StreamEvent::Done)));
                    }
                    self.decode_frame(&frame.data);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    if !self.saw_terminal {
                        return Poll::Ready(Some(Err(LlmError::Truncated)));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Streaming response chunk.
#[derive(serde::Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(serde::Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(serde::Deserialize, Default)]
#[serde(default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

/// Tool-call fragment within a streaming delta.
#[derive(serde::Deserialize)]
struct StreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(serde::Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
