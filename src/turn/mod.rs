//! One conversational turn, end to end.
//!
//! The driver runs the two-pass tool-use loop: a streaming pass that
//! forwards content and queues provisional tool calls, an authoritative
//! non-streaming pass that confirms calls and supplies their arguments,
//! sequential tool execution, and a follow-up streaming call over the
//! augmented history. Every externally-visible step is pushed through a
//! bounded channel to the SSE multiplexer.

pub mod aggregate;
pub mod events;
pub mod json_repair;
pub mod sequencer;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::llm::{ChatRequest, LlmError, Message, ModelProvider, Role, StreamEvent, ToolCall};
use crate::mcp::ToolTransport;
use crate::session::{Resolution, SessionStore, TurnMode};

use aggregate::ProvisionalQueue;
pub use events::{ToolRunStatus, ToolStateFrame, TurnEvent};
use sequencer::validate_history;

/// The event receiver was dropped; the client is gone and the turn
/// stops without further work.
#[derive(Debug)]
pub struct TurnAborted;

/// Sending half of the turn event channel.
#[derive(Clone)]
pub struct TurnSender {
    tx: mpsc::Sender<TurnEvent>,
}

impl TurnSender {
    pub fn new(tx: mpsc::Sender<TurnEvent>) -> Self {
        Self { tx }
    }

    async fn send(&self, event: TurnEvent) -> Result<(), TurnAborted> {
        self.tx.send(event).await.map_err(|_| TurnAborted)
    }

    pub async fn content(&self, text: impl Into<String>) -> Result<(), TurnAborted> {
        self.send(TurnEvent::Content { text: text.into() }).await
    }

    pub async fn status(&self, message: impl Into<String>) -> Result<(), TurnAborted> {
        self.send(TurnEvent::Status {
            message: message.into(),
        })
        .await
    }

    pub async fn tool_state(&self, tools: Vec<ToolStateFrame>) -> Result<(), TurnAborted> {
        self.send(TurnEvent::ToolState { tools }).await
    }

    pub async fn new_turn(&self) -> Result<(), TurnAborted> {
        self.send(TurnEvent::NewTurn).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), TurnAborted> {
        self.send(TurnEvent::Error {
            message: message.into(),
        })
        .await
    }

    pub async fn done(&self, session_id: Option<String>) -> Result<(), TurnAborted> {
        self.send(TurnEvent::Done { session_id }).await
    }
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("client disconnected")]
    Aborted,
}

impl From<TurnAborted> for TurnError {
    fn from(_: TurnAborted) -> Self {
        Self::Aborted
    }
}

/// Everything a turn needs, resolved before the stream starts.
pub struct TurnContext {
    pub provider: Arc<dyn ModelProvider>,
    pub model: String,
    pub temperature: Option<f32>,
    pub resolution: Resolution,
    pub store: Arc<dyn SessionStore>,
    pub user_message: String,
}

/// Run one turn to completion under a time ceiling.
///
/// Whatever happens inside, the stream ends with a single `done` frame;
/// failures surface as an `error` frame first. The only exception is a
/// departed client, in which case nothing further is sent.
pub async fn drive_turn(ctx: TurnContext, events: TurnSender, ceiling: Duration) {
    let session_id = ctx.resolution.session_id.clone();

    match tokio::time::timeout(ceiling, run_turn(&ctx, &events)).await {
        Ok(Ok(())) => {}
        Ok(Err(TurnError::Aborted)) => return,
        Ok(Err(err)) => {
            error!(error = %err, "turn failed");
            if events.error(err.to_string()).await.is_err() {
                return;
            }
        }
        Err(_) => {
            warn!(ceiling_secs = ceiling.as_secs(), "turn exceeded time ceiling");
            if events
                .error("turn exceeded the configured time ceiling")
                .await
                .is_err()
            {
                return;
            }
        }
    }

    let _ = events.done(session_id).await;
}

async fn run_turn(ctx: &TurnContext, events: &TurnSender) -> Result<(), TurnError> {
    for note in &ctx.resolution.notes {
        events.status(note).await?;
    }

    let mut history = vec![Message::text(Role::System, &ctx.resolution.system_prompt)];
    if let Some(state) = &ctx.resolution.reasoning_state {
        history.push(Message::text(
            Role::System,
            format!("Reasoning state from the previous turn: {state}"),
        ));
    }
    history.push(Message::text(Role::User, &ctx.user_message));

    match &ctx.resolution.mode {
        TurnMode::Stateless => {
            let request = ChatRequest::new(&ctx.model, history, ctx.temperature);
            stream_content(ctx, events, request).await
        }
        TurnMode::Tools(transport) => run_tool_turn(ctx, events, transport.as_ref(), history).await,
    }
}

/// Streaming call with no tool catalog offered; forwards content only.
async fn stream_content(
    ctx: &TurnContext,
    events: &TurnSender,
    request: ChatRequest,
) -> Result<(), TurnError> {
    let mut stream = ctx.provider.chat_stream(request).await?;
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Content(text) => events.content(text).await?,
            StreamEvent::ToolCallDelta { .. } => {}
            StreamEvent::Done => break,
        }
    }
    Ok(())
}

async fn run_tool_turn(
    ctx: &TurnContext,
    events: &TurnSender,
    transport: &dyn ToolTransport,
    mut history: Vec<Message>,
) -> Result<(), TurnError> {
    let definitions: Vec<_> = ctx
        .resolution
        .tools
        .iter()
        .map(|spec| spec.to_definition())
        .collect();

    // First pass: stream content, queue provisional calls. Argument
    // fragments are dropped here; the authoritative pass supplies them.
    let request = ChatRequest::with_tools(
        &ctx.model,
        history.clone(),
        ctx.temperature,
        definitions.clone(),
    );
    let mut stream = ctx.provider.chat_stream(request).await?;

    let mut provisional = ProvisionalQueue::new();
    let mut streamed_content = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Content(text) => {
                streamed_content.push_str(&text);
                events.content(text).await?;
            }
            StreamEvent::ToolCallDelta { index, id, name, .. } => {
                provisional.observe(index, id, name);
            }
            StreamEvent::Done => break,
        }
    }

    if provisional.is_empty() {
        // Direct answer, no tool round needed.
        return Ok(());
    }

    let queue = match aggregate::authoritative_pass(
        ctx.provider.as_ref(),
        &ctx.model,
        ctx.temperature,
        history.clone(),
        definitions,
        &provisional,
    )
    .await
    {
        Ok(queue) => Some(queue),
        Err(err) => {
            warn!(error = %err, "authoritative tool-call pass failed");
            None
        }
    };

    let assistant_content = if streamed_content.is_empty() {
        None
    } else {
        Some(streamed_content)
    };

    match queue {
        Some(queue) if queue.is_empty() => {
            // Every provisional call was unconfirmed; nothing to run.
            Ok(())
        }
        Some(queue) => {
            let calls: Vec<ToolCall> = queue.iter().map(|c| c.to_tool_call()).collect();
            history.push(Message {
                role: Role::Assistant,
                content: assistant_content,
                tool_calls: Some(calls),
                tool_call_id: None,
                name: None,
            });

            let session_id = ctx.resolution.session_id.as_deref().unwrap_or_default();
            let results = sequencer::run_queue(
                &queue,
                transport,
                &ctx.resolution.tools,
                events,
                &ctx.store,
                session_id,
            )
            .await?;
            history.extend(results);

            follow_up(ctx, events, history).await
        }
        None => {
            events
                .status("could not confirm tool calls with the model; they were not executed")
                .await?;

            let frames: Vec<ToolStateFrame> = provisional
                .entries()
                .iter()
                .filter_map(|entry| {
                    let id = entry.id.clone()?;
                    let name = entry.name.clone().unwrap_or_else(|| "unknown".to_string());
                    Some(ToolStateFrame::running(id, name, json!({})).finished(false, "not executed"))
                })
                .collect();
            if !frames.is_empty() {
                events.tool_state(frames.clone()).await?;

                let calls: Vec<ToolCall> = frames
                    .iter()
                    .map(|f| ToolCall::function(&f.id, &f.name, "{}"))
                    .collect();
                history.push(Message {
                    role: Role::Assistant,
                    content: assistant_content,
                    tool_calls: Some(calls),
                    tool_call_id: None,
                    name: None,
                });
                for frame in &frames {
                    history.push(Message::tool_result(
                        &frame.id,
                        &frame.name,
                        "not executed: tool call confirmation failed",
                    ));
                }
            }

            follow_up(ctx, events, history).await
        }
    }
}

/// Second model round over the augmented history, without tools.
async fn follow_up(
    ctx: &TurnContext,
    events: &TurnSender,
    mut history: Vec<Message>,
) -> Result<(), TurnError> {
    events.new_turn().await?;
    validate_history(&mut history);
    let request = ChatRequest::new(&ctx.model, history, ctx.temperature);
    stream_content(ctx, events, request).await
}
