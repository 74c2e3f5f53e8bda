//! Tool-call aggregation and authoritative reconciliation.
//!
//! Streaming deltas reliably carry call ids and names, but their
//! argument fragments routinely interleave or arrive malformed across
//! providers. The first streaming pass therefore only queues
//! provisional entries; a single non-streaming re-ask of the same model
//! with the same history supplies the authoritative argument payloads,
//! which are reconciled into the queue by call id.

use serde_json::{json, Value};
use tracing::debug;

use crate::llm::{ChatRequest, LlmError, Message, ModelProvider, ToolCall, ToolDefinition};

use super::json_repair::repair_json;

/// A tool call observed during the streaming pass, before arguments are
/// known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalCall {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Accumulates provisional calls from streamed deltas, keyed by the
/// provider-assigned index within the response.
#[derive(Debug, Default)]
pub struct ProvisionalQueue {
    calls: Vec<ProvisionalCall>,
}

impl ProvisionalQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one streamed delta. The first delta for an index creates
    /// the entry; later deltas fill in id and name if still missing.
    /// Argument fragments are deliberately not collected here.
    pub fn observe(&mut self, index: usize, id: Option<String>, name: Option<String>) {
        if let Some(entry) = self.calls.iter_mut().find(|c| c.index == index) {
            if entry.id.is_none() {
                entry.id = id;
            }
            if entry.name.is_none() {
                entry.name = name;
            }
        } else {
            self.calls.push(ProvisionalCall { index, id, name });
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[ProvisionalCall] {
        &self.calls
    }
}

/// A fully-reconciled tool call ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl QueuedCall {
    /// The wire form of this call for an assistant history message.
    #[must_use]
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::function(&self.id, &self.name, self.arguments.to_string())
    }
}

/// Parse a raw argument string from the model.
///
/// Empty input becomes an empty object. Invalid JSON gets one repair
/// attempt; if that also fails, the raw text is preserved under a
/// `raw_arguments` key so the tool sees something rather than nothing.
#[must_use]
pub fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return json!({});
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    let repaired = repair_json(trimmed);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            debug!("repaired malformed tool arguments");
            value
        }
        Err(err) => {
            debug!(error = %err, "tool arguments unparseable after repair, preserving raw text");
            json!({ "raw_arguments": raw })
        }
    }
}

/// Merge the authoritative tool-call list into the provisional queue.
///
/// Matching is by call id: a confirmed provisional entry keeps its
/// position and takes the authoritative name and arguments; authoritative
/// calls with no provisional counterpart are appended; provisional
/// entries the authoritative pass never confirmed are dropped.
#[must_use]
pub fn reconcile(provisional: &ProvisionalQueue, authoritative: &[ToolCall]) -> Vec<QueuedCall> {
    let mut queue = Vec::with_capacity(authoritative.len());
    let mut claimed = vec![false; authoritative.len()];

    for entry in provisional.entries() {
        let matched = entry.id.as_deref().and_then(|id| {
            authoritative
                .iter()
                .enumerate()
                .position(|(pos, call)| !claimed[pos] && call.id == id)
        });
        if let Some(pos) = matched {
            claimed[pos] = true;
            let call = &authoritative[pos];
            queue.push(QueuedCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: parse_arguments(&call.function.arguments),
            });
        } else if let Some(id) = &entry.id {
            debug!(call_id = %id, "provisional tool call not confirmed, discarding");
        }
    }

    for (pos, call) in authoritative.iter().enumerate() {
        if !claimed[pos] {
            queue.push(QueuedCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: parse_arguments(&call.function.arguments),
            });
        }
    }

    queue
}

/// Issue the authoritative non-streaming call and reconcile its tool
/// calls into the provisional queue.
pub async fn authoritative_pass(
    provider: &dyn ModelProvider,
    model: &str,
    temperature: Option<f32>,
    messages: Vec<Message>,
    tools: Vec<ToolDefinition>,
    provisional: &ProvisionalQueue,
) -> Result<Vec<QueuedCall>, LlmError> {
    let request = ChatRequest::with_tools(model, messages, temperature, tools);
    let response = provider.chat(request).await?;
    Ok(reconcile(provisional, response.tool_calls()))
}
