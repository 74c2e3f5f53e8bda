//! Outbound turn events and tool lifecycle state.
//!
//! Every significant internal occurrence maps to exactly one event kind;
//! the multiplexer serializes these as named SSE frames, each
//! independently parseable.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tool invocation.
///
/// Severity is monotonic: once a call reaches `Success` or `Error`, a
/// later `Running` notification for the same logical call never reverts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRunStatus {
    Running,
    Success,
    Error,
}

impl ToolRunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// A snapshot of one tool invocation's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStateFrame {
    /// Provider-assigned call id; the primary de-duplication key.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub status: ToolRunStatus,
    /// Display string captured regardless of status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ToolStateFrame {
    #[must_use]
    pub fn running(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            status: ToolRunStatus::Running,
            result: None,
        }
    }

    /// Move this frame to a terminal state with its captured result.
    #[must_use]
    pub fn finished(mut self, success: bool, result: impl Into<String>) -> Self {
        self.status = if success {
            ToolRunStatus::Success
        } else {
            ToolRunStatus::Error
        };
        self.result = Some(result.into());
        self
    }
}

/// One outbound frame on the turn stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Incremental reply text.
    Content { text: String },
    /// Human-readable progress note, non-fatal.
    Status { message: String },
    /// Single or batched tool lifecycle snapshot.
    ToolState { tools: Vec<ToolStateFrame> },
    /// Boundary marker: the consumer starts a fresh display unit.
    NewTurn,
    /// Terminal or recoverable failure description.
    Error { message: String },
    /// Explicit end-of-stream signal.
    Done { session_id: Option<String> },
}

impl TurnEvent {
    /// SSE event name for this frame.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::Status { .. } => "status",
            Self::ToolState { .. } => "tool_state",
            Self::NewTurn => "new_turn",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }
}
