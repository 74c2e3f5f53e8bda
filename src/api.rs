//! Public API types for the turn endpoint.

use serde::{Deserialize, Serialize};

use crate::mcp::ConnectParams;

/// Prefix for generated session ids.
pub const SESSION_ID_PREFIX: &str = "ses_";

/// An inbound turn request: one user utterance plus optional session and
/// first-time setup data.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    /// Logical session to continue, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// The user message for this turn.
    pub message: String,
    /// Metadata about the acting user, used to derive the system prompt.
    #[serde(default)]
    pub actor: Option<ActorMeta>,
    /// Connection parameters for first-time tool setup.
    #[serde(default)]
    pub connect: Option<ConnectParams>,
    /// Model reference; falls back to the configured default.
    #[serde(default)]
    pub model: Option<String>,
    /// Prior state of the sequential reasoning tool, carried across turns.
    #[serde(default)]
    pub reasoning_state: Option<serde_json::Value>,
}

/// Who is asking, for system-prompt derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub responsibilities: Option<String>,
}
