//! The durable session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mcp::{ConnectParams, ToolSpec};

/// Session metadata persisted in the durable store.
///
/// Logically owned by the conversation initiator, physically owned by the
/// store; no process holds an exclusive reference. Field updates are
/// monotonic and idempotent (last-used timestamp, transport id), so
/// concurrent turns on the same session race harmlessly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    /// Connection parameters the transport was (and can be) built from.
    pub connect: ConnectParams,
    /// Provider-assigned transport id of the most recent connect.
    #[serde(default)]
    pub transport_id: Option<String>,
    /// Tool catalog captured at connect time.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Model reference, not the raw secret.
    pub model: Option<String>,
    pub system_prompt: String,
    /// State blob of the sequential reasoning tool, if used.
    #[serde(default)]
    pub reasoning_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Refresh the last-used timestamp.
    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }
}
