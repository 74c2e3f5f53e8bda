//! Session resolution: stateless, tool-mode, reconnect, and provisioning.
//!
//! The resolver bridges the durable session record (which survives process
//! restarts) and the process-local transport registry (which does not).
//! Its central job is detecting a stale transport and repairing it from
//! stored connection parameters, or degrading to stateless mode —
//! explicitly, never silently.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::api::{ActorMeta, TurnRequest, SESSION_ID_PREFIX};
use crate::mcp::{
    ConnectParams, ProviderError, ToolConnector, ToolSpec, ToolTransport, TransportRegistry,
};

use super::record::SessionRecord;
use super::store::{SessionStore, StoreError};

// ============================================================================
// Types
// ============================================================================

/// How the turn will run.
pub enum TurnMode {
    /// No tools, no durable continuity.
    Stateless,
    /// A live transport and the tool catalog to expose to the model.
    Tools(Arc<dyn ToolTransport>),
}

/// Result of resolving an inbound turn request.
pub struct Resolution {
    /// Session identifier, if any session exists for this conversation.
    pub session_id: Option<String>,
    pub mode: TurnMode,
    /// Catalog cached in the durable record (empty in stateless mode).
    pub tools: Vec<ToolSpec>,
    pub system_prompt: String,
    /// Model reference stored at provisioning time.
    pub model: Option<String>,
    /// Reasoning-tool state from a prior turn, if any.
    pub reasoning_state: Option<serde_json::Value>,
    /// Human-readable notes to surface as status events.
    pub notes: Vec<String>,
}

/// Errors that reject the request before any model call.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid connection parameters: {0}")]
    InvalidParams(String),

    #[error("failed to establish tool session: {0}")]
    Connect(#[source] ProviderError),

    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

const GENERIC_SYSTEM_PROMPT: &str = "You are an assistant helping a team author and refine \
software requirements. Answer precisely and keep replies grounded in the conversation.";

// ============================================================================
// Resolver
// ============================================================================

/// Resolves inbound requests into a live session context.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    transports: TransportRegistry,
    connector: Arc<dyn ToolConnector>,
    /// Bounded reconnect attempts before degrading to stateless.
    reconnect_attempts: u32,
}

impl SessionResolver {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        transports: TransportRegistry,
        connector: Arc<dyn ToolConnector>,
        reconnect_attempts: u32,
    ) -> Self {
        Self {
            store,
            transports,
            connector,
            reconnect_attempts: reconnect_attempts.max(1),
        }
    }

    /// Resolve a turn request into a session context.
    ///
    /// Every successful resolution refreshes the durable record's TTL.
    pub async fn resolve(&self, request: &TurnRequest) -> Result<Resolution, ResolveError> {
        if let Some(ref session_id) = request.session_id {
            if let Some(record) = self.store.load(session_id).await? {
                return self.resolve_existing(record, request).await;
            }
            // Expired or deleted record; a transport still registered
            // under the id would otherwise outlive the session.
            self.transports.remove(session_id);
            debug!(session_id = %session_id, "no durable record for session");
        }

        if let Some(ref connect) = request.connect {
            return self.provision(connect, request).await;
        }

        Ok(stateless(None, request, Vec::new()))
    }

    /// Existing durable record: tool mode, reconnect, or explicit fallback.
    async fn resolve_existing(
        &self,
        mut record: SessionRecord,
        request: &TurnRequest,
    ) -> Result<Resolution, ResolveError> {
        let session_id = record.id.clone();

        if let Some(transport) = self.transports.get(&session_id) {
            record.touch();
            self.store.save(&record).await?;
            return Ok(tool_mode(record, request, transport, Vec::new()));
        }

        // The transport lived in a process that is gone. Only URL-style
        // parameters support re-establishing it.
        if !record.connect.reconnectable() {
            warn!(session_id = %session_id, "command-spawned transport cannot be re-established");
            record.transport_id = None;
            record.touch();
            self.store.save(&record).await?;
            return Ok(stateless(
                Some(session_id),
                request,
                vec!["tool session cannot be re-established; continuing without tools".into()],
            ));
        }

        match self.reconnect(&record.connect).await {
            Ok(connection) => {
                info!(
                    session_id = %session_id,
                    transport_id = %connection.transport.transport_id(),
                    "reconnected to tool provider"
                );
                record.transport_id = Some(connection.transport.transport_id().to_string());
                if !connection.tools.is_empty() {
                    record.tools = connection.tools;
                }
                record.touch();
                self.store.save(&record).await?;
                self.transports.insert(&session_id, connection.transport.clone());
                Ok(tool_mode(
                    record,
                    request,
                    connection.transport,
                    vec!["reconnected to tool provider".into()],
                ))
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "reconnect failed; degrading to stateless");
                record.transport_id = None;
                record.touch();
                self.store.save(&record).await?;
                Ok(stateless(
                    Some(session_id),
                    request,
                    vec!["tool provider unreachable; continuing without tools this turn".into()],
                ))
            }
        }
    }

    /// Bounded reconnect retry loop.
    async fn reconnect(&self, params: &ConnectParams) -> Result<crate::mcp::Connection, ProviderError> {
        let mut last_err = None;
        for attempt in 1..=self.reconnect_attempts {
            match self.connector.connect(params).await {
                Ok(c) => return Ok(c),
                Err(e) => {
                    debug!(attempt, error = %e, "reconnect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::Connect("no attempts made".into())))
    }

    /// First turn with fresh connection parameters: provision a session.
    async fn provision(
        &self,
        connect: &ConnectParams,
        request: &TurnRequest,
    ) -> Result<Resolution, ResolveError> {
        connect
            .validate()
            .map_err(|e| ResolveError::InvalidParams(e.to_string()))?;

        let connection = self
            .connector
            .connect(connect)
            .await
            .map_err(ResolveError::Connect)?;

        if connection.tools.is_empty() {
            return Err(ResolveError::Connect(ProviderError::Connect(
                "provider returned an empty tool catalog".into(),
            )));
        }

        let session_id = format!("{SESSION_ID_PREFIX}{}", Ulid::new());
        let now = chrono::Utc::now();
        let record = SessionRecord {
            id: session_id.clone(),
            connect: connect.clone(),
            transport_id: Some(connection.transport.transport_id().to_string()),
            tools: connection.tools,
            model: request.model.clone(),
            system_prompt: derive_system_prompt(request.actor.as_ref()),
            reasoning_state: request.reasoning_state.clone(),
            created_at: now,
            last_used_at: now,
        };
        self.store.save(&record).await?;
        self.transports.insert(&session_id, connection.transport.clone());

        info!(session_id = %session_id, tools = record.tools.len(), "provisioned tool session");
        Ok(tool_mode(record, request, connection.transport, Vec::new()))
    }

    /// Tear down a session: close the transport and drop the record.
    pub async fn teardown(&self, session_id: &str) -> Result<(), ResolveError> {
        self.transports.remove(session_id);
        self.store.delete(session_id).await?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn tool_mode(
    record: SessionRecord,
    request: &TurnRequest,
    transport: Arc<dyn ToolTransport>,
    notes: Vec<String>,
) -> Resolution {
    Resolution {
        session_id: Some(record.id),
        mode: TurnMode::Tools(transport),
        tools: record.tools,
        system_prompt: record.system_prompt,
        model: request.model.clone().or(record.model),
        reasoning_state: request
            .reasoning_state
            .clone()
            .or(record.reasoning_state),
        notes,
    }
}

fn stateless(session_id: Option<String>, request: &TurnRequest, notes: Vec<String>) -> Resolution {
    Resolution {
        session_id,
        mode: TurnMode::Stateless,
        tools: Vec::new(),
        system_prompt: derive_system_prompt(request.actor.as_ref()),
        model: request.model.clone(),
        reasoning_state: None,
        notes,
    }
}

/// Derive a system prompt from actor metadata, or use the generic default.
fn derive_system_prompt(actor: Option<&ActorMeta>) -> String {
    let Some(actor) = actor else {
        return GENERIC_SYSTEM_PROMPT.to_string();
    };

    let mut prompt = GENERIC_SYSTEM_PROMPT.to_string();
    if let Some(ref name) = actor.name {
        prompt.push_str(&format!(" You are assisting {name}."));
    }
    if let Some(ref role) = actor.role {
        prompt.push_str(&format!(" Their role is: {role}."));
    }
    if let Some(ref responsibilities) = actor.responsibilities {
        prompt.push_str(&format!(" Their responsibilities are: {responsibilities}."));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_prompt_without_actor() {
        assert_eq!(derive_system_prompt(None), GENERIC_SYSTEM_PROMPT);
    }

    #[test]
    fn actor_metadata_folded_into_prompt() {
        let actor = ActorMeta {
            name: Some("Dana".into()),
            role: Some("Product owner".into()),
            responsibilities: Some("backlog grooming".into()),
        };
        let prompt = derive_system_prompt(Some(&actor));
        assert!(prompt.contains("Dana"));
        assert!(prompt.contains("Product owner"));
        assert!(prompt.contains("backlog grooming"));
    }
}
