//! Process-local transport registry.

use std::sync::Arc;

use dashmap::DashMap;

use super::client::ToolTransport;

/// Table of live transports keyed by session id.
///
/// Authoritative only for the process that created a handle: after a
/// restart the table is empty and the resolver repairs the gap by
/// reconnecting from stored parameters. No cross-process coordination is
/// attempted. Thread-safe and cheap to clone.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: Arc<DashMap<String, Arc<dyn ToolTransport>>>,
}

impl TransportRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the live transport for a session, if this process owns one.
    pub fn get(&self, session_id: &str) -> Option<Arc<dyn ToolTransport>> {
        self.transports.get(session_id).map(|t| t.clone())
    }

    /// Register a transport created by connect or reconnect.
    pub fn insert(&self, session_id: &str, transport: Arc<dyn ToolTransport>) {
        self.transports.insert(session_id.to_string(), transport);
    }

    /// Drop the transport on session teardown.
    pub fn remove(&self, session_id: &str) {
        self.transports.remove(session_id);
    }
}
