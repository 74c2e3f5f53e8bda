//! Session store trait.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::record::SessionRecord;

/// Errors from the durable session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error with path context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error encoding or decoding a record.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed access to the durable key-value store holding session records.
///
/// Absence of a key is a valid, expected state meaning "no session";
/// implementations enforce the idle TTL so an expired record reads as
/// absent. Every write refreshes the TTL.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a record. Returns `Ok(None)` for unknown or expired sessions.
    async fn load(&self, session_id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Persist a record, refreshing its TTL.
    async fn save(&self, record: &SessionRecord) -> StoreResult<()>;

    /// Refresh the record's last-used timestamp and TTL without other
    /// changes. A no-op for unknown sessions.
    async fn touch(&self, session_id: &str) -> StoreResult<()>;

    /// Remove a record. Removing an absent record is not an error.
    async fn delete(&self, session_id: &str) -> StoreResult<()>;
}
