//! File-backed session store.
//!
//! One JSON document per session under `{sessions_dir}/{id}.json`. The
//! idle TTL is enforced at read time: an expired record is removed and
//! reported as absent. Saves are atomic (write to a temp file, rename).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use super::record::SessionRecord;
use super::store::{SessionStore, StoreError, StoreResult};

/// File-based implementation of [`SessionStore`].
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    sessions_dir: PathBuf,
    ttl: Duration,
}

impl FileSessionStore {
    /// Create a store rooted at `sessions_dir` with the given idle TTL.
    pub fn new(sessions_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            ttl,
        }
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    fn expired(&self, record: &SessionRecord) -> bool {
        let idle = Utc::now().signed_duration_since(record.last_used_at);
        idle.to_std().map_or(false, |idle| idle > self.ttl)
    }

    async fn write_record(&self, record: &SessionRecord) -> StoreResult<()> {
        fs::create_dir_all(&self.sessions_dir)
            .await
            .map_err(|e| StoreError::io(&self.sessions_dir, e))?;

        let path = self.record_path(&record.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let path = self.record_path(session_id);

        let body = match fs::read_to_string(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let record: SessionRecord = match serde_json::from_str(&body) {
            Ok(r) => r,
            Err(e) => {
                // A corrupt record is unrecoverable; treat as absent.
                tracing::warn!(session_id = %session_id, error = %e, "discarding unreadable session record");
                let _ = fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if self.expired(&record) {
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn save(&self, record: &SessionRecord) -> StoreResult<()> {
        self.write_record(record).await
    }

    async fn touch(&self, session_id: &str) -> StoreResult<()> {
        let Some(mut record) = self.load(session_id).await? else {
            return Ok(());
        };
        record.touch();
        self.write_record(&record).await
    }

    async fn delete(&self, session_id: &str) -> StoreResult<()> {
        let path = self.record_path(session_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}
