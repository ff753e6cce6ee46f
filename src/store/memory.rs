//! In-memory session store
//!
//! Default store for development, tests, and single-process deployments.
//! Sessions are lost when the process exits.

use super::{DisconnectHandler, DisconnectListeners, SessionStore};
use crate::error::{Result, SessionError};
use crate::types::SessionRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory session store
///
/// Expired records are treated as absent and pruned when read.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    listeners: DisconnectListeners,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify disconnect handlers as if the backend went away
    ///
    /// The memory store keeps working afterwards; this exists so hosts
    /// can exercise their disconnect handling.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let err = SessionError::store("memory", reason);
        tracing::debug!(error = %err, "Memory store disconnect signalled");
        self.listeners.notify(&err);
    }

    /// Remove every expired record, returning how many were dropped
    pub async fn prune_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired());
        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, sid: &str) -> Result<Option<SessionRecord>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(sid) {
                None => return Ok(None),
                Some(record) if !record.is_expired() => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; a writer may have replaced the record.
        let mut sessions = self.sessions.write().await;
        match sessions.get(sid) {
            Some(record) if !record.is_expired() => Ok(Some(record.clone())),
            Some(_) => {
                sessions.remove(sid);
                tracing::debug!(sid = %sid, "Expired session pruned");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, sid: &str, record: &SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(sid.to_string(), record.clone());
        Ok(())
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(sid);
        Ok(())
    }

    async fn length(&self) -> Result<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions.len())
    }

    async fn clear(&self) -> Result<()> {
        self.sessions.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn touch(&self, sid: &str, record: &SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get_mut(sid) {
            existing.cookie = record.cookie.clone();
        }
        Ok(())
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        self.listeners.register(handler);
    }
}
