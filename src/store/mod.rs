//! Session store trait — the persistence abstraction behind sessions
//!
//! All session backends (in-memory, files, or anything a host registers
//! as a connector) implement `SessionStore` so the session manager can
//! load, save, and expire sessions without knowing where they live.

use crate::error::{Result, SessionError};
use crate::types::SessionRecord;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Callback invoked when a store loses its backend connection
pub type DisconnectHandler = Arc<dyn Fn(&SessionError) + Send + Sync>;

/// Core trait for session backends
///
/// Implementations own their consistency guarantees. The session layer
/// never retries a failed operation on a store's behalf.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session record, `None` if unknown or expired
    async fn get(&self, sid: &str) -> Result<Option<SessionRecord>>;

    /// Insert or replace a session record
    async fn set(&self, sid: &str, record: &SessionRecord) -> Result<()>;

    /// Remove a session record (no-op if absent)
    async fn destroy(&self, sid: &str) -> Result<()>;

    /// Number of stored sessions
    async fn length(&self) -> Result<usize>;

    /// Remove every stored session
    async fn clear(&self) -> Result<()>;

    /// Store name (e.g., "memory", "file")
    fn name(&self) -> &str;

    /// Refresh a session's expiry without rewriting unchanged data
    ///
    /// Default implementation rewrites the whole record via `set()`.
    async fn touch(&self, sid: &str, record: &SessionRecord) -> Result<()> {
        self.set(sid, record).await
    }

    /// Health check — returns true if the store is operational
    ///
    /// Default implementation delegates to `length()`.
    async fn health(&self) -> Result<bool> {
        self.length().await.map(|_| true)
    }

    /// Register a callback for backend disconnects
    ///
    /// Default implementation ignores the handler; stores without a
    /// remote backend never disconnect.
    fn on_disconnect(&self, _handler: DisconnectHandler) {}
}

/// Registered disconnect callbacks for a store
///
/// Stores embed this and call `notify` when their backend goes away.
#[derive(Default)]
pub struct DisconnectListeners {
    handlers: RwLock<Vec<DisconnectHandler>>,
}

impl DisconnectListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler
    pub fn register(&self, handler: DisconnectHandler) {
        match self.handlers.write() {
            Ok(mut handlers) => handlers.push(handler),
            Err(e) => tracing::warn!(error = %e, "Disconnect listener lock poisoned"),
        }
    }

    /// Invoke every registered handler with `err`
    pub fn notify(&self, err: &SessionError) {
        let handlers = match self.handlers.read() {
            Ok(handlers) => handlers.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Disconnect listener lock poisoned");
                return;
            }
        };

        for handler in handlers {
            handler(err);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store status information
#[derive(Debug, Clone)]
pub struct StoreInfo {
    /// Store name
    pub store: String,
    /// Number of stored sessions
    pub sessions: usize,
    /// Result of the last health check
    pub healthy: bool,
}

impl StoreInfo {
    /// Collect status from a store
    pub async fn collect(store: &dyn SessionStore) -> Result<Self> {
        Ok(Self {
            store: store.name().to_string(),
            sessions: store.length().await?,
            healthy: store.health().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_listeners_notify_all() {
        let listeners = DisconnectListeners::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            listeners.register(Arc::new(move |_err| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(listeners.len(), 3);
        listeners.notify(&SessionError::store("redis", "connection reset"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listeners_empty_notify_is_noop() {
        let listeners = DisconnectListeners::new();
        assert!(listeners.is_empty());
        listeners.notify(&SessionError::store("memory", "gone"));
    }

    #[tokio::test]
    async fn test_store_info_collect() {
        let store = MemoryStore::new();
        store.set("a", &SessionRecord::default()).await.unwrap();

        let info = StoreInfo::collect(&store).await.unwrap();
        assert_eq!(info.store, "memory");
        assert_eq!(info.sessions, 1);
        assert!(info.healthy);
    }
}
