//! Session provider over a pluggable store
//!
//! `SessionManager` loads the session for a request and writes it back
//! once the request is done. The save rules follow the usual web session
//! middleware options (`resave`, `saveUninitialized`, `unset`,
//! `rolling`).

use crate::error::{Result, SessionError};
use crate::session::{Session, SessionRequest};
use crate::store::SessionStore;
use crate::types::{SessionConfig, UnsetPolicy};
use std::sync::Arc;

/// What commit did with the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAction {
    /// Record written to the store
    Saved,
    /// Only the expiry was refreshed
    Touched,
    /// Record removed from the store
    Destroyed,
    /// Nothing written
    Skipped,
}

/// Result of committing a request's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub action: CommitAction,

    /// Id the client should hold after this response, if any
    pub session_id: Option<String>,

    /// The session id cookie must be (re)sent
    pub set_cookie: bool,
}

impl CommitOutcome {
    fn new(action: CommitAction, session_id: Option<String>, set_cookie: bool) -> Self {
        Self {
            action,
            session_id,
            set_cookie,
        }
    }
}

/// Loads and commits sessions against one store
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Load the session for `sid`, or start a new one
    ///
    /// Unknown, expired, and malformed ids all yield a new session.
    pub async fn load(&self, sid: Option<&str>) -> Result<Session> {
        if let Some(sid) = sid {
            match self.store.get(sid).await {
                Ok(Some(record)) => {
                    tracing::debug!(sid = %sid, store = self.store.name(), "Session loaded");
                    return Ok(Session::from_record(sid, record));
                }
                Ok(None) => {
                    tracing::debug!(sid = %sid, "Session not found, starting a new one");
                }
                Err(SessionError::InvalidSessionId(_)) => {
                    tracing::debug!(sid = %sid, "Malformed session id, starting a new one");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Session::new(&self.config.cookie))
    }

    /// Re-read a session's data from the store
    ///
    /// Returns `false` (and leaves the session untouched) if the store
    /// no longer has it.
    pub async fn reload(&self, session: &mut Session) -> Result<bool> {
        match self.store.get(session.id()).await? {
            Some(record) => {
                session.reset_from(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the request's session back to the store
    pub async fn commit(&self, req: &mut SessionRequest) -> Result<CommitOutcome> {
        let Some(session) = req.session_mut() else {
            return self.commit_unset(req.session_id()).await;
        };

        let intents = session.intents();

        if intents.destroy {
            let sid = session.id().to_string();
            self.store.destroy(&sid).await?;
            req.take_session();
            tracing::debug!(sid = %sid, "Session destroyed");
            return Ok(CommitOutcome::new(CommitAction::Destroyed, None, false));
        }

        if intents.regenerate {
            let old = session.rotate_id();
            if !session.is_new() {
                self.store.destroy(&old).await?;
            }
            session.touch();
            self.store.set(session.id(), &session.to_record()).await?;
            session.mark_persisted();

            let sid = session.id().to_string();
            tracing::debug!(old = %old, sid = %sid, "Session regenerated");
            req.set_session_id(sid.clone());
            return Ok(CommitOutcome::new(CommitAction::Saved, Some(sid), true));
        }

        if self.config.rolling {
            session.touch();
        }

        let was_new = session.is_new();
        let modified = session.is_modified();
        let sid = session.id().to_string();

        if was_new && !modified && !intents.save && !self.config.save_uninitialized {
            return Ok(CommitOutcome::new(CommitAction::Skipped, None, false));
        }

        let action = if was_new || modified || intents.save || self.config.resave {
            self.store.set(&sid, &session.to_record()).await?;
            CommitAction::Saved
        } else {
            self.store.touch(&sid, &session.to_record()).await?;
            CommitAction::Touched
        };
        session.mark_persisted();

        tracing::debug!(sid = %sid, action = ?action, "Session committed");
        req.set_session_id(sid.clone());
        Ok(CommitOutcome::new(
            action,
            Some(sid),
            was_new || self.config.rolling,
        ))
    }

    async fn commit_unset(&self, sid: Option<&str>) -> Result<CommitOutcome> {
        match (self.config.unset, sid) {
            (UnsetPolicy::Destroy, Some(sid)) => {
                self.store.destroy(sid).await?;
                tracing::debug!(sid = %sid, "Unset session destroyed");
                Ok(CommitOutcome::new(CommitAction::Destroyed, None, false))
            }
            (UnsetPolicy::Keep, Some(sid)) => Ok(CommitOutcome::new(
                CommitAction::Skipped,
                Some(sid.to_string()),
                false,
            )),
            (_, None) => Ok(CommitOutcome::new(CommitAction::Skipped, None, false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Decoration;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn manager(config: SessionConfig) -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionManager::new(store.clone(), config), store)
    }

    async fn request_with_new_session(manager: &SessionManager) -> SessionRequest {
        let mut req = SessionRequest::new();
        let mut session = manager.load(None).await.unwrap();
        session.decorate(Decoration::new(false));
        req.set_session(session);
        req
    }

    #[tokio::test]
    async fn test_load_unknown_sid_starts_new() {
        let (manager, _) = manager(SessionConfig::default());
        let session = manager.load(Some("unknown")).await.unwrap();
        assert!(session.is_new());
        assert_ne!(session.id(), "unknown");
    }

    #[tokio::test]
    async fn test_uninitialized_session_skipped() {
        let (manager, store) = manager(SessionConfig::default());
        let mut req = request_with_new_session(&manager).await;

        let outcome = manager.commit(&mut req).await.unwrap();
        assert_eq!(outcome.action, CommitAction::Skipped);
        assert!(!outcome.set_cookie);
        assert_eq!(store.length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_uninitialized() {
        let (manager, store) = manager(SessionConfig::default().with_save_uninitialized(true));
        let mut req = request_with_new_session(&manager).await;

        let outcome = manager.commit(&mut req).await.unwrap();
        assert_eq!(outcome.action, CommitAction::Saved);
        assert!(outcome.set_cookie);
        assert_eq!(store.length().await.unwrap(), 1);
        assert_eq!(req.session_id(), outcome.session_id.as_deref());
    }

    #[tokio::test]
    async fn test_modified_then_touched() {
        let (manager, _) = manager(SessionConfig::default());
        let mut req = request_with_new_session(&manager).await;
        req.scoped().unwrap().set("user", Some(json!("alice")));

        let first = manager.commit(&mut req).await.unwrap();
        assert_eq!(first.action, CommitAction::Saved);
        let sid = first.session_id.unwrap();

        let mut next = SessionRequest::new().with_session_id(sid.clone());
        let mut session = manager.load(Some(sid.as_str())).await.unwrap();
        assert_eq!(session.data()["user"], "alice");
        session.decorate(Decoration::new(false));
        next.set_session(session);

        let second = manager.commit(&mut next).await.unwrap();
        assert_eq!(second.action, CommitAction::Touched);
        assert!(!second.set_cookie);
    }

    #[tokio::test]
    async fn test_resave_saves_unmodified() {
        let (manager, store) = manager(SessionConfig::default().with_resave(true));
        let mut record = crate::types::SessionRecord::default();
        record.data.insert("k".to_string(), json!(1));
        store.set("existing", &record).await.unwrap();

        let mut req = SessionRequest::new().with_session_id("existing");
        req.set_session(manager.load(Some("existing")).await.unwrap());

        let outcome = manager.commit(&mut req).await.unwrap();
        assert_eq!(outcome.action, CommitAction::Saved);
    }

    #[tokio::test]
    async fn test_unset_destroy_and_keep() {
        for (policy, expected_len) in [(UnsetPolicy::Destroy, 0), (UnsetPolicy::Keep, 1)] {
            let (manager, store) = manager(SessionConfig::default().with_unset(policy));
            store
                .set("sid1", &crate::types::SessionRecord::default())
                .await
                .unwrap();

            let mut req = SessionRequest::new().with_session_id("sid1");
            req.set_session(manager.load(Some("sid1")).await.unwrap());
            req.take_session();

            manager.commit(&mut req).await.unwrap();
            assert_eq!(store.length().await.unwrap(), expected_len);
        }
    }

    #[tokio::test]
    async fn test_destroy_intent() {
        let (manager, store) = manager(SessionConfig::default().with_save_uninitialized(true));
        let mut req = request_with_new_session(&manager).await;
        manager.commit(&mut req).await.unwrap();
        assert_eq!(store.length().await.unwrap(), 1);

        req.scoped().unwrap().destroy();
        let outcome = manager.commit(&mut req).await.unwrap();
        assert_eq!(outcome.action, CommitAction::Destroyed);
        assert!(req.session().is_none());
        assert_eq!(store.length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_regenerate_moves_data() {
        let (manager, store) = manager(SessionConfig::default());
        let mut req = request_with_new_session(&manager).await;
        req.scoped().unwrap().set("user", Some(json!("bob")));
        let old = manager.commit(&mut req).await.unwrap().session_id.unwrap();

        req.scoped().unwrap().regenerate();
        let outcome = manager.commit(&mut req).await.unwrap();
        let new = outcome.session_id.unwrap();

        assert_ne!(old, new);
        assert!(outcome.set_cookie);
        assert!(store.get(&old).await.unwrap().is_none());
        assert_eq!(store.get(&new).await.unwrap().unwrap().data["user"], "bob");
    }

    #[tokio::test]
    async fn test_rolling_sets_cookie() {
        let (manager, store) = manager(
            SessionConfig::default()
                .with_rolling(true)
                .with_max_age(60_000),
        );
        store
            .set("sid1", &crate::types::SessionRecord::default())
            .await
            .unwrap();

        let mut req = SessionRequest::new().with_session_id("sid1");
        req.set_session(manager.load(Some("sid1")).await.unwrap());

        let outcome = manager.commit(&mut req).await.unwrap();
        assert_eq!(outcome.action, CommitAction::Touched);
        assert!(outcome.set_cookie);
    }

    #[tokio::test]
    async fn test_reload() {
        let (manager, store) = manager(SessionConfig::default());
        store
            .set("sid1", &crate::types::SessionRecord::default())
            .await
            .unwrap();

        let mut session = manager.load(Some("sid1")).await.unwrap();
        session.decorate(Decoration::new(true));
        session.data_mut().insert("dirty".to_string(), json!(1));

        assert!(manager.reload(&mut session).await.unwrap());
        assert!(session.data().is_empty());
        assert!(session.is_decorated());

        store.destroy("sid1").await.unwrap();
        assert!(!manager.reload(&mut session).await.unwrap());
    }
}
