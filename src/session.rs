//! Per-request session object and request context
//!
//! `Session` is the provider-owned session: an id, its variables, and
//! cookie state. Handlers normally reach it through `ScopedSession`,
//! which applies broker isolation.

use crate::scope::{Decoration, ScopedSession};
use crate::types::{Broker, CookieMeta, CookieOptions, SessionData, SessionRecord};

/// Generate a fresh session id
pub fn generate_sid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Lifecycle requests recorded during a request and applied on commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Intents {
    pub destroy: bool,
    pub regenerate: bool,
    pub save: bool,
}

/// A session loaded for the current request
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: SessionData,
    cookie: CookieMeta,
    is_new: bool,
    /// Data as loaded, for modification detection
    loaded: SessionData,
    decoration: Option<Decoration>,
    intents: Intents,
}

impl Session {
    /// Start a brand-new session
    pub fn new(cookie: &CookieOptions) -> Self {
        Self {
            id: generate_sid(),
            data: SessionData::new(),
            cookie: CookieMeta::new(cookie),
            is_new: true,
            loaded: SessionData::new(),
            decoration: None,
            intents: Intents::default(),
        }
    }

    /// Rebuild a session from its stored record
    pub fn from_record(id: impl Into<String>, record: SessionRecord) -> Self {
        Self {
            id: id.into(),
            loaded: record.data.clone(),
            data: record.data,
            cookie: record.cookie,
            is_new: false,
            decoration: None,
            intents: Intents::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw session variables, including the isolated container
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    pub fn cookie(&self) -> &CookieMeta {
        &self.cookie
    }

    /// Created during this request rather than loaded from a store
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Data differs from what was loaded
    pub fn is_modified(&self) -> bool {
        self.data != self.loaded
    }

    /// Persisted form of this session
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            cookie: self.cookie.clone(),
            data: self.data.clone(),
        }
    }

    /// Attach the accessor decoration
    ///
    /// Returns `false` and leaves the existing decoration in place if the
    /// session is already decorated.
    pub fn decorate(&mut self, decoration: Decoration) -> bool {
        if self.decoration.is_some() {
            return false;
        }
        self.decoration = Some(decoration);
        true
    }

    pub fn decoration(&self) -> Option<&Decoration> {
        self.decoration.as_ref()
    }

    pub fn is_decorated(&self) -> bool {
        self.decoration.is_some()
    }

    /// Refresh the cookie expiry
    pub fn touch(&mut self) {
        self.cookie.touch();
    }

    /// Remove this session from the store on commit
    pub fn destroy(&mut self) {
        self.intents.destroy = true;
    }

    /// Move this session's data to a new id on commit
    pub fn regenerate(&mut self) {
        self.intents.regenerate = true;
    }

    /// Save on commit even if unmodified
    pub fn save(&mut self) {
        self.intents.save = true;
    }

    pub(crate) fn intents(&self) -> Intents {
        self.intents
    }

    /// Swap in a new id, returning the old one
    pub(crate) fn rotate_id(&mut self) -> String {
        std::mem::replace(&mut self.id, generate_sid())
    }

    /// Replace data with a freshly loaded record
    pub(crate) fn reset_from(&mut self, record: SessionRecord) {
        self.loaded = record.data.clone();
        self.data = record.data;
        self.cookie = record.cookie;
    }

    /// Record that the current state is what the store holds
    pub(crate) fn mark_persisted(&mut self) {
        self.loaded = self.data.clone();
        self.is_new = false;
        self.intents = Intents::default();
    }
}

/// Request context seen by the session layer
///
/// The host fills in the broker and the incoming session id; the layer
/// fills in the session.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    broker: Option<Broker>,
    session_id: Option<String>,
    session: Option<Session>,
}

impl SessionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the broker this request targets
    pub fn with_broker(mut self, broker: Broker) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Attach the session id presented by the client
    pub fn with_session_id(mut self, sid: impl Into<String>) -> Self {
        self.session_id = Some(sid.into());
        self
    }

    pub fn broker(&self) -> Option<&Broker> {
        self.broker.as_ref()
    }

    pub fn set_broker(&mut self, broker: Option<Broker>) {
        self.broker = broker;
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn set_session_id(&mut self, sid: String) {
        self.session_id = Some(sid);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Unset the session; the configured unset policy applies on commit
    pub fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }

    /// Session accessors scoped to this request's broker
    ///
    /// `None` until a session layer has handled the request.
    pub fn scoped(&mut self) -> Option<ScopedSession<'_>> {
        let broker = self.broker.as_ref();
        let session = self.session.as_mut()?;
        ScopedSession::new(session, broker)
    }
}
