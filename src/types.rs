//! Core session types for the a3s-session system
//!
//! All serialized types use camelCase JSON for wire compatibility with
//! stores shared across services.

use crate::error::{Result, SessionError};
use crate::store::SessionStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Session variables as stored on a session
pub type SessionData = serde_json::Map<String, serde_json::Value>;

/// Secret used when the configuration does not provide one.
///
/// Development only. Anything signed with it is forgeable.
pub const DEV_FALLBACK_SECRET: &str = "__a3s_session_dev__";

/// Default cookie name carrying the session id
pub const DEFAULT_COOKIE_NAME: &str = "sid";

/// Largest accepted `cookie.maxAge` (400 days, in milliseconds)
pub const MAX_COOKIE_AGE_MS: u64 = 400 * 24 * 60 * 60 * 1000;

/// Upstream backend a request is routed to
///
/// Attached to the request, never to the session. Its alias is the
/// namespace key for isolated session variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Broker {
    /// Unique broker alias (e.g., "sports2000")
    pub alias: String,
}

impl Broker {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

/// What happens to the stored session when a handler unsets it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsetPolicy {
    /// Remove the session from the store
    #[default]
    Destroy,
    /// Leave the stored session untouched
    Keep,
}

/// Cookie settings forwarded to the session provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieOptions {
    /// Session lifetime in milliseconds; `None` means a browser-session cookie
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
}

/// Cookie state persisted alongside the session data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieMeta {
    /// Lifetime the cookie was issued with, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_max_age: Option<u64>,

    /// Absolute expiry; `None` never expires server-side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl CookieMeta {
    /// Issue cookie state from the configured options
    pub fn new(options: &CookieOptions) -> Self {
        let mut meta = Self {
            original_max_age: options.max_age,
            expires: None,
        };
        meta.touch();
        meta
    }

    /// Push the expiry forward by the original max age
    ///
    /// A max age too large to represent leaves the cookie without a
    /// server-side expiry.
    pub fn touch(&mut self) {
        self.expires = self
            .original_max_age
            .and_then(|ms| {
                let delta = Duration::try_milliseconds(i64::try_from(ms).ok()?)?;
                Utc::now().checked_add_signed(delta)
            });
    }

    /// Whether the cookie has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Persisted form of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub cookie: CookieMeta,

    #[serde(default)]
    pub data: SessionData,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.cookie.is_expired()
    }
}

/// Named connector plus its parameters, used to construct a store
///
/// Deserializes from `{"connector": "file", "path": "/var/sessions"}`;
/// every key other than `connector` lands in `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    /// Registered connector name
    pub connector: String,

    /// Connector-specific parameters
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl StoreDescriptor {
    pub fn new(connector: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Add a connector parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Look up a string parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Where the session layer gets its store from
#[derive(Clone)]
pub enum StoreConfig {
    /// A store built by the caller
    Instance(Arc<dyn SessionStore>),

    /// A store to construct through the host's connector registry
    Connector(StoreDescriptor),
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(store) => f.debug_tuple("Instance").field(&store.name()).finish(),
            Self::Connector(descriptor) => f.debug_tuple("Connector").field(descriptor).finish(),
        }
    }
}

// Only descriptors can come from configuration files.
impl<'de> Deserialize<'de> for StoreConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        StoreDescriptor::deserialize(deserializer).map(StoreConfig::Connector)
    }
}

/// Session layer configuration
///
/// Resolved once when the layer is mounted. Everything except `isolated`
/// and `store` is forwarded to the session provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Scope session variables per broker
    pub isolated: bool,

    /// Save the session on every commit even when unmodified
    pub resave: bool,

    /// Save new sessions that were never written to
    pub save_uninitialized: bool,

    /// What to do when a handler unsets the session
    pub unset: UnsetPolicy,

    /// Signing secret; falls back to [`DEV_FALLBACK_SECRET`]
    ///
    /// Not used by this crate. Carried for hosts that sign the session
    /// cookie themselves (see `SessionLayer::secret`).
    pub secret: Option<String>,

    /// Store instance or connector descriptor; `None` uses the memory store
    pub store: Option<StoreConfig>,

    pub cookie: CookieOptions,

    /// Re-issue the cookie (and refresh expiry) on every response
    pub rolling: bool,

    /// Cookie name carrying the session id
    ///
    /// Cookie handling belongs to the host; read it via
    /// `SessionLayer::cookie_name` when writing the response cookie.
    pub name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            isolated: false,
            resave: false,
            save_uninitialized: false,
            unset: UnsetPolicy::Destroy,
            secret: None,
            store: None,
            cookie: CookieOptions::default(),
            rolling: false,
            name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject option values the session provider cannot honour
    pub fn validate(&self) -> Result<()> {
        if let Some(max_age) = self.cookie.max_age {
            if max_age > MAX_COOKIE_AGE_MS {
                return Err(SessionError::Config(format!(
                    "cookie.maxAge {} exceeds the maximum of {} ms",
                    max_age, MAX_COOKIE_AGE_MS
                )));
            }
        }
        Ok(())
    }

    pub fn isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Use a pre-built store
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(StoreConfig::Instance(store));
        self
    }

    /// Construct the store from a named connector at mount time
    pub fn with_connector(mut self, descriptor: StoreDescriptor) -> Self {
        self.store = Some(StoreConfig::Connector(descriptor));
        self
    }

    pub fn with_max_age(mut self, max_age_ms: u64) -> Self {
        self.cookie.max_age = Some(max_age_ms);
        self
    }

    pub fn with_unset(mut self, unset: UnsetPolicy) -> Self {
        self.unset = unset;
        self
    }

    pub fn with_resave(mut self, resave: bool) -> Self {
        self.resave = resave;
        self
    }

    pub fn with_save_uninitialized(mut self, save_uninitialized: bool) -> Self {
        self.save_uninitialized = save_uninitialized;
        self
    }

    pub fn with_rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    /// The configured secret, or the development fallback
    pub fn resolved_secret(&self) -> &str {
        self.secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEV_FALLBACK_SECRET)
    }
}
