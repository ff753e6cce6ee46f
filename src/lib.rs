//! # a3s-session
//!
//! Broker-scoped session variables over pluggable session stores.
//!
//! ## Overview
//!
//! `a3s-session` loads a session for each request and hands handlers a
//! `ScopedSession` to read and write variables. When a layer is mounted
//! beneath a broker route (or configured with `isolated`), variables are
//! partitioned per broker so backends sharing a user session never see
//! each other's state.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_session::{Application, Broker, MountPoint, SessionConfig, SessionLayer, SessionRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_session::Result<()> {
//! let app = Arc::new(Application::new());
//! let layer = SessionLayer::mount(
//!     SessionConfig::default().with_secret("change-me").isolated(true),
//!     &MountPoint::application(app),
//! )?;
//!
//! let mut req = SessionRequest::new().with_broker(Broker::new("sports"));
//! layer.handle(&mut req).await?;
//!
//! if let Some(mut session) = req.scoped() {
//!     session.set("visits", Some(serde_json::json!(1)));
//! }
//!
//! let outcome = layer.commit(&mut req).await?;
//! println!("Session: {:?}", outcome.session_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! - **memory** — In-memory store, the default and the fallback
//! - **file** — One JSON file per session, survives restarts
//!
//! Hosts add their own backends through the `ConnectorRegistry`.
//!
//! ## Architecture
//!
//! - **SessionStore** trait — persistence abstraction all backends implement
//! - **SessionLayer** — mount-time setup and per-request load/decorate/commit
//! - **ScopedSession** — `get`/`set`/`all` with optional per-broker isolation
//! - **SessionManager** — save rules (`resave`, `saveUninitialized`, `unset`, `rolling`)

pub mod connector;
pub mod error;
pub mod host;
pub mod layer;
pub mod manager;
pub mod scope;
pub mod session;
pub mod store;
pub mod types;

// Re-export core types
pub use connector::{ConnectorRegistry, StoreFactory};
pub use error::{Result, SessionError};
pub use host::{Application, HostApp, MountPoint};
pub use layer::{IsolationPolicy, SessionLayer};
pub use manager::{CommitAction, CommitOutcome, SessionManager};
pub use scope::{Decoration, ScopedSession, ISOLATED_DATA_KEY};
pub use session::{Session, SessionRequest};
pub use store::{DisconnectHandler, DisconnectListeners, SessionStore, StoreInfo};
pub use types::{
    Broker, CookieMeta, CookieOptions, SessionConfig, SessionData, SessionRecord, StoreConfig,
    StoreDescriptor, UnsetPolicy, DEV_FALLBACK_SECRET,
};

// Re-export stores for convenience
pub use store::file::FileStore;
pub use store::memory::MemoryStore;
