//! Session layer — mount-time setup and per-request handling
//!
//! `SessionLayer` is mounted once per application or broker route. Mount
//! resolves the configuration, decides whether variables are isolated
//! per broker, and builds the session store. Per request it loads the
//! session and decorates it with scoped accessors.

use crate::error::{Result, SessionError};
use crate::host::{HostApp, MountPoint};
use crate::manager::{CommitOutcome, SessionManager};
use crate::scope::Decoration;
use crate::session::SessionRequest;
use crate::store::{MemoryStore, SessionStore, StoreInfo};
use crate::types::{
    SessionConfig, StoreConfig, StoreDescriptor, DEFAULT_COOKIE_NAME, DEV_FALLBACK_SECRET,
};
use std::sync::Arc;
use tracing::Level;

/// Whether session variables are scoped per broker
///
/// Fixed at mount time. Isolation is on when the layer is mounted
/// beneath a broker route or the configuration sets `isolated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationPolicy {
    Shared,
    Isolated,
}

impl IsolationPolicy {
    pub fn resolve(config: &SessionConfig, mount: &MountPoint) -> Self {
        if mount.is_broker_scoped() || config.isolated {
            Self::Isolated
        } else {
            Self::Shared
        }
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::Isolated)
    }
}

/// Mounted session middleware
pub struct SessionLayer {
    app: Arc<dyn HostApp>,
    manager: SessionManager,
    policy: IsolationPolicy,
}

impl SessionLayer {
    /// Mount the layer at `mount`
    ///
    /// Fails only when the mount point has no host application. Store
    /// construction problems are logged and fall back to memory.
    pub fn mount(mut config: SessionConfig, mount: &MountPoint) -> Result<Self> {
        let app = mount.app().cloned().ok_or_else(|| {
            SessionError::InvalidMount("session layer requires a host application".to_string())
        })?;

        if config.secret.as_deref().map_or(true, str::is_empty) {
            app.log(
                Level::WARN,
                "No session secret configured, using the insecure development fallback",
            );
            config.secret = Some(DEV_FALLBACK_SECRET.to_string());
        }

        let policy = IsolationPolicy::resolve(&config, mount);
        config.isolated = policy.is_isolated();

        let store = init_store(app.as_ref(), config.store.take());
        register_disconnect_logging(&app, store.as_ref());

        tracing::info!(
            store = store.name(),
            isolated = policy.is_isolated(),
            broker = mount.mounted_broker().map(|b| b.alias.as_str()),
            "Session layer mounted"
        );

        config.store = Some(StoreConfig::Instance(store.clone()));
        Ok(Self {
            app,
            manager: SessionManager::new(store, config),
            policy,
        })
    }

    pub fn policy(&self) -> IsolationPolicy {
        self.policy
    }

    pub fn is_isolated(&self) -> bool {
        self.policy.is_isolated()
    }

    pub fn config(&self) -> &SessionConfig {
        self.manager.config()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.manager.store()
    }

    /// Secret for hosts that sign the session cookie
    ///
    /// The layer itself never signs anything.
    pub fn secret(&self) -> &str {
        self.config().resolved_secret()
    }

    /// Cookie name the host should read and write the session id under
    pub fn cookie_name(&self) -> &str {
        match self.config().name.as_str() {
            "" => DEFAULT_COOKIE_NAME,
            name => name,
        }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn app(&self) -> &Arc<dyn HostApp> {
        &self.app
    }

    /// Load the request's session (if not loaded yet) and decorate it
    ///
    /// A session that is already decorated keeps its accessors and data,
    /// so stacking layers or re-entering a sub-router is harmless.
    pub async fn handle(&self, req: &mut SessionRequest) -> Result<()> {
        if req.session().is_none() {
            let session = self.manager.load(req.session_id()).await?;
            req.set_session(session);
        }

        if let Some(session) = req.session_mut() {
            if !session.decorate(Decoration::new(self.policy.is_isolated())) {
                tracing::trace!(sid = %session.id(), "Session already decorated");
            }
        }

        Ok(())
    }

    /// Persist the request's session according to the save rules
    pub async fn commit(&self, req: &mut SessionRequest) -> Result<CommitOutcome> {
        self.manager.commit(req).await
    }

    /// Discard in-request changes and re-read the session from the store
    ///
    /// Returns `false` if the store no longer holds the session.
    pub async fn reload(&self, req: &mut SessionRequest) -> Result<bool> {
        match req.session_mut() {
            Some(session) => self.manager.reload(session).await,
            None => Ok(false),
        }
    }

    /// Store status
    pub async fn info(&self) -> Result<StoreInfo> {
        StoreInfo::collect(self.manager.store().as_ref()).await
    }
}

/// Resolve the configured store, falling back to memory on any failure
fn init_store(app: &dyn HostApp, config: Option<StoreConfig>) -> Arc<dyn SessionStore> {
    match config {
        Some(StoreConfig::Instance(store)) => store,
        Some(StoreConfig::Connector(descriptor)) => match build_store(app, &descriptor) {
            Ok(store) => store,
            Err(e) => {
                app.log(
                    Level::WARN,
                    &format!(
                        "Unable to initialize session store \"{}\" - {}",
                        descriptor.connector, e
                    ),
                );
                Arc::new(MemoryStore::new())
            }
        },
        None => Arc::new(MemoryStore::new()),
    }
}

fn build_store(app: &dyn HostApp, descriptor: &StoreDescriptor) -> Result<Arc<dyn SessionStore>> {
    // Connector factories are host code and may panic.
    let built = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        app.connectors().build(descriptor)
    }));

    built.unwrap_or_else(|_| {
        Err(SessionError::Connector {
            connector: descriptor.connector.clone(),
            reason: "connector panicked during construction".to_string(),
        })
    })
}

fn register_disconnect_logging(app: &Arc<dyn HostApp>, store: &dyn SessionStore) {
    let app = Arc::downgrade(app);
    store.on_disconnect(Arc::new(move |err| {
        if let Some(app) = app.upgrade() {
            app.log(Level::WARN, &format!("Session store disconnected - {}", err));
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ConnectorRegistry;
    use crate::host::Application;
    use crate::types::Broker;
    use serde_json::json;

    fn app() -> Arc<dyn HostApp> {
        Arc::new(Application::new())
    }

    #[test]
    fn test_mount_without_app_fails() {
        let result = SessionLayer::mount(SessionConfig::default(), &MountPoint::detached());
        assert!(matches!(result, Err(SessionError::InvalidMount(_))));
    }

    #[test]
    fn test_isolation_policy() {
        let root = MountPoint::application(app());
        let scoped = MountPoint::broker(app(), Broker::new("b1"));

        assert_eq!(
            IsolationPolicy::resolve(&SessionConfig::default(), &root),
            IsolationPolicy::Shared
        );
        assert_eq!(
            IsolationPolicy::resolve(&SessionConfig::default().isolated(true), &root),
            IsolationPolicy::Isolated
        );
        assert_eq!(
            IsolationPolicy::resolve(&SessionConfig::default(), &scoped),
            IsolationPolicy::Isolated
        );
    }

    #[test]
    fn test_mount_resolves_defaults() {
        let layer =
            SessionLayer::mount(SessionConfig::default(), &MountPoint::application(app())).unwrap();
        assert_eq!(layer.config().resolved_secret(), DEV_FALLBACK_SECRET);
        assert!(!layer.is_isolated());
        assert_eq!(layer.store().name(), "memory");
    }

    #[test]
    fn test_cookie_settings_exposed_to_host() {
        let layer =
            SessionLayer::mount(SessionConfig::default(), &MountPoint::application(app())).unwrap();
        assert_eq!(layer.secret(), DEV_FALLBACK_SECRET);
        assert_eq!(layer.cookie_name(), DEFAULT_COOKIE_NAME);

        let config = SessionConfig::from_json(r#"{"secret": "s3cret", "name": "app.sid"}"#)
            .unwrap();
        let layer = SessionLayer::mount(config, &MountPoint::application(app())).unwrap();
        assert_eq!(layer.secret(), "s3cret");
        assert_eq!(layer.cookie_name(), "app.sid");

        let layer = SessionLayer::mount(
            SessionConfig::from_json(r#"{"name": ""}"#).unwrap(),
            &MountPoint::application(app()),
        )
        .unwrap();
        assert_eq!(layer.cookie_name(), DEFAULT_COOKIE_NAME);
    }

    #[test]
    fn test_mount_broker_scoped_is_isolated() {
        let layer = SessionLayer::mount(
            SessionConfig::default().with_secret("s"),
            &MountPoint::broker(app(), Broker::new("b1")),
        )
        .unwrap();
        assert!(layer.is_isolated());
        assert!(layer.config().isolated);
    }

    #[test]
    fn test_mount_with_connector() {
        let registry = ConnectorRegistry::empty();
        registry.register("shared", |_| Ok(Arc::new(MemoryStore::new())));
        let app: Arc<dyn HostApp> = Arc::new(Application::with_connectors(registry));

        let config = SessionConfig::default().with_connector(StoreDescriptor::new("shared"));
        let layer = SessionLayer::mount(config, &MountPoint::application(app)).unwrap();
        assert_eq!(layer.store().name(), "memory");
    }

    #[test]
    fn test_panicking_connector_falls_back() {
        let registry = ConnectorRegistry::empty();
        registry.register("broken", |_| panic!("native driver missing"));
        let app: Arc<dyn HostApp> = Arc::new(Application::with_connectors(registry));

        let config = SessionConfig::default().with_connector(StoreDescriptor::new("broken"));
        let layer = SessionLayer::mount(config, &MountPoint::application(app)).unwrap();
        assert_eq!(layer.store().name(), "memory");
    }

    #[tokio::test]
    async fn test_handle_twice_keeps_decoration_and_data() {
        let isolated = SessionLayer::mount(
            SessionConfig::default().isolated(true),
            &MountPoint::application(app()),
        )
        .unwrap();
        let shared =
            SessionLayer::mount(SessionConfig::default(), &MountPoint::application(app())).unwrap();

        let mut req = SessionRequest::new().with_broker(Broker::new("b1"));
        isolated.handle(&mut req).await.unwrap();
        req.scoped().unwrap().set("x", Some(json!(5)));

        isolated.handle(&mut req).await.unwrap();
        shared.handle(&mut req).await.unwrap();

        let scoped = req.scoped().unwrap();
        assert!(scoped.is_isolated());
        assert_eq!(scoped.get("x"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_reload_without_session() {
        let layer =
            SessionLayer::mount(SessionConfig::default(), &MountPoint::application(app())).unwrap();
        let mut req = SessionRequest::new();
        assert!(!layer.reload(&mut req).await.unwrap());
    }

    #[tokio::test]
    async fn test_info() {
        let layer =
            SessionLayer::mount(SessionConfig::default(), &MountPoint::application(app())).unwrap();
        let info = layer.info().await.unwrap();
        assert_eq!(info.store, "memory");
        assert_eq!(info.sessions, 0);
        assert!(info.healthy);
    }
}
