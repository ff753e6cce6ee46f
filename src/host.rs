//! Hosting application seam
//!
//! The session layer never owns the application it is mounted in. It
//! borrows two capabilities from it: the connector registry used to
//! build stores, and a log sink for non-fatal warnings.

use crate::connector::ConnectorRegistry;
use crate::types::Broker;
use std::sync::Arc;
use tracing::Level;

/// Capabilities the session layer needs from its host
pub trait HostApp: Send + Sync {
    /// Connectors available for building session stores
    fn connectors(&self) -> &ConnectorRegistry;

    /// Log a message on behalf of the session layer
    ///
    /// Default implementation forwards to `tracing`.
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "a3s_session", "{}", message),
            Level::WARN => tracing::warn!(target: "a3s_session", "{}", message),
            Level::INFO => tracing::info!(target: "a3s_session", "{}", message),
            Level::DEBUG => tracing::debug!(target: "a3s_session", "{}", message),
            _ => tracing::trace!(target: "a3s_session", "{}", message),
        }
    }
}

/// Default host: built-in connectors, `tracing` log sink
#[derive(Default)]
pub struct Application {
    connectors: ConnectorRegistry,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom connector registry
    pub fn with_connectors(connectors: ConnectorRegistry) -> Self {
        Self { connectors }
    }
}

impl HostApp for Application {
    fn connectors(&self) -> &ConnectorRegistry {
        &self.connectors
    }
}

/// Where a session layer is being mounted
///
/// A mount point beneath a broker route carries that broker; mounting
/// there turns isolation on.
#[derive(Clone, Default)]
pub struct MountPoint {
    app: Option<Arc<dyn HostApp>>,
    broker: Option<Broker>,
}

impl MountPoint {
    /// Application-level mount
    pub fn application(app: Arc<dyn HostApp>) -> Self {
        Self {
            app: Some(app),
            broker: None,
        }
    }

    /// Mount beneath a broker-scoped route
    pub fn broker(app: Arc<dyn HostApp>, broker: Broker) -> Self {
        Self {
            app: Some(app),
            broker: Some(broker),
        }
    }

    /// A mount point with no host, rejected by `SessionLayer::mount`
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn app(&self) -> Option<&Arc<dyn HostApp>> {
        self.app.as_ref()
    }

    pub fn mounted_broker(&self) -> Option<&Broker> {
        self.broker.as_ref()
    }

    pub fn is_broker_scoped(&self) -> bool {
        self.broker.is_some()
    }
}
