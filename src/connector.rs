//! Named store connectors
//!
//! A connector turns a `StoreDescriptor` into a live `SessionStore`.
//! Hosts register their own backends here; `memory` and `file` are
//! always available.

use crate::error::{Result, SessionError};
use crate::store::{FileStore, MemoryStore, SessionStore};
use crate::types::StoreDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Builds a store from its descriptor
pub type StoreFactory =
    Arc<dyn Fn(&StoreDescriptor) -> Result<Arc<dyn SessionStore>> + Send + Sync>;

/// Registry of store connectors keyed by name
pub struct ConnectorRegistry {
    factories: RwLock<HashMap<String, StoreFactory>>,
}

impl ConnectorRegistry {
    /// Create a registry with only the built-in connectors
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("memory", |_| Ok(Arc::new(MemoryStore::new())));
        registry.register("file", |descriptor| {
            let path = descriptor.param_str("path").ok_or_else(|| {
                SessionError::Connector {
                    connector: descriptor.connector.clone(),
                    reason: "missing 'path' parameter".to_string(),
                }
            })?;
            Ok(Arc::new(FileStore::new(path)))
        });
        registry
    }

    /// Create a registry with no connectors at all
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a connector
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&StoreDescriptor) -> Result<Arc<dyn SessionStore>> + Send + Sync + 'static,
    {
        let name = name.into();
        match self.factories.write() {
            Ok(mut factories) => {
                if factories.insert(name.clone(), Arc::new(factory)).is_some() {
                    tracing::debug!(connector = %name, "Session store connector replaced");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Connector registry lock poisoned"),
        }
    }

    /// Whether a connector is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .map(|f| f.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered connector names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Construct a store from a descriptor
    pub fn build(&self, descriptor: &StoreDescriptor) -> Result<Arc<dyn SessionStore>> {
        let factory = {
            let factories = self.factories.read().map_err(|e| {
                SessionError::Config(format!("Connector registry lock poisoned: {}", e))
            })?;
            factories
                .get(&descriptor.connector)
                .cloned()
                .ok_or_else(|| SessionError::UnknownConnector(descriptor.connector.clone()))?
        };

        factory(descriptor)
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
