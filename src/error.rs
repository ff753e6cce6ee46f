//! Error types for a3s-session

use thiserror::Error;

/// Errors that can occur in the session layer
#[derive(Debug, Error)]
pub enum SessionError {
    /// The layer was mounted without a usable host application
    #[error("Invalid mount context: {0}")]
    InvalidMount(String),

    /// Session store backend failure
    #[error("Session store '{store}' error: {reason}")]
    Store {
        store: String,
        reason: String,
    },

    /// No connector registered under the requested name
    #[error("Unknown session store connector: {0}")]
    UnknownConnector(String),

    /// A connector factory refused to build a store
    #[error("Failed to construct session store from connector '{connector}': {reason}")]
    Connector {
        connector: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure in a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session identifier rejected by a store
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Shorthand for a store error tagged with the store name
    pub fn store(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
