//! Error types for the bridge protocol.

use thiserror::Error;

/// Errors that can surface while bridging a run.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The agent runtime's event sequence failed. Displays the raw message so it
    /// can be relayed to the client unchanged.
    #[error("{0}")]
    Upstream(String),
    #[error("session store error: {0}")]
    Persistence(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session already exists: {0}")]
    SessionExists(String),
}

impl BridgeError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn persistence(error: impl std::fmt::Display) -> Self {
        Self::Persistence(error.to_string())
    }
}

/// Convenience result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
