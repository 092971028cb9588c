//! Error types for the editing session
//!
//! Collaborator failures (persistence, transport, generation) have their own
//! enums so they can travel inside [`SessionEvent`](crate::SessionEvent)s;
//! [`SessionError`] aggregates everything a session call can return.

use crate::types::VersionId;
use vcg_graph::{FingerprintError, GraphError};

/// Persistence collaborator failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    /// Backend unreachable (retry later)
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    /// Requested document or version does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend rejected the request
    #[error("persistence backend error: {0}")]
    Backend(String),

    /// Write raced another writer; retry against fresh state
    #[error("conflicting write: {0}")]
    Conflict(String),
}

impl PersistenceError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

/// Collaboration transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("not connected")]
    NotConnected,
}

/// Generator collaborator failure
///
/// Malformed payloads are not errors; they become an empty subgraph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Failed(String),
}

/// Versioning failure
#[derive(Debug, thiserror::Error)]
pub enum VersioningError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("unknown version: {0}")]
    UnknownVersion(VersionId),
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Structural violation, rejected before anything is broadcast
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("versioning error: {0}")]
    Versioning(#[from] VersioningError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Session was disposed
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(e) | Self::Versioning(VersioningError::Persistence(e)) => {
                e.is_retryable()
            }
            Self::Transport(_) | Self::Generation(_) => true,
            _ => false,
        }
    }
}
