//! Error types for graph operations

use crate::model::{EdgeId, NodeId};

/// Structural errors raised by local graph operations
///
/// These are rejected synchronously and never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Edge endpoint does not exist
    #[error("edge {edge} references missing node {missing}")]
    DanglingEndpoint { edge: EdgeId, missing: NodeId },

    /// Node id already present
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Edge id already present
    #[error("duplicate edge id: {0}")]
    DuplicateEdge(EdgeId),

    /// Node not found
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Edge not found
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),
}

/// Errors that can occur when computing or parsing fingerprints
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Invalid digest length
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
