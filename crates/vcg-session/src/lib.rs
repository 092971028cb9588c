//! VCG Session - collaborative editing of value-chain graphs
//!
//! One [`EditorSession`] per user and document:
//! - Owns the local graph and applies user edits
//! - Broadcasts every edit to peers and merges theirs back in
//! - Auto-saves after a quiet period, skipping unchanged snapshots
//! - Creates and restores named versions
//! - Merges generator output additively
//!
//! # Core Concepts
//!
//! - [`Persistence`]: Current-state and version storage; [`MemoryPersistence`] ships in-crate
//! - [`CollaborationTransport`]: Room connection with broadcast and incoming messages
//! - [`AutoSavePipeline`]: Debounce timer plus fingerprint comparison
//! - [`VersioningService`]: Monotonic sequence numbers and a single current version
//! - [`CollaborationSession`]: Connection state machine with exponential backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vcg_graph::{Node, NodeKind};
//! use vcg_session::{EditorSession, MemoryPersistence, SessionConfig, UserInfo};
//!
//! # async fn example(transport: Arc<dyn vcg_session::CollaborationTransport>) -> Result<(), vcg_session::SessionError> {
//! let mut editor = EditorSession::open(
//!     SessionConfig::new(),
//!     "doc-1".into(),
//!     UserInfo::new("alice", "Alice"),
//!     Arc::new(MemoryPersistence::new()),
//!     transport,
//! )
//! .await?;
//!
//! editor.add_node(Node::new("n1", NodeKind::Primary, "Logistics"))?;
//! editor.save_version(Some("Baseline")).await?;
//!
//! while let Some(event) = editor.next_event().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Collaborators
pub mod generation;
pub mod persistence;
pub mod transport;

// Session components
pub mod autosave;
pub mod collaboration;
pub mod editor;
pub mod versioning;

// Ambient
pub mod config;
pub mod error;
pub mod events;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use autosave::{AutoSavePipeline, SaveOutcome};
pub use collaboration::CollaborationSession;
pub use config::{BackoffConfig, SessionConfig};
pub use editor::EditorSession;
pub use error::{
    ConfigError, GenerationError, PersistenceError, SessionError, TransportError, VersioningError,
};
pub use events::{event_channel, ConnectionState, EventReceiver, EventSender, SessionEvent};
pub use generation::{Generator, StaticGenerator};
pub use persistence::{MemoryPersistence, Persistence};
pub use telemetry::init_tracing;
pub use transport::{CollaborationTransport, TransportConnection, TransportHandle, TransportMessage};
pub use types::{DocumentId, Peer, UserId, UserInfo, Version, VersionId, VersionMeta};
pub use versioning::VersioningService;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding an editing session
    pub use crate::{
        CollaborationTransport, ConnectionState, DocumentId, EditorSession, MemoryPersistence,
        Persistence, SaveOutcome, SessionConfig, SessionError, SessionEvent, UserInfo, VersionId,
    };
    pub use vcg_graph::{ChangeSet, Edge, EdgeKind, Graph, Node, NodeId, NodeKind, NodePatch};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
