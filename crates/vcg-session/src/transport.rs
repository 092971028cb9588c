//! Collaboration transport collaborator
//!
//! A transport connects a user to a document room and yields a handle for
//! outgoing broadcasts plus one channel of incoming messages.

use crate::error::TransportError;
use crate::types::{DocumentId, Peer, UserInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use vcg_graph::ChangeSet;

/// Message delivered by a live connection
#[derive(Debug, Clone)]
pub enum TransportMessage {
    RemoteChange(ChangeSet),
    Peers(Vec<Peer>),
    /// Connection ended; `None` means closed by the remote side without error
    Closed(Option<TransportError>),
}

/// Outgoing side of a live connection
pub trait TransportHandle: Send + Sync {
    /// Fire-and-forget broadcast to every other participant
    fn broadcast(&self, change: &ChangeSet);

    /// Leave the room; idempotent
    fn disconnect(&self);
}

/// A live connection
pub struct TransportConnection {
    pub handle: Arc<dyn TransportHandle>,
    pub incoming: mpsc::UnboundedReceiver<TransportMessage>,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Connects users to document rooms
#[async_trait]
pub trait CollaborationTransport: Send + Sync {
    /// Open a connection
    ///
    /// # Errors
    /// - `TransportError::ConnectFailed` if the room cannot be joined
    async fn connect(
        &self,
        document: &DocumentId,
        user: &UserInfo,
    ) -> Result<TransportConnection, TransportError>;
}
