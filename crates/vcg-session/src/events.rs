//! Session events
//!
//! Every asynchronous input (remote edits, peer lists, connection changes,
//! auto-save outcomes) reaches the editor through one channel of
//! [`SessionEvent`]s.

use crate::error::{PersistenceError, TransportError};
use crate::types::Peer;
use tokio::sync::mpsc;
use vcg_graph::{ChangeSet, Fingerprint};
use vcg_merge::MergeReport;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Asynchronous input to an editing session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Change-set from a peer, not yet merged
    RemoteChange(ChangeSet),
    /// Change-set from a peer after the editor merged it
    RemoteMerged(MergeReport),
    PeersChanged(Vec<Peer>),
    ConnectionChanged(ConnectionState),
    /// Transport error; a reconnect follows after `retry_in`
    TransportFailed {
        error: TransportError,
        attempt: u32,
        retry_in: std::time::Duration,
    },
    AutoSaved(Fingerprint),
    /// Debounce fired but the graph matched the last save
    AutoSaveSkipped,
    /// Non-fatal; the next cycle retries
    AutoSaveFailed(PersistenceError),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Unbounded event channel
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
