//! Testing utilities for the VCG workspace
//!
//! Shared fixtures, an in-process collaboration hub and a persistence
//! wrapper that can be switched offline.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use vcg_graph::{ChangeSet, Edge, Graph, Node, NodeKind};
use vcg_session::{
    CollaborationTransport, DocumentId, EditorSession, MemoryPersistence, Peer, Persistence,
    PersistenceError, SessionConfig, SessionEvent, TransportConnection, TransportError,
    TransportHandle, TransportMessage, UserInfo, Version, VersionId, VersionMeta,
};

// --- fixtures ---

pub const DOCUMENT: &str = "doc-1";

pub fn node(id: &str, kind: NodeKind, label: &str) -> Node {
    Node::new(id, kind, label)
}

/// Single company node, the starting point of every new diagram
pub fn company_graph() -> Graph {
    Graph::from_parts(
        [node("company", NodeKind::External, "ACME").with_position(0.0, 450.0)],
        [],
    )
}

/// Company plus two linked primary activities
pub fn value_chain_graph() -> Graph {
    Graph::from_parts(
        [
            node("company", NodeKind::External, "ACME").with_position(0.0, 450.0),
            node("inbound", NodeKind::Primary, "Inbound Logistics").with_position(0.0, 250.0),
            node("operations", NodeKind::Primary, "Operations").with_position(220.0, 250.0),
        ],
        [Edge::new("e1", "inbound", "operations")],
    )
}

/// Generator output in the loose shape generators actually return
pub fn generated_payload() -> Value {
    json!({
        "nodes": [
            { "id": "company", "type": "external", "data": { "label": "ACME" } },
            { "id": "g1", "type": "support", "data": { "label": "HR" } },
            { "id": "g2", "type": "primary", "data": { "label": "Sales" } },
            { "id": "g3", "type": "mystery", "data": { "label": "Unknown kind" } }
        ],
        "edges": [
            { "source": "g1", "target": "g2" },
            { "source": "g2", "target": "company" },
            { "source": "g2", "target": "nowhere" }
        ]
    })
}

/// Default config with a 10 s debounce and deterministic backoff
pub fn test_config() -> SessionConfig {
    SessionConfig::new().with_autosave_debounce(Duration::from_secs(10))
}

pub async fn open_editor(
    user: &str,
    persistence: Arc<dyn Persistence>,
    hub: &LoopbackHub,
) -> EditorSession {
    EditorSession::open(
        test_config(),
        DOCUMENT.into(),
        UserInfo::new(user, user.to_uppercase()),
        persistence,
        Arc::new(hub.clone()),
    )
    .await
    .unwrap()
}

/// Receive events until one matches `pred`
pub async fn wait_for<F>(editor: &mut EditorSession, mut pred: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = editor.next_event().await.expect("session closed");
        if pred(&event) {
            return event;
        }
    }
}

/// Handle every event that is already queued
pub fn drain(editor: &mut EditorSession) -> Vec<SessionEvent> {
    std::iter::from_fn(|| editor.try_next_event()).collect()
}

// --- loopback transport ---

/// In-process room server shared by every client of a test
///
/// Broadcasts are delivered to every other client of the same document.
/// Cloning yields another handle to the same hub.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    next_client: u64,
    clients: Vec<Client>,
    offline: bool,
    failures_left: u32,
    connect_attempts: u32,
    broadcasts: Vec<ChangeSet>,
}

struct Client {
    id: u64,
    document: DocumentId,
    user: UserInfo,
    tx: mpsc::UnboundedSender<TransportMessage>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every connection while offline
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Refuse the next `n` connection attempts
    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().failures_left = n;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().connect_attempts
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    /// Every change-set broadcast so far, in order
    pub fn broadcasts(&self) -> Vec<ChangeSet> {
        self.state.lock().broadcasts.clone()
    }

    /// Deliver a change-set from a participant outside the test
    pub fn inject(&self, document: &DocumentId, change: &ChangeSet) {
        let state = self.state.lock();
        for client in state.clients.iter().filter(|c| &c.document == document) {
            let _ = client.tx.send(TransportMessage::RemoteChange(change.clone()));
        }
    }

    /// Close every connection with an error, as a server restart would
    pub fn drop_connections(&self) {
        let clients = std::mem::take(&mut self.state.lock().clients);
        for client in clients {
            let _ = client.tx.send(TransportMessage::Closed(Some(
                TransportError::ConnectionLost("hub reset".into()),
            )));
        }
    }
}

impl HubState {
    fn announce_peers(&self, document: &DocumentId) {
        let room: Vec<&Client> = self.clients.iter().filter(|c| &c.document == document).collect();
        for client in &room {
            let peers = room
                .iter()
                .filter(|other| other.id != client.id)
                .map(|other| Peer::new(other.user.id.clone(), other.user.display_name.clone()))
                .collect();
            let _ = client.tx.send(TransportMessage::Peers(peers));
        }
    }
}

#[async_trait]
impl CollaborationTransport for LoopbackHub {
    async fn connect(
        &self,
        document: &DocumentId,
        user: &UserInfo,
    ) -> Result<TransportConnection, TransportError> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if state.offline || state.failures_left > 0 {
            state.failures_left = state.failures_left.saturating_sub(1);
            return Err(TransportError::ConnectFailed("hub unreachable".into()));
        }

        let (tx, incoming) = mpsc::unbounded_channel();
        state.next_client += 1;
        let id = state.next_client;
        state.clients.push(Client {
            id,
            document: document.clone(),
            user: user.clone(),
            tx,
        });
        state.announce_peers(document);
        tracing::debug!(client = id, user = %user.id, "loopback client joined");

        Ok(TransportConnection {
            handle: Arc::new(LoopbackHandle {
                state: Arc::clone(&self.state),
                document: document.clone(),
                id,
            }),
            incoming,
        })
    }
}

struct LoopbackHandle {
    state: Arc<Mutex<HubState>>,
    document: DocumentId,
    id: u64,
}

impl TransportHandle for LoopbackHandle {
    fn broadcast(&self, change: &ChangeSet) {
        let mut state = self.state.lock();
        if !state.clients.iter().any(|c| c.id == self.id) {
            return;
        }
        state.broadcasts.push(change.clone());
        for client in state
            .clients
            .iter()
            .filter(|c| c.document == self.document && c.id != self.id)
        {
            let _ = client.tx.send(TransportMessage::RemoteChange(change.clone()));
        }
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        let before = state.clients.len();
        state.clients.retain(|c| c.id != self.id);
        if state.clients.len() != before {
            state.announce_peers(&self.document);
        }
    }
}

// --- persistence ---

/// [`MemoryPersistence`] that can be taken offline and slowed down
#[derive(Debug, Default)]
pub struct FlakyPersistence {
    inner: MemoryPersistence,
    offline: AtomicBool,
    save_attempts: AtomicUsize,
    save_delay: Mutex<Option<Duration>>,
}

impl FlakyPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every write fails with `Unavailable`
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Make each `save` take `delay` before completing
    pub fn set_save_delay(&self, delay: Option<Duration>) {
        *self.save_delay.lock() = delay;
    }

    /// Calls to `save`, successful or not
    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryPersistence {
        &self.inner
    }

    fn check_online(&self) -> Result<(), PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable("storage offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Persistence for FlakyPersistence {
    async fn save(&self, document: &DocumentId, graph: &Graph) -> Result<(), PersistenceError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.save_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_online()?;
        self.inner.save(document, graph).await
    }

    async fn load_current(&self, document: &DocumentId) -> Result<Option<Graph>, PersistenceError> {
        self.inner.load_current(document).await
    }

    async fn save_version(
        &self,
        document: &DocumentId,
        version: &Version,
    ) -> Result<(), PersistenceError> {
        self.check_online()?;
        self.inner.save_version(document, version).await
    }

    async fn list_versions(
        &self,
        document: &DocumentId,
    ) -> Result<Vec<VersionMeta>, PersistenceError> {
        self.inner.list_versions(document).await
    }

    async fn load_version(&self, version: &VersionId) -> Result<Graph, PersistenceError> {
        self.inner.load_version(version).await
    }
}
