//! Collaboration connection lifecycle
//!
//! A supervisor task drives `Disconnected -> Connecting -> Connected`,
//! forwards incoming messages to the session event channel and reconnects
//! with exponential backoff after any transport error.

use crate::config::BackoffConfig;
use crate::error::TransportError;
use crate::events::{ConnectionState, EventSender, SessionEvent};
use crate::transport::{CollaborationTransport, TransportHandle, TransportMessage};
use crate::types::{DocumentId, Peer, UserInfo};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use vcg_graph::ChangeSet;

/// Connection to the collaboration room of one document
pub struct CollaborationSession {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ConnectionState>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    document: DocumentId,
    user: UserInfo,
    transport: Arc<dyn CollaborationTransport>,
    backoff: BackoffConfig,
    events: EventSender,
    state: watch::Sender<ConnectionState>,
    handle: Mutex<Option<Arc<dyn TransportHandle>>>,
    peers: Mutex<Vec<Peer>>,
    /// Bumped by every disconnect; a supervisor from an older epoch must
    /// not publish a connection
    epoch: AtomicU64,
}

impl CollaborationSession {
    #[must_use]
    pub fn new(
        document: DocumentId,
        user: UserInfo,
        transport: Arc<dyn CollaborationTransport>,
        backoff: BackoffConfig,
        events: EventSender,
    ) -> Self {
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                document,
                user,
                transport,
                backoff,
                events,
                state,
                handle: Mutex::new(None),
                peers: Mutex::new(Vec::new()),
                epoch: AtomicU64::new(0),
            }),
            state_rx,
            supervisor: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Last peer list reported by the transport
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.shared.peers.lock().clone()
    }

    /// Start the supervisor; no-op if already running
    pub fn connect(&self) {
        let mut supervisor = self.supervisor.lock();
        if supervisor.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let epoch = shared.epoch.load(Ordering::SeqCst);
        *supervisor = Some(tokio::spawn(async move { shared.supervise(epoch).await }));
    }

    /// Leave the room and stop reconnecting
    ///
    /// Cancels a pending backoff and any connect attempt in flight. A
    /// connect that completes concurrently is closed again by the supervisor.
    pub fn disconnect(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(supervisor) = self.supervisor.lock().take() {
            supervisor.abort();
        }
        if let Some(handle) = self.shared.handle.lock().take() {
            handle.disconnect();
        }
        self.shared.peers.lock().clear();
        self.shared.set_state(ConnectionState::Disconnected);
        tracing::info!(document = %self.shared.document, "collaboration disconnected");
    }

    /// Fire-and-forget broadcast; dropped while not connected
    ///
    /// Returns whether the change was handed to the transport.
    pub fn broadcast(&self, change: &ChangeSet) -> bool {
        if change.is_empty() {
            return false;
        }
        let handle = self.shared.handle.lock().clone();
        match handle {
            Some(handle) => {
                handle.broadcast(change);
                true
            }
            None => {
                tracing::debug!(
                    document = %self.shared.document,
                    ops = change.len(),
                    "broadcast dropped while disconnected"
                );
                false
            }
        }
    }
}

impl Drop for CollaborationSession {
    fn drop(&mut self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.abort();
        }
        if let Some(handle) = self.shared.handle.lock().take() {
            handle.disconnect();
        }
    }
}

impl std::fmt::Debug for CollaborationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaborationSession")
            .field("document", &self.shared.document)
            .field("user", &self.shared.user.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(document = %self.document, from = ?previous, to = ?next, "connection state changed");
            let _ = self.events.send(SessionEvent::ConnectionChanged(next));
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    async fn supervise(self: Arc<Self>, epoch: u64) {
        let mut attempt: u32 = 0;
        loop {
            if self.is_stale(epoch) {
                return;
            }
            self.set_state(ConnectionState::Connecting);

            let error = match self.transport.connect(&self.document, &self.user).await {
                Ok(connection) => {
                    attempt = 0;
                    {
                        // disconnect bumps the epoch before taking this lock
                        let mut slot = self.handle.lock();
                        if self.is_stale(epoch) {
                            drop(slot);
                            connection.handle.disconnect();
                            tracing::debug!(document = %self.document, "connect finished after disconnect; closed");
                            return;
                        }
                        *slot = Some(Arc::clone(&connection.handle));
                        self.set_state(ConnectionState::Connected);
                    }
                    tracing::info!(document = %self.document, user = %self.user.id, "collaboration connected");

                    let error = self.pump(connection.incoming).await;
                    if let Some(handle) = self.handle.lock().take() {
                        handle.disconnect();
                    }
                    error
                }
                Err(error) => error,
            };
            if self.is_stale(epoch) {
                return;
            }

            self.set_state(ConnectionState::Disconnected);
            let retry_in = self.backoff.delay(attempt);
            tracing::warn!(
                document = %self.document,
                error = %error,
                attempt,
                retry_in_ms = u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX),
                "collaboration transport failed"
            );
            let _ = self.events.send(SessionEvent::TransportFailed {
                error,
                attempt,
                retry_in,
            });

            attempt = attempt.saturating_add(1);
            tokio::time::sleep(retry_in).await;
        }
    }

    /// Forward incoming messages until the connection ends
    async fn pump(&self, mut incoming: mpsc::UnboundedReceiver<TransportMessage>) -> TransportError {
        while let Some(message) = incoming.recv().await {
            match message {
                TransportMessage::RemoteChange(change) => {
                    tracing::debug!(document = %self.document, ops = change.len(), "remote change received");
                    let _ = self.events.send(SessionEvent::RemoteChange(change));
                }
                TransportMessage::Peers(peers) => {
                    self.peers.lock().clone_from(&peers);
                    let _ = self.events.send(SessionEvent::PeersChanged(peers));
                }
                TransportMessage::Closed(error) => {
                    return error.unwrap_or_else(|| {
                        TransportError::ConnectionLost("closed by remote".into())
                    });
                }
            }
        }
        TransportError::ConnectionLost("incoming channel closed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use crate::transport::TransportConnection;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandle {
        sent: Mutex<Vec<ChangeSet>>,
        disconnects: AtomicUsize,
    }

    impl TransportHandle for RecordingHandle {
        fn broadcast(&self, change: &ChangeSet) {
            self.sent.lock().push(change.clone());
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Fails the first `failures` connects, then hands out `handle`
    struct ScriptedTransport {
        failures: usize,
        attempts: AtomicUsize,
        handle: Arc<RecordingHandle>,
        feed: Mutex<Option<mpsc::UnboundedReceiver<TransportMessage>>>,
        /// Runs inside `connect` just before the connection is returned
        on_connect: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl ScriptedTransport {
        fn new(failures: usize) -> (Arc<Self>, mpsc::UnboundedSender<TransportMessage>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                failures,
                attempts: AtomicUsize::new(0),
                handle: Arc::new(RecordingHandle::default()),
                feed: Mutex::new(Some(rx)),
                on_connect: Mutex::new(None),
            });
            (transport, tx)
        }
    }

    #[async_trait]
    impl CollaborationTransport for ScriptedTransport {
        async fn connect(
            &self,
            _document: &DocumentId,
            _user: &UserInfo,
        ) -> Result<TransportConnection, TransportError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(TransportError::ConnectFailed(format!("attempt {attempt}")));
            }
            let incoming = self
                .feed
                .lock()
                .take()
                .ok_or_else(|| TransportError::ConnectFailed("feed used".into()))?;
            let hook = self.on_connect.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            let handle: Arc<dyn TransportHandle> = self.handle.clone();
            Ok(TransportConnection { handle, incoming })
        }
    }

    fn session(transport: Arc<ScriptedTransport>) -> (CollaborationSession, crate::events::EventReceiver) {
        let (tx, rx) = event_channel();
        let session = CollaborationSession::new(
            "doc".into(),
            UserInfo::new("alice", "Alice"),
            transport,
            BackoffConfig::default(),
            tx,
        );
        (session, rx)
    }

    async fn next_failure(rx: &mut crate::events::EventReceiver) -> (u32, Duration) {
        loop {
            match rx.recv().await {
                Some(SessionEvent::TransportFailed { attempt, retry_in, .. }) => {
                    return (attempt, retry_in)
                }
                Some(_) => {}
                None => panic!("event channel closed"),
            }
        }
    }

    async fn wait_connected(rx: &mut crate::events::EventReceiver) {
        loop {
            match rx.recv().await {
                Some(SessionEvent::ConnectionChanged(ConnectionState::Connected)) => return,
                Some(_) => {}
                None => panic!("event channel closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_backoff_doubles() {
        let (transport, _feed) = ScriptedTransport::new(4);
        let (session, mut rx) = session(Arc::clone(&transport));
        session.connect();

        let mut delays = Vec::new();
        for _ in 0..4 {
            delays.push(next_failure(&mut rx).await);
        }
        assert_eq!(
            delays,
            vec![
                (0, Duration::from_millis(500)),
                (1, Duration::from_millis(1_000)),
                (2, Duration::from_millis(2_000)),
                (3, Duration::from_millis(4_000)),
            ]
        );

        wait_connected(&mut rx).await;
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_backoff() {
        let (transport, _feed) = ScriptedTransport::new(usize::MAX);
        let (session, mut rx) = session(Arc::clone(&transport));
        session.connect();

        next_failure(&mut rx).await;
        session.disconnect();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_messages_and_broadcasts_while_connected() {
        let (transport, feed) = ScriptedTransport::new(0);
        let (session, mut rx) = session(Arc::clone(&transport));

        let change = ChangeSet::builder().remove_node("n1").build();
        assert!(!session.broadcast(&change));

        session.connect();
        wait_connected(&mut rx).await;
        assert!(session.broadcast(&change));
        assert_eq!(transport.handle.sent.lock().len(), 1);

        feed.send(TransportMessage::Peers(vec![Peer::new("bob", "Bob")]))
            .unwrap();
        feed.send(TransportMessage::RemoteChange(change.clone()))
            .unwrap();
        assert!(matches!(rx.recv().await, Some(SessionEvent::PeersChanged(p)) if p.len() == 1));
        assert!(matches!(rx.recv().await, Some(SessionEvent::RemoteChange(c)) if c == change));
        assert_eq!(session.peers().len(), 1);

        session.disconnect();
        assert_eq!(transport.handle.disconnects.load(Ordering::SeqCst), 1);
        assert!(!session.broadcast(&change));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_close_triggers_reconnect() {
        let (transport, feed) = ScriptedTransport::new(0);
        let (session, mut rx) = session(Arc::clone(&transport));
        session.connect();
        wait_connected(&mut rx).await;

        feed.send(TransportMessage::Closed(None)).unwrap();
        let (attempt, retry_in) = next_failure(&mut rx).await;
        assert_eq!((attempt, retry_in), (0, Duration::from_millis(500)));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(transport.handle.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_racing_a_finished_connect_closes_it() {
        let (transport, _feed) = ScriptedTransport::new(0);
        let (session, mut rx) = session(Arc::clone(&transport));
        let session = Arc::new(session);
        let leaving = Arc::clone(&session);
        *transport.on_connect.lock() = Some(Box::new(move || leaving.disconnect()));

        session.connect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.handle.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(!session.broadcast(&ChangeSet::builder().remove_node("n1").build()));
        while let Ok(event) = rx.try_recv() {
            assert!(
                !matches!(event, SessionEvent::ConnectionChanged(ConnectionState::Connected)),
                "reported connected after disconnect"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_after_disconnect_works() {
        let (transport, _feed) = ScriptedTransport::new(1);
        let (session, mut rx) = session(Arc::clone(&transport));
        session.connect();
        next_failure(&mut rx).await;
        session.disconnect();

        session.connect();
        wait_connected(&mut rx).await;
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
    }
}
