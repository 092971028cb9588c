//! Editing session
//!
//! [`EditorSession`] owns the local graph and is the only thing that mutates
//! it. Local operations go through `&mut self`; remote input is folded in by
//! [`EditorSession::next_event`], so the graph never needs a lock.

use crate::autosave::{AutoSavePipeline, SaveOutcome};
use crate::collaboration::CollaborationSession;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{event_channel, ConnectionState, EventReceiver, SessionEvent};
use crate::generation::Generator;
use crate::persistence::Persistence;
use crate::transport::CollaborationTransport;
use crate::types::{DocumentId, Peer, UserInfo, Version, VersionId, VersionMeta};
use crate::versioning::VersioningService;
use std::collections::HashSet;
use std::sync::Arc;
use vcg_graph::{
    ChangeSet, Edge, EdgeId, EdgeKind, Graph, GraphDiff, GraphError, GraphStore, Node, NodeId,
    NodePatch, Position, RemovedNode,
};
use vcg_merge::{GeneratedSubgraph, GenerationMerger, GenerationPlan, LaneLayout, MergeEngine};

/// One user's editing context for one document
///
/// Local edits are synchronous but schedule auto-save on the current Tokio
/// runtime; called outside one they still apply and broadcast, and the
/// change waits for the next flush.
pub struct EditorSession {
    config: SessionConfig,
    document: DocumentId,
    user: UserInfo,
    store: GraphStore,
    dragging: HashSet<NodeId>,
    merge: MergeEngine,
    generation: GenerationMerger,
    autosave: AutoSavePipeline,
    versions: VersioningService,
    collaboration: CollaborationSession,
    events: EventReceiver,
    closed: bool,
}

impl EditorSession {
    /// Load the document and join its collaboration room
    ///
    /// # Errors
    /// - `SessionError::Config` if `config` is invalid
    /// - `SessionError::Persistence` / `Versioning` if loading fails
    pub async fn open(
        config: SessionConfig,
        document: DocumentId,
        user: UserInfo,
        persistence: Arc<dyn Persistence>,
        transport: Arc<dyn CollaborationTransport>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let (tx, rx) = event_channel();

        let graph = persistence
            .load_current(&document)
            .await?
            .unwrap_or_default();
        let versions = VersioningService::open(
            document.clone(),
            Some(user.id.clone()),
            Arc::clone(&persistence),
        )
        .await?;

        let autosave = AutoSavePipeline::new(
            document.clone(),
            persistence,
            config.autosave_debounce(),
            tx.clone(),
        );
        autosave.set_baseline(&graph);

        let collaboration = CollaborationSession::new(
            document.clone(),
            user.clone(),
            transport,
            config.backoff.clone(),
            tx,
        );
        collaboration.connect();

        tracing::info!(
            document = %document,
            user = %user.id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            versions = versions.list().len(),
            "editor session opened"
        );

        Ok(Self {
            generation: GenerationMerger::with_layout(
                LaneLayout::default().with_column_width(config.lane_column_width),
            ),
            config,
            document,
            user,
            store: GraphStore::from_graph(graph),
            dragging: HashSet::new(),
            merge: MergeEngine::new(),
            autosave,
            versions,
            collaboration,
            events: rx,
            closed: false,
        })
    }

    // --- accessors ---

    #[inline]
    #[must_use]
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    #[inline]
    #[must_use]
    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph {
        self.store.graph()
    }

    /// Independent copy for exporters and renderers
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Graph {
        self.store.snapshot()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.collaboration.state()
    }

    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.collaboration.peers()
    }

    #[must_use]
    pub fn is_dragging(&self, id: &NodeId) -> bool {
        self.dragging.contains(id)
    }

    /// Whether the graph differs from the last auto-save
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty(self.store.graph())
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // --- local edits ---

    /// # Errors
    /// - `GraphError::DuplicateNode` if the id is taken
    pub fn add_node(&mut self, node: Node) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.store.add_node(node.clone())?;
        self.commit(ChangeSet::builder().upsert_node(node).build());
        Ok(())
    }

    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn update_node(&mut self, id: &NodeId, patch: &NodePatch) -> Result<Node, SessionError> {
        self.ensure_open()?;
        let node = self.store.update_node(id, patch)?.clone();
        self.commit(ChangeSet::builder().upsert_node(node.clone()).build());
        Ok(node)
    }

    /// Reposition a node
    ///
    /// While the node is being dragged the move stays local; the final
    /// position goes out with [`EditorSession::end_drag`].
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<(), SessionError> {
        self.ensure_open()?;
        let node = self.store.move_node(id, position)?.clone();
        if !self.dragging.contains(id) {
            self.commit(ChangeSet::builder().upsert_node(node).build());
        }
        Ok(())
    }

    /// Remove a node and its edges
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn remove_node(&mut self, id: &NodeId) -> Result<RemovedNode, SessionError> {
        self.ensure_open()?;
        let removed = self.store.remove_node(id)?;
        self.dragging.remove(id);

        let mut change = ChangeSet::builder().remove_node(id.clone());
        for edge in &removed.edges {
            change = change.remove_edge(edge.id.clone());
        }
        self.commit(change.build());
        Ok(removed)
    }

    /// # Errors
    /// - `GraphError::DanglingEndpoint` / `DuplicateEdge`
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.store.add_edge(edge.clone())?;
        self.commit(ChangeSet::builder().upsert_edge(edge).build());
        Ok(())
    }

    /// Link two nodes with a fresh edge
    ///
    /// # Errors
    /// - `GraphError::DanglingEndpoint` if either node is absent
    pub fn connect(&mut self, source: &NodeId, target: &NodeId, kind: EdgeKind) -> Result<Edge, SessionError> {
        self.ensure_open()?;
        let edge = self.store.connect(source, target, kind)?;
        self.commit(ChangeSet::builder().upsert_edge(edge.clone()).build());
        Ok(edge)
    }

    /// # Errors
    /// - `GraphError::EdgeNotFound` if the id is absent
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, SessionError> {
        self.ensure_open()?;
        let edge = self.store.remove_edge(id)?;
        self.commit(ChangeSet::builder().remove_edge(id.clone()).build());
        Ok(edge)
    }

    /// Start dragging; remote updates keep this node's local position
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn begin_drag(&mut self, id: &NodeId) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.store.graph().contains_node(id.as_str()) {
            return Err(GraphError::NodeNotFound(id.clone()).into());
        }
        self.dragging.insert(id.clone());
        Ok(())
    }

    /// Stop dragging and publish the final position
    ///
    /// Returns `false` if the node was not being dragged.
    pub fn end_drag(&mut self, id: &NodeId) -> bool {
        if !self.dragging.remove(id) {
            return false;
        }
        if let Some(node) = self.store.node(id.as_str()).cloned() {
            self.commit(ChangeSet::builder().upsert_node(node).build());
        }
        true
    }

    // --- asynchronous input ---

    /// Wait for the next session event
    ///
    /// Remote change-sets are merged before this returns, so the caller
    /// sees [`SessionEvent::RemoteMerged`] rather than the raw change.
    /// Returns `None` once the session is disposed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.closed {
            return None;
        }
        let event = self.events.recv().await?;
        Some(self.handle_event(event))
    }

    /// Non-blocking variant of [`EditorSession::next_event`]
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        if self.closed {
            return None;
        }
        let event = self.events.try_recv().ok()?;
        Some(self.handle_event(event))
    }

    fn handle_event(&mut self, event: SessionEvent) -> SessionEvent {
        match event {
            SessionEvent::RemoteChange(change) => {
                let report = self
                    .merge
                    .merge_into(&mut self.store, &change, &self.dragging);
                // Nodes removed remotely cannot stay in the drag set
                let store = &self.store;
                self.dragging
                    .retain(|node| store.graph().contains_node(node.as_str()));
                SessionEvent::RemoteMerged(report)
            }
            SessionEvent::ConnectionChanged(ConnectionState::Connected) => {
                if self.config.resync_on_reconnect && !self.store.graph().is_empty() {
                    let full = ChangeSet::from_graph(self.store.graph());
                    tracing::debug!(document = %self.document, ops = full.len(), "resyncing peers");
                    self.collaboration.broadcast(&full);
                }
                SessionEvent::ConnectionChanged(ConnectionState::Connected)
            }
            other => other,
        }
    }

    // --- versions ---

    /// Create a named version of the current graph
    ///
    /// # Errors
    /// - `SessionError::Versioning` if persisting fails
    pub async fn save_version(&mut self, name: Option<&str>) -> Result<Version, SessionError> {
        self.ensure_open()?;
        let graph = self.store.snapshot();
        Ok(self.versions.save(&graph, name).await?)
    }

    #[must_use]
    pub fn list_versions(&self) -> Vec<VersionMeta> {
        self.versions.list()
    }

    #[must_use]
    pub fn current_version(&self) -> Option<&VersionMeta> {
        self.versions.current()
    }

    /// Replace the graph with a version and publish the difference
    ///
    /// Returns the change-set that was broadcast.
    ///
    /// # Errors
    /// - `SessionError::Versioning` for unknown ids or load failures
    pub async fn restore_version(&mut self, id: &VersionId) -> Result<ChangeSet, SessionError> {
        self.ensure_open()?;
        let previous = self.store.snapshot();
        let restored = self.versions.restore(id, &mut self.store).await?;

        let store = &self.store;
        self.dragging
            .retain(|node| store.graph().contains_node(node.as_str()));

        let change = ChangeSet::between(&previous, &restored);
        self.commit(change.clone());
        Ok(change)
    }

    /// # Errors
    /// - `SessionError::Versioning` for unknown ids or load failures
    pub async fn diff_versions(&mut self, a: &VersionId, b: &VersionId) -> Result<GraphDiff, SessionError> {
        Ok(self.versions.diff(a, b).await?)
    }

    // --- generation ---

    /// Add a generated subgraph and publish what was added
    ///
    /// # Errors
    /// - `SessionError::Closed` after dispose
    pub fn merge_generated(&mut self, generated: &GeneratedSubgraph) -> Result<GenerationPlan, SessionError> {
        self.ensure_open()?;
        let plan = self.generation.plan(self.store.graph(), generated);
        self.generation.apply(&mut self.store, &plan);
        self.commit(plan.change_set.clone());
        Ok(plan)
    }

    /// Ask `generator` for a subgraph and merge it
    ///
    /// # Errors
    /// - `SessionError::Generation` if the generator fails; a malformed
    ///   payload is not an error and merges as empty
    pub async fn generate(&mut self, prompt: &str, generator: &dyn Generator) -> Result<GenerationPlan, SessionError> {
        self.ensure_open()?;
        let payload = generator.generate(prompt).await?;
        let generated = GeneratedSubgraph::from_value(&payload);
        self.merge_generated(&generated)
    }

    // --- lifecycle ---

    /// Save the current graph now, bypassing the debounce
    pub async fn flush(&self) -> SaveOutcome {
        self.autosave.flush(self.store.snapshot()).await
    }

    /// Flush pending changes, then dispose
    pub async fn close(&mut self) -> SaveOutcome {
        let outcome = if self.closed {
            SaveOutcome::Discarded
        } else {
            self.flush().await
        };
        self.dispose();
        outcome
    }

    /// Cancel the auto-save timer and leave the room
    ///
    /// Work still in flight completes but its results are discarded.
    pub fn dispose(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.autosave.dispose();
        self.collaboration.disconnect();
        self.dragging.clear();
        tracing::info!(document = %self.document, user = %self.user.id, "editor session disposed");
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn commit(&mut self, change: ChangeSet) {
        if change.is_empty() {
            return;
        }
        self.autosave.notify_change(self.store.snapshot());
        self.collaboration.broadcast(&change);
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("document", &self.document)
            .field("user", &self.user.id)
            .field("nodes", &self.store.node_count())
            .field("edges", &self.store.edge_count())
            .field("dragging", &self.dragging)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
