//! Remote change-set merge engine
//!
//! Folds a change-set received from a peer into the local graph.

use crate::policy::{ConflictPolicy, LastWriterWins};
use std::collections::HashSet;
use vcg_graph::{ChangeSet, EdgeId, Graph, GraphStore, NodeId};

/// What a merge did to the local graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Nodes inserted or replaced
    pub nodes_upserted: Vec<NodeId>,
    /// Nodes that were present and got removed
    pub nodes_removed: Vec<NodeId>,
    /// Edges inserted or replaced (some may be pruned afterwards)
    pub edges_upserted: Vec<EdgeId>,
    /// Edges removed explicitly or by node cascade
    pub edges_removed: Vec<EdgeId>,
    /// Edges dropped by the post-pass because an endpoint was missing
    pub edges_pruned: Vec<EdgeId>,
    /// Dragged nodes whose local position was kept
    pub positions_preserved: Vec<NodeId>,
    /// Whether the graph differs from before the merge
    pub changed: bool,
}

/// Merges remote change-sets into the local graph
///
/// # Algorithm
/// 1. node upserts, resolved through the [`ConflictPolicy`]
/// 2. node removals (cascading to touching edges)
/// 3. edge upserts (union by id; endpoint checks deferred)
/// 4. edge removals
/// 5. prune every edge with a missing endpoint
///
/// Idempotent for a fixed change-set and drag state.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine<P: ConflictPolicy = LastWriterWins> {
    policy: P,
}

impl MergeEngine<LastWriterWins> {
    /// Create engine with last-writer-wins policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: LastWriterWins,
        }
    }
}

impl<P: ConflictPolicy> MergeEngine<P> {
    /// Create engine with custom policy
    #[inline]
    #[must_use]
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Merge into a copy of `local`
    #[must_use]
    pub fn merge(&self, local: &Graph, remote: &ChangeSet, drag_state: &HashSet<NodeId>) -> Graph {
        let mut store = GraphStore::from_graph(local.clone());
        self.merge_into(&mut store, remote, drag_state);
        store.into_graph()
    }

    /// Merge into the store in place
    pub fn merge_into(
        &self,
        store: &mut GraphStore,
        remote: &ChangeSet,
        drag_state: &HashSet<NodeId>,
    ) -> MergeReport {
        let before = store.snapshot();
        let mut report = MergeReport::default();

        for remote_node in &remote.nodes_upserted {
            let dragging = drag_state.contains(&remote_node.id);
            let local = store.node(remote_node.id.as_str());
            if dragging && local.is_some() {
                report.positions_preserved.push(remote_node.id.clone());
            }
            let resolved = self.policy.resolve_node(local, remote_node, dragging);
            store.upsert_node(resolved);
            report.nodes_upserted.push(remote_node.id.clone());
        }

        for id in &remote.nodes_removed {
            if let Ok(removed) = store.remove_node(id) {
                report.nodes_removed.push(removed.node.id);
                report
                    .edges_removed
                    .extend(removed.edges.into_iter().map(|e| e.id));
            }
        }

        for remote_edge in &remote.edges_upserted {
            let resolved = self
                .policy
                .resolve_edge(store.edge(remote_edge.id.as_str()), remote_edge);
            store.upsert_edge(resolved);
            report.edges_upserted.push(remote_edge.id.clone());
        }

        for id in &remote.edges_removed {
            if let Ok(edge) = store.remove_edge(id) {
                report.edges_removed.push(edge.id);
            }
        }

        report.edges_pruned = store
            .prune_dangling_edges()
            .into_iter()
            .map(|e| e.id)
            .collect();

        report.changed = store.graph() != &before;

        tracing::debug!(
            policy = self.policy.name(),
            upserted = report.nodes_upserted.len(),
            removed = report.nodes_removed.len(),
            pruned = report.edges_pruned.len(),
            preserved = report.positions_preserved.len(),
            changed = report.changed,
            "merged remote change-set"
        );

        report
    }
}
