//! Change-sets: the unit of broadcast and merge
//!
//! A [`ChangeSet`] batches node/edge upserts and removals. Local edits are
//! recorded as change-sets and broadcast; remote change-sets are folded in
//! by the merge engine.

use crate::model::{Edge, EdgeId, Graph, Node, NodeId};
use serde::{Deserialize, Serialize};

/// Batch of upserts and removals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    #[serde(default)]
    pub nodes_upserted: Vec<Node>,
    #[serde(default)]
    pub nodes_removed: Vec<NodeId>,
    #[serde(default)]
    pub edges_upserted: Vec<Edge>,
    #[serde(default)]
    pub edges_removed: Vec<EdgeId>,
}

impl ChangeSet {
    /// Empty change-set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder
    #[inline]
    #[must_use]
    pub fn builder() -> ChangeSetBuilder {
        ChangeSetBuilder::new()
    }

    /// Full-state change-set: upserts every node and edge of `graph`
    ///
    /// Used to resync peers after a reconnect.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes_upserted: graph.nodes.values().cloned().collect(),
            edges_upserted: graph.edges.values().cloned().collect(),
            ..Self::default()
        }
    }

    /// Change-set that turns `from` into `to` when merged
    ///
    /// Only added or modified entities are upserted.
    #[must_use]
    pub fn between(from: &Graph, to: &Graph) -> Self {
        let nodes_upserted = to
            .nodes
            .values()
            .filter(|n| from.node(n.id.as_str()) != Some(*n))
            .cloned()
            .collect();
        let nodes_removed = from
            .nodes
            .keys()
            .filter(|id| !to.contains_node(id.as_str()))
            .cloned()
            .collect();
        let edges_upserted = to
            .edges
            .values()
            .filter(|e| from.edge(e.id.as_str()) != Some(*e))
            .cloned()
            .collect();
        let edges_removed = from
            .edges
            .keys()
            .filter(|id| !to.contains_edge(id.as_str()))
            .cloned()
            .collect();

        Self {
            nodes_upserted,
            nodes_removed,
            edges_upserted,
            edges_removed,
        }
    }

    /// True if nothing would change
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes_upserted.is_empty()
            && self.nodes_removed.is_empty()
            && self.edges_upserted.is_empty()
            && self.edges_removed.is_empty()
    }

    /// Total number of operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes_upserted.len()
            + self.nodes_removed.len()
            + self.edges_upserted.len()
            + self.edges_removed.len()
    }

    /// Whether `node` is upserted or removed by this change-set
    #[must_use]
    pub fn touches_node(&self, node: &NodeId) -> bool {
        self.nodes_upserted.iter().any(|n| &n.id == node) || self.nodes_removed.contains(node)
    }

    /// Append another change-set (operations keep their order)
    pub fn extend(&mut self, other: ChangeSet) {
        self.nodes_upserted.extend(other.nodes_upserted);
        self.nodes_removed.extend(other.nodes_removed);
        self.edges_upserted.extend(other.edges_upserted);
        self.edges_removed.extend(other.edges_removed);
    }
}

/// Builder for constructing change-sets
#[derive(Debug, Default)]
pub struct ChangeSetBuilder {
    inner: ChangeSet,
}

impl ChangeSetBuilder {
    /// Create new builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn upsert_node(mut self, node: Node) -> Self {
        self.inner.nodes_upserted.push(node);
        self
    }

    #[inline]
    #[must_use]
    pub fn remove_node(mut self, id: impl Into<NodeId>) -> Self {
        self.inner.nodes_removed.push(id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn upsert_edge(mut self, edge: Edge) -> Self {
        self.inner.edges_upserted.push(edge);
        self
    }

    #[inline]
    #[must_use]
    pub fn remove_edge(mut self, id: impl Into<EdgeId>) -> Self {
        self.inner.edges_removed.push(id.into());
        self
    }

    /// Build change-set
    #[inline]
    #[must_use]
    pub fn build(self) -> ChangeSet {
        self.inner
    }
}
