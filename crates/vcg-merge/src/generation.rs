//! Generated-subgraph integration
//!
//! [`GenerationMerger`] folds a [`GeneratedSubgraph`] into an existing graph
//! without overwriting anything already there.

use crate::generated::GeneratedSubgraph;
use crate::layout::{LaneCursor, LaneLayout};
use std::collections::{BTreeMap, HashSet};
use vcg_graph::{ChangeSet, Edge, EdgeId, Graph, GraphStore, Node, NodeId};

/// Result of planning a generated merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationPlan {
    /// Purely additive change-set (no removals)
    pub change_set: ChangeSet,
    /// Generated ids that were replaced by fresh ones
    pub id_remap: BTreeMap<NodeId, NodeId>,
    /// Generated edges dropped because an endpoint was unknown
    pub dropped_edges: Vec<(NodeId, NodeId)>,
}

impl GenerationPlan {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.change_set.is_empty()
    }
}

/// Merges generated subgraphs into the current graph
///
/// # Guarantees
/// - existing nodes and edges are never overwritten or removed
/// - every node id is unique after the merge
/// - no dangling edge is introduced
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationMerger {
    layout: LaneLayout,
}

impl GenerationMerger {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_layout(layout: LaneLayout) -> Self {
        Self { layout }
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &LaneLayout {
        &self.layout
    }

    /// Work out which nodes and edges to add
    #[must_use]
    pub fn plan(&self, current: &Graph, generated: &GeneratedSubgraph) -> GenerationPlan {
        let mut plan = GenerationPlan::default();
        let mut cursor = LaneCursor::new(self.layout, current);
        let mut taken_nodes: HashSet<NodeId> = HashSet::new();
        // Generated ids as they appear in the payload, mapped to final ids
        let mut resolved: BTreeMap<NodeId, NodeId> = BTreeMap::new();

        for generated_node in &generated.nodes {
            let id = match &generated_node.id {
                Some(id) if !current.contains_node(id.as_str()) && !taken_nodes.contains(id) => {
                    id.clone()
                }
                _ => fresh_node_id(current, &taken_nodes),
            };

            // First occurrence of a generated id decides where edges point
            if let Some(original) = &generated_node.id {
                if !resolved.contains_key(original) {
                    resolved.insert(original.clone(), id.clone());
                    if original != &id {
                        plan.id_remap.insert(original.clone(), id.clone());
                    }
                }
            }

            let position = generated_node
                .position
                .unwrap_or_else(|| cursor.place(generated_node.kind));

            taken_nodes.insert(id.clone());
            plan.change_set.nodes_upserted.push(Node {
                id,
                kind: generated_node.kind,
                position,
                data: generated_node.data.clone(),
            });
        }

        let mut taken_edges: HashSet<EdgeId> = HashSet::new();
        for generated_edge in &generated.edges {
            let endpoint = |raw: &NodeId| -> Option<NodeId> {
                if let Some(id) = resolved.get(raw) {
                    Some(id.clone())
                } else if current.contains_node(raw.as_str()) {
                    Some(raw.clone())
                } else {
                    None
                }
            };
            let (Some(source), Some(target)) =
                (endpoint(&generated_edge.source), endpoint(&generated_edge.target))
            else {
                tracing::warn!(
                    source = %generated_edge.source,
                    target = %generated_edge.target,
                    "dropping generated edge with unknown endpoint"
                );
                plan.dropped_edges
                    .push((generated_edge.source.clone(), generated_edge.target.clone()));
                continue;
            };

            let id = match &generated_edge.id {
                Some(id) if !current.contains_edge(id.as_str()) && !taken_edges.contains(id) => {
                    id.clone()
                }
                _ => fresh_edge_id(current, &taken_edges),
            };
            taken_edges.insert(id.clone());

            plan.change_set.edges_upserted.push(Edge {
                id,
                source,
                target,
                kind: generated_edge.kind,
                label: generated_edge.label.clone(),
            });
        }

        tracing::info!(
            nodes = plan.change_set.nodes_upserted.len(),
            edges = plan.change_set.edges_upserted.len(),
            remapped = plan.id_remap.len(),
            dropped = plan.dropped_edges.len(),
            origin_x = cursor.origin_x(),
            "planned generated merge"
        );

        plan
    }

    /// Apply a plan to the store
    pub fn apply(&self, store: &mut GraphStore, plan: &GenerationPlan) {
        for node in &plan.change_set.nodes_upserted {
            store.upsert_node(node.clone());
        }
        for edge in &plan.change_set.edges_upserted {
            store.upsert_edge(edge.clone());
        }
        store.prune_dangling_edges();
    }

    /// Merge `generated` into a copy of `current`
    #[must_use]
    pub fn merge_generated(&self, current: &Graph, generated: &GeneratedSubgraph) -> Graph {
        let plan = self.plan(current, generated);
        let mut store = GraphStore::from_graph(current.clone());
        self.apply(&mut store, &plan);
        store.into_graph()
    }
}

fn fresh_node_id(current: &Graph, taken: &HashSet<NodeId>) -> NodeId {
    loop {
        let id = NodeId::generate();
        if !current.contains_node(id.as_str()) && !taken.contains(&id) {
            return id;
        }
    }
}

fn fresh_edge_id(current: &Graph, taken: &HashSet<EdgeId>) -> EdgeId {
    loop {
        let id = EdgeId::generate();
        if !current.contains_edge(id.as_str()) && !taken.contains(&id) {
            return id;
        }
    }
}
