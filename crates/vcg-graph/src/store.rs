//! In-memory graph store
//!
//! [`GraphStore`] owns the canonical local graph. Every operation is
//! synchronous and touches nothing but the in-memory maps.

use crate::error::GraphError;
use crate::model::{Edge, EdgeId, EdgeKind, Graph, Node, NodeId, NodePatch, Position};

/// Node removed together with its cascaded edges
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: Node,
    pub edges: Vec<Edge>,
}

/// Canonical local graph
///
/// # Invariants
/// - node/edge ids unique
/// - after any public operation except [`GraphStore::upsert_edge`], no edge
///   references a missing node
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store holding `graph`
    #[inline]
    #[must_use]
    pub fn from_graph(graph: Graph) -> Self {
        Self { graph }
    }

    /// Borrow current graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.graph.node(id)
    }

    #[inline]
    #[must_use]
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.graph.edge(id)
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Insert a new node
    ///
    /// # Errors
    /// - `GraphError::DuplicateNode` if the id is taken
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.graph.contains_node(node.id.as_str()) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.graph.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert or replace a node, returning the previous value
    pub fn upsert_node(&mut self, node: Node) -> Option<Node> {
        self.graph.nodes.insert(node.id.clone(), node)
    }

    /// Apply a partial update
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn update_node(&mut self, id: &NodeId, patch: &NodePatch) -> Result<&Node, GraphError> {
        let node = self
            .graph
            .nodes
            .get_mut(id.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        patch.apply(node);
        Ok(node)
    }

    /// Reposition a node
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<&Node, GraphError> {
        let node = self
            .graph
            .nodes
            .get_mut(id.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.position = position;
        Ok(node)
    }

    /// Remove a node and every edge whose source or target is that node
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the id is absent
    pub fn remove_node(&mut self, id: &NodeId) -> Result<RemovedNode, GraphError> {
        let (node, edges) = self
            .graph
            .remove_node_cascade(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        Ok(RemovedNode { node, edges })
    }

    /// Insert a new edge between existing nodes
    ///
    /// # Errors
    /// - `GraphError::DanglingEndpoint` if source or target is absent
    /// - `GraphError::DuplicateEdge` if the id is taken
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        self.check_endpoints(&edge)?;
        if self.graph.contains_edge(edge.id.as_str()) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        self.graph.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    /// Insert or replace an edge without checking endpoints
    ///
    /// Callers must follow up with [`GraphStore::prune_dangling_edges`]
    /// before the store is observed at rest.
    pub fn upsert_edge(&mut self, edge: Edge) -> Option<Edge> {
        self.graph.edges.insert(edge.id.clone(), edge)
    }

    /// Remove an edge
    ///
    /// # Errors
    /// - `GraphError::EdgeNotFound` if the id is absent
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, GraphError> {
        self.graph
            .edges
            .remove(id.as_str())
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))
    }

    /// Create an edge with a fresh id between two existing nodes
    ///
    /// # Errors
    /// - `GraphError::DanglingEndpoint` if source or target is absent
    pub fn connect(
        &mut self,
        source: &NodeId,
        target: &NodeId,
        kind: EdgeKind,
    ) -> Result<Edge, GraphError> {
        let edge = Edge::new(EdgeId::generate(), source.clone(), target.clone()).with_kind(kind);
        self.add_edge(edge.clone())?;
        Ok(edge)
    }

    /// Drop edges referencing missing nodes
    pub fn prune_dangling_edges(&mut self) -> Vec<Edge> {
        self.graph.prune_dangling_edges()
    }

    /// Independent copy of the current graph
    ///
    /// Persistent maps make this O(1); later mutations never show through.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Graph {
        self.graph.clone()
    }

    /// Consume the store, yielding its graph
    #[inline]
    #[must_use]
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Overwrite the whole graph, returning the previous one
    pub fn replace(&mut self, graph: Graph) -> Graph {
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "replacing graph"
        );
        std::mem::replace(&mut self.graph, graph)
    }

    fn check_endpoints(&self, edge: &Edge) -> Result<(), GraphError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.graph.contains_node(endpoint.as_str()) {
                return Err(GraphError::DanglingEndpoint {
                    edge: edge.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        Ok(())
    }
}

impl From<Graph> for GraphStore {
    fn from(graph: Graph) -> Self {
        Self::from_graph(graph)
    }
}
