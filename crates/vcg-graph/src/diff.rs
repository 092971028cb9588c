//! Structural diff between two graphs
//!
//! Set difference on ids, field-level comparison on ids present in both.

use crate::model::{Edge, EdgeId, Graph, Node, NodeId};
use serde::{Deserialize, Serialize};

/// Node field that differs between two graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    Kind,
    Position,
    Label,
    Description,
    Attributes,
}

/// Edge field that differs between two graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeField {
    Source,
    Target,
    Kind,
    Label,
}

/// A node present in both graphs with differing fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChange {
    pub id: NodeId,
    pub fields: Vec<NodeField>,
}

/// An edge present in both graphs with differing fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeChange {
    pub id: EdgeId,
    pub fields: Vec<EdgeField>,
}

/// Difference from graph `a` to graph `b`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDiff {
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub modified_nodes: Vec<NodeChange>,
    pub added_edges: Vec<EdgeId>,
    pub removed_edges: Vec<EdgeId>,
    pub modified_edges: Vec<EdgeChange>,
}

impl GraphDiff {
    /// Compute the difference `a -> b`
    ///
    /// All id lists come out sorted because graph maps are ordered.
    #[must_use]
    pub fn between(a: &Graph, b: &Graph) -> Self {
        let mut diff = Self::default();

        for (id, node_b) in b.nodes.iter() {
            match a.node(id.as_str()) {
                None => diff.added_nodes.push(id.clone()),
                Some(node_a) => {
                    let fields = node_fields(node_a, node_b);
                    if !fields.is_empty() {
                        diff.modified_nodes.push(NodeChange {
                            id: id.clone(),
                            fields,
                        });
                    }
                }
            }
        }
        diff.removed_nodes = a
            .nodes
            .keys()
            .filter(|id| !b.contains_node(id.as_str()))
            .cloned()
            .collect();

        for (id, edge_b) in b.edges.iter() {
            match a.edge(id.as_str()) {
                None => diff.added_edges.push(id.clone()),
                Some(edge_a) => {
                    let fields = edge_fields(edge_a, edge_b);
                    if !fields.is_empty() {
                        diff.modified_edges.push(EdgeChange {
                            id: id.clone(),
                            fields,
                        });
                    }
                }
            }
        }
        diff.removed_edges = a
            .edges
            .keys()
            .filter(|id| !b.contains_edge(id.as_str()))
            .cloned()
            .collect();

        diff
    }

    /// True when both graphs are structurally equal
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.modified_edges.is_empty()
    }
}

fn node_fields(a: &Node, b: &Node) -> Vec<NodeField> {
    let mut fields = Vec::new();
    if a.kind != b.kind {
        fields.push(NodeField::Kind);
    }
    if a.position != b.position {
        fields.push(NodeField::Position);
    }
    if a.data.label != b.data.label {
        fields.push(NodeField::Label);
    }
    if a.data.description != b.data.description {
        fields.push(NodeField::Description);
    }
    if a.data.attributes != b.data.attributes {
        fields.push(NodeField::Attributes);
    }
    fields
}

fn edge_fields(a: &Edge, b: &Edge) -> Vec<EdgeField> {
    let mut fields = Vec::new();
    if a.source != b.source {
        fields.push(EdgeField::Source);
    }
    if a.target != b.target {
        fields.push(EdgeField::Target);
    }
    if a.kind != b.kind {
        fields.push(EdgeField::Kind);
    }
    if a.label != b.label {
        fields.push(EdgeField::Label);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, NodeKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_graphs_have_empty_diff() {
        let g = Graph::from_parts([Node::new("a", NodeKind::Primary, "A")], []);
        assert!(GraphDiff::between(&g, &g).is_empty());
    }

    #[test]
    fn diff_reports_set_and_field_changes() {
        let a = Graph::from_parts(
            [
                Node::new("keep", NodeKind::Primary, "Keep"),
                Node::new("gone", NodeKind::Support, "Gone"),
            ],
            [Edge::new("e1", "keep", "gone")],
        );
        let b = Graph::from_parts(
            [
                Node::new("keep", NodeKind::Metric, "Kept")
                    .with_position(10.0, 0.0)
                    .with_attribute("unit", "t"),
                Node::new("new", NodeKind::External, "New"),
            ],
            [Edge::new("e2", "keep", "new").with_kind(EdgeKind::Weighted)],
        );

        let diff = GraphDiff::between(&a, &b);
        assert_eq!(
            diff,
            GraphDiff {
                added_nodes: vec!["new".into()],
                removed_nodes: vec!["gone".into()],
                modified_nodes: vec![NodeChange {
                    id: "keep".into(),
                    fields: vec![
                        NodeField::Kind,
                        NodeField::Position,
                        NodeField::Label,
                        NodeField::Attributes
                    ],
                }],
                added_edges: vec!["e2".into()],
                removed_edges: vec!["e1".into()],
                modified_edges: vec![],
            }
        );
    }

    #[test]
    fn diff_detects_edge_field_changes() {
        let nodes = [
            Node::new("a", NodeKind::Primary, "A"),
            Node::new("b", NodeKind::Primary, "B"),
        ];
        let a = Graph::from_parts(nodes.clone(), [Edge::new("e", "a", "b")]);
        let b = Graph::from_parts(nodes, [Edge::new("e", "b", "a").with_label("return")]);

        let diff = GraphDiff::between(&a, &b);
        assert_eq!(
            diff.modified_edges,
            vec![EdgeChange {
                id: "e".into(),
                fields: vec![EdgeField::Source, EdgeField::Target, EdgeField::Label],
            }]
        );
    }
}
