//! Value-chain graph data model
//!
//! Provides [`Node`], [`Edge`] and [`Graph`] plus their identifier and kind
//! types. Maps are persistent ([`im::OrdMap`]) so that cloning a graph is
//! cheap and iteration order is canonical.

use crate::error::FingerprintError;
use crate::fingerprint::Fingerprint;
use im::OrdMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Arbitrary node attributes (ordered for canonical serialization)
pub type Attributes = BTreeMap<String, Value>;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, globally unique identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), Ulid::new().to_string().to_lowercase()))
            }

            /// Identifier as string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (treated as "missing")
            #[inline]
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique node identifier within a graph
    NodeId,
    "node"
);

string_id!(
    /// Unique edge identifier within a graph
    EdgeId,
    "edge"
);

/// Closed set of value-chain node kinds
///
/// Everything that depends on the kind (lane layout, palette) matches on
/// this enum exhaustively, so adding a kind is a compile-time change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Primary activity (inbound logistics, operations, ...)
    Primary,
    /// Support activity (HR, procurement, ...)
    Support,
    /// External party (suppliers, customers, the company itself)
    External,
    /// Measured indicator
    Metric,
    /// Target or milestone
    Milestone,
    /// Consumed or produced resource
    Resource,
}

impl NodeKind {
    /// All kinds, in declaration order
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Primary,
        NodeKind::Support,
        NodeKind::External,
        NodeKind::Metric,
        NodeKind::Milestone,
        NodeKind::Resource,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Support => "support",
            Self::External => "external",
            Self::Metric => "metric",
            Self::Milestone => "milestone",
            Self::Resource => "resource",
        }
    }

    /// Palette color used by overview renderers (minimap and legend)
    #[inline]
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Primary => "#2563eb",
            Self::Support => "#16a34a",
            Self::External => "#9333ea",
            Self::Metric => "#ea580c",
            Self::Milestone => "#dc2626",
            Self::Resource => "#0891b2",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "support" => Ok(Self::Support),
            "external" => Ok(Self::External),
            "metric" => Ok(Self::Metric),
            "milestone" => Ok(Self::Milestone),
            "resource" => Ok(Self::Resource),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

/// Closed set of edge kinds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Solid line
    #[default]
    Plain,
    /// Dashed line
    Dashed,
    /// Line carrying a weight
    Weighted,
    /// Arrow heads on both ends
    Bidirectional,
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "default" => Ok(Self::Plain),
            "dashed" => Ok(Self::Dashed),
            "weighted" => Ok(Self::Weighted),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(format!("unknown edge kind: {other}")),
        }
    }
}

/// Canvas position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Node payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl NodeData {
    #[inline]
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Graph vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Create node at the origin
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            data: NodeData::labeled(label),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.data.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.attributes.insert(key.into(), value.into());
        self
    }

    /// Label shortcut
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.data.label
    }
}

/// Graph link between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    /// Create a plain edge
    #[must_use]
    pub fn new(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Plain,
            label: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether either endpoint is `node`
    #[inline]
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

/// Partial node update
///
/// `None` fields are left untouched. Attributes are merged key by key;
/// a `Value::Null` attribute removes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub kind: Option<NodeKind>,
    pub position: Option<Position>,
    pub label: Option<String>,
    pub description: Option<Option<String>>,
    pub attributes: Attributes,
}

impl NodePatch {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[inline]
    #[must_use]
    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    #[inline]
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    #[inline]
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// True when applying the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.position.is_none()
            && self.label.is_none()
            && self.description.is_none()
            && self.attributes.is_empty()
    }

    /// Apply to a node in place
    pub fn apply(&self, node: &mut Node) {
        if let Some(kind) = self.kind {
            node.kind = kind;
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(label) = &self.label {
            node.data.label.clone_from(label);
        }
        if let Some(description) = &self.description {
            node.data.description.clone_from(description);
        }
        for (key, value) in &self.attributes {
            if value.is_null() {
                node.data.attributes.remove(key);
            } else {
                node.data.attributes.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Axis-aligned extent of node positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Node/edge graph
///
/// # Invariants (at rest)
/// - ids are unique (map keys)
/// - every edge endpoint references an existing node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: OrdMap<NodeId, Node>,
    #[serde(default)]
    pub edges: OrdMap<EdgeId, Edge>,
}

impl Graph {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from node and edge lists (later duplicates win)
    #[must_use]
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            edges: edges.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    #[must_use]
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    #[inline]
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[inline]
    #[must_use]
    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Ids of edges with `node` as source or target
    #[must_use]
    pub fn edges_touching(&self, node: &NodeId) -> Vec<EdgeId> {
        self.edges
            .values()
            .filter(|e| e.touches(node))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Ids of edges referencing a missing node
    #[must_use]
    pub fn dangling_edges(&self) -> Vec<EdgeId> {
        self.edges
            .values()
            .filter(|e| !self.contains_node(e.source.as_str()) || !self.contains_node(e.target.as_str()))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Remove every dangling edge, returning what was removed
    pub fn prune_dangling_edges(&mut self) -> Vec<Edge> {
        let dangling = self.dangling_edges();
        let mut pruned = Vec::with_capacity(dangling.len());
        for id in dangling {
            if let Some(edge) = self.edges.remove(id.as_str()) {
                tracing::debug!(edge = %edge.id, source = %edge.source, target = %edge.target, "pruned dangling edge");
                pruned.push(edge);
            }
        }
        pruned
    }

    /// Remove a node and every edge touching it
    ///
    /// Returns `None` if the node is absent (edges are left untouched).
    pub fn remove_node_cascade(&mut self, id: &NodeId) -> Option<(Node, Vec<Edge>)> {
        let node = self.nodes.remove(id.as_str())?;
        let edges = self
            .edges_touching(id)
            .into_iter()
            .filter_map(|edge_id| self.edges.remove(edge_id.as_str()))
            .collect();
        Some((node, edges))
    }

    /// Check the at-rest invariants
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.nodes.iter().all(|(k, n)| k == &n.id)
            && self.edges.iter().all(|(k, e)| k == &e.id)
            && self.dangling_edges().is_empty()
    }

    /// Extent of node positions (`None` for an empty graph)
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.nodes.values().map(|n| n.position);
        let first = iter.next()?;
        let init = Bounds {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
        }))
    }

    /// Content fingerprint over the canonical JSON encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn fingerprint(&self) -> Result<Fingerprint, FingerprintError> {
        Fingerprint::of_serializable(self)
    }
}
