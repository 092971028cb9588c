//! Generated subgraph payloads
//!
//! Generators return loosely structured JSON. Parsing here never fails:
//! missing collections are empty and entries that do not deserialize are
//! skipped with a warning.

use serde::Deserialize;
use serde_json::{Map, Value};
use vcg_graph::{Attributes, EdgeId, EdgeKind, NodeData, NodeId, NodeKind, Position};

/// Node proposed by a generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedNode {
    pub id: Option<NodeId>,
    pub kind: NodeKind,
    pub position: Option<Position>,
    pub data: NodeData,
}

impl GeneratedNode {
    /// Node without id or position
    #[must_use]
    pub fn new(kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            position: None,
            data: NodeData::labeled(label),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }
}

/// Edge proposed by a generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEdge {
    pub id: Option<EdgeId>,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub label: Option<String>,
}

impl GeneratedEdge {
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Plain,
            label: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Subgraph returned by a generator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedSubgraph {
    pub nodes: Vec<GeneratedNode>,
    pub edges: Vec<GeneratedEdge>,
}

impl GeneratedSubgraph {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_node(mut self, node: GeneratedNode) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn with_edge(mut self, edge: GeneratedEdge) -> Self {
        self.edges.push(edge);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Parse a generator payload leniently
    ///
    /// Accepts `{ "nodes": [...], "edges": [...] }`. Anything else yields an
    /// empty subgraph.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            tracing::warn!("generated payload is not an object; treating as empty");
            return Self::default();
        };

        let nodes = entries(root, "nodes")
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| parse_node(i, entry))
            .collect();
        let edges = entries(root, "edges")
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| parse_edge(i, entry))
            .collect();

        Self { nodes, edges }
    }

    /// Parse raw JSON text; invalid JSON yields an empty subgraph
    #[must_use]
    pub fn from_json_str(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                tracing::warn!(error = %e, "generated payload is not valid JSON");
                Self::default()
            }
        }
    }
}

fn entries<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    match root.get(key) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!(key, found = type_name(other), "expected array in generated payload");
            &[]
        }
        None => &[],
    }
}

/// Node entry as generators send it
#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    data: Option<RawNodeData>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNodeData {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    attributes: Attributes,
}

/// Edge entry as generators send it
#[derive(Debug, Deserialize)]
struct RawEdge {
    #[serde(default)]
    id: Option<String>,
    source: String,
    target: String,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

fn parse_node(index: usize, entry: &Value) -> Option<GeneratedNode> {
    let raw: RawNode = match serde_json::from_value(entry.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(index, error = %e, "skipping malformed generated node");
            return None;
        }
    };

    let id = non_blank(raw.id);
    let kind = match non_blank(raw.type_name).or_else(|| non_blank(raw.kind)) {
        Some(name) => name.parse::<NodeKind>().unwrap_or_else(|_| {
            tracing::warn!(index, kind = %name, "unknown generated node kind; using primary");
            NodeKind::Primary
        }),
        None => {
            tracing::warn!(index, "generated node without kind; using primary");
            NodeKind::Primary
        }
    };

    let data = raw.data.unwrap_or_default();
    let label = non_blank(data.label)
        .or_else(|| non_blank(raw.label))
        .or_else(|| id.clone())
        .unwrap_or_default();
    let description = non_blank(data.description).or_else(|| non_blank(raw.description));

    Some(GeneratedNode {
        id: id.map(NodeId::from),
        kind,
        position: raw.position,
        data: NodeData {
            label,
            description,
            attributes: data.attributes,
        },
    })
}

fn parse_edge(index: usize, entry: &Value) -> Option<GeneratedEdge> {
    let raw: RawEdge = match serde_json::from_value(entry.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(index, error = %e, "skipping malformed generated edge");
            return None;
        }
    };
    let (Some(source), Some(target)) = (non_blank(Some(raw.source)), non_blank(Some(raw.target)))
    else {
        tracing::warn!(index, "skipping generated edge with blank source/target");
        return None;
    };

    let kind = non_blank(raw.type_name)
        .or_else(|| non_blank(raw.kind))
        .and_then(|name| name.parse().ok())
        .unwrap_or_default();

    Some(GeneratedEdge {
        id: non_blank(raw.id).map(EdgeId::from),
        source: NodeId::from(source),
        target: NodeId::from(target),
        kind,
        label: non_blank(raw.label),
    })
}

/// Blank strings count as missing
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
