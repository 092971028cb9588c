//! Conflict policy trait and the last-writer-wins policy
//!
//! Provides the [`ConflictPolicy`] trait that decides what a remote upsert
//! turns into when it meets the local copy of the same entity.

use vcg_graph::{Edge, Node};

/// Per-entity conflict resolution for remote upserts
///
/// # Contract
/// Resolution must be a pure function of its inputs so that merging the
/// same change-set twice yields the same graph.
pub trait ConflictPolicy: Send + Sync + std::fmt::Debug {
    /// Resolve an incoming remote node
    ///
    /// `dragging` is true when the local user is actively repositioning
    /// this node.
    fn resolve_node(&self, local: Option<&Node>, remote: &Node, dragging: bool) -> Node;

    /// Resolve an incoming remote edge
    fn resolve_edge(&self, local: Option<&Edge>, remote: &Edge) -> Edge;

    /// Policy name (for logging)
    fn name(&self) -> &'static str;
}

/// Last-writer-wins by arrival order
///
/// # Characteristics
/// - No clocks: whatever arrives last at this client replaces the local value
/// - Nodes under a local drag keep their local position; every other field
///   is taken from the remote copy
/// - Replicas can diverge permanently on concurrent edits to the same field
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriterWins;

impl LastWriterWins {
    /// Create new policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConflictPolicy for LastWriterWins {
    fn resolve_node(&self, local: Option<&Node>, remote: &Node, dragging: bool) -> Node {
        match local {
            Some(local) if dragging => Node {
                position: local.position,
                ..remote.clone()
            },
            _ => remote.clone(),
        }
    }

    fn resolve_edge(&self, _local: Option<&Edge>, remote: &Edge) -> Edge {
        remote.clone()
    }

    fn name(&self) -> &'static str {
        "last_writer_wins"
    }
}
