//! VCG Graph
//!
//! Value-chain graph model with an in-memory store and change-set support.
//!
//! # Core Concepts
//!
//! - [`Graph`]: Nodes and edges keyed by id (persistent ordered maps)
//! - [`GraphStore`]: Canonical local graph; synchronous, no I/O
//! - [`ChangeSet`]: Batch of upserts/removals, the unit of broadcast and merge
//! - [`Fingerprint`]: Blake3 digest of a graph's canonical encoding
//! - [`GraphDiff`]: Field-level difference between two graphs
//!
//! # Example
//!
//! ```rust
//! use vcg_graph::{Edge, GraphStore, Node, NodeKind};
//!
//! let mut store = GraphStore::new();
//! store.add_node(Node::new("company", NodeKind::External, "ACME")).unwrap();
//! store.add_node(Node::new("n1", NodeKind::Primary, "Logistics")).unwrap();
//! store.add_edge(Edge::new("e1", "company", "n1")).unwrap();
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.edge_count(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod change_set;
mod diff;
mod error;
mod fingerprint;
mod model;
mod store;

// Re-exports
pub use change_set::{ChangeSet, ChangeSetBuilder};
pub use diff::{EdgeChange, EdgeField, GraphDiff, NodeChange, NodeField};
pub use error::{FingerprintError, GraphError};
pub use fingerprint::Fingerprint;
pub use model::{
    Attributes, Bounds, Edge, EdgeId, EdgeKind, Graph, Node, NodeData, NodeId, NodeKind,
    NodePatch, Position,
};
pub use store::{GraphStore, RemovedNode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn local_edits_round_trip_through_change_set() {
        let mut store = GraphStore::new();
        store
            .add_node(Node::new("company", NodeKind::External, "ACME"))
            .unwrap();
        let before = store.snapshot();

        store
            .add_node(Node::new("n1", NodeKind::Primary, "Logistics"))
            .unwrap();
        store
            .connect(&"company".into(), &"n1".into(), EdgeKind::Plain)
            .unwrap();
        let after = store.snapshot();

        let cs = ChangeSet::between(&before, &after);
        assert_eq!(cs.nodes_upserted.len(), 1);
        assert_eq!(cs.edges_upserted.len(), 1);

        let diff = GraphDiff::between(&before, &after);
        assert_eq!(diff.added_nodes, vec![NodeId::from("n1")]);
        assert_ne!(before.fingerprint().unwrap(), after.fingerprint().unwrap());
    }
}
