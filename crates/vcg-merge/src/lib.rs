//! VCG Merge
//!
//! Folding foreign content into the local graph: change-sets broadcast by
//! peers and subgraphs proposed by a generator.
//!
//! # Core Concepts
//!
//! - [`MergeEngine`]: Applies a remote [`ChangeSet`](vcg_graph::ChangeSet) with drag awareness
//! - [`ConflictPolicy`]: Per-entity resolution; [`LastWriterWins`] ships by default
//! - [`GenerationMerger`]: Additive merge of a [`GeneratedSubgraph`] with id remapping
//! - [`LaneLayout`]: Kind-based default positions for generated nodes
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use vcg_graph::{ChangeSet, Graph, Node, NodeKind};
//! use vcg_merge::MergeEngine;
//!
//! let local = Graph::from_parts([Node::new("company", NodeKind::External, "ACME")], []);
//! let remote = ChangeSet::builder()
//!     .upsert_node(Node::new("n1", NodeKind::Primary, "Logistics"))
//!     .build();
//!
//! let merged = MergeEngine::new().merge(&local, &remote, &HashSet::new());
//! assert_eq!(merged.node_count(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod generated;
mod generation;
mod layout;
mod policy;

// Re-exports
pub use engine::{MergeEngine, MergeReport};
pub use generated::{GeneratedEdge, GeneratedNode, GeneratedSubgraph};
pub use generation::{GenerationMerger, GenerationPlan};
pub use layout::{Lane, LaneCursor, LaneLayout};
pub use policy::{ConflictPolicy, LastWriterWins};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
