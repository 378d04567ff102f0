//! Core graph implementation
//!
//! This module implements the property graph data model with:
//! - Nodes keyed by kind and natural key, carrying labels and properties
//! - Directed, scored edges, at most one per (source, type, target)
//! - Hash-based indices for key, label, type and triple lookups
//! - Snapshot reads and serialised writes through [`SharedGraph`]
//! - Bounded, cycle-safe path enumeration

pub mod edge;
pub mod node;
pub mod property;
pub mod shared;
pub mod store;
pub mod traversal;
pub mod types;

// Re-export main types
pub use edge::{Edge, STALE_PROPERTY};
pub use node::Node;
pub use property::{props, PropertyMap, PropertyValue};
pub use shared::SharedGraph;
pub use store::{GraphError, GraphResult, GraphStore, UpsertOutcome};
pub use traversal::{AcceptAll, HopClass, Path, Traversal, TraversalStep};
pub use types::{Direction, EdgeId, EdgeType, Label, NodeId};
