//! Edge implementation for the risk graph
//!
//! Edges are directed and unique per `(source, type, target)` triple; the
//! store enforces that invariant, the edge itself only tracks how often its
//! properties were rewritten.

use super::property::{PropertyMap, PropertyValue};
use super::types::{EdgeId, EdgeType, NodeId};
use serde::{Deserialize, Serialize};

/// Property key marking an edge whose inclusion predicate no longer holds
pub const STALE_PROPERTY: &str = "stale";

/// A directed, scored relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Store-local identifier
    pub id: EdgeId,

    /// Source node (edge goes FROM this node)
    pub source: NodeId,

    /// Target node (edge goes TO this node)
    pub target: NodeId,

    /// Relationship type
    pub edge_type: EdgeType,

    /// Score and qualitative metadata
    pub properties: PropertyMap,

    /// Starts at 1, incremented by each in-place property rewrite
    pub revision: u64,
}

impl Edge {
    pub fn new(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
        properties: PropertyMap,
    ) -> Self {
        Edge {
            id,
            source,
            target,
            edge_type: edge_type.into(),
            properties,
            revision: 1,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(PropertyValue::as_number)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_string)
    }

    /// True once reconciliation has flagged the edge as no longer desired
    pub fn is_stale(&self) -> bool {
        self.properties
            .get(STALE_PROPERTY)
            .and_then(PropertyValue::as_boolean)
            .unwrap_or(false)
    }

    /// The node on the other side of `node`, if the edge touches it
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.source == node {
            Some(self.target)
        } else if self.target == node {
            Some(self.source)
        } else {
            None
        }
    }

    /// Replace the property set; returns false when nothing changed
    pub(crate) fn replace_properties(&mut self, properties: PropertyMap) -> bool {
        if self.properties == properties {
            return false;
        }
        self.properties = properties;
        self.revision += 1;
        true
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
