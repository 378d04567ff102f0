//! Node implementation for the risk graph
//!
//! Every node belongs to exactly one [`NodeKind`] and is identified within
//! that kind by its natural key (companyName, indicatorName, ...). Company
//! variants additionally carry the shared `Company` label.

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use crate::schema::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A node in the property graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Store-local identifier
    pub id: NodeId,

    /// Schema kind of this node
    pub kind: NodeKind,

    /// Natural key value, unique per kind
    pub key: String,

    /// Labels (primary kind label plus any shared labels)
    pub labels: BTreeSet<Label>,

    /// Attribute bag supplied by ingestion
    pub properties: PropertyMap,

    /// Incremented whenever an upsert changes the attribute bag
    pub revision: u64,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, key: impl Into<String>, properties: PropertyMap) -> Self {
        let labels = kind.labels().iter().map(|l| Label::new(*l)).collect();
        Node {
            id,
            kind,
            key: key.into(),
            labels,
            properties,
            revision: 1,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Numeric attribute, `None` when absent, null or non-numeric
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(PropertyValue::as_number)
    }

    /// Text attribute, `None` when absent or not a string
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_string)
    }

    /// Merge `incoming` into the attribute bag; returns whether anything changed
    pub(crate) fn merge_properties(&mut self, incoming: PropertyMap) -> bool {
        let mut changed = false;
        for (key, value) in incoming {
            if self.properties.get(&key) != Some(&value) {
                self.properties.insert(key, value);
                changed = true;
            }
        }
        if changed {
            self.revision += 1;
        }
        changed
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
