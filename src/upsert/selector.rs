//! Explicit entity sets for recompute requests

use crate::error::{EngineError, EntityFailure};
use crate::graph::{GraphStore, Node, PropertyValue};
use crate::schema::NodeKind;
use serde::{Deserialize, Serialize};

/// Which nodes of one kind a request applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "select", rename_all = "snake_case")]
pub enum EntitySelector {
    All { kind: NodeKind },
    Keys { kind: NodeKind, keys: Vec<String> },
    AttributeEquals {
        kind: NodeKind,
        attribute: String,
        value: PropertyValue,
    },
}

impl EntitySelector {
    pub fn all(kind: NodeKind) -> Self {
        EntitySelector::All { kind }
    }

    pub fn keys<S: Into<String>>(kind: NodeKind, keys: impl IntoIterator<Item = S>) -> Self {
        EntitySelector::Keys {
            kind,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn attribute_equals(kind: NodeKind, attribute: &str, value: impl Into<PropertyValue>) -> Self {
        EntitySelector::AttributeEquals {
            kind,
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            EntitySelector::All { kind }
            | EntitySelector::Keys { kind, .. }
            | EntitySelector::AttributeEquals { kind, .. } => *kind,
        }
    }

    /// Matching nodes in ingestion order (explicit keys keep request order)
    ///
    /// Explicit keys that do not exist come back as failures rather than
    /// aborting the resolution.
    pub fn resolve<'g>(&self, store: &'g GraphStore) -> (Vec<&'g Node>, Vec<EntityFailure>) {
        match self {
            EntitySelector::All { kind } => (store.nodes_of_kind(*kind), Vec::new()),
            EntitySelector::Keys { kind, keys } => {
                let mut nodes: Vec<&Node> = Vec::with_capacity(keys.len());
                let mut failures = Vec::new();
                for key in keys {
                    match store.find_node(*kind, key) {
                        Some(node) if !nodes.iter().any(|n| n.id == node.id) => nodes.push(node),
                        Some(_) => {}
                        None => {
                            let err = EngineError::NotFound {
                                kind: *kind,
                                key: key.clone(),
                            };
                            failures.push(EntityFailure::new(*kind, key.as_str(), &err));
                        }
                    }
                }
                (nodes, failures)
            }
            EntitySelector::AttributeEquals {
                kind,
                attribute,
                value,
            } => {
                let nodes = store
                    .nodes_of_kind(*kind)
                    .into_iter()
                    .filter(|node| attribute_matches(node.get_property(attribute), value))
                    .collect();
                (nodes, Vec::new())
            }
        }
    }
}

/// Strings compare case-insensitively, numbers by value
fn attribute_matches(actual: Option<&PropertyValue>, expected: &PropertyValue) -> bool {
    match (actual, expected) {
        (Some(PropertyValue::String(a)), PropertyValue::String(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (Some(a), b) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (None, _) => false,
    }
}
