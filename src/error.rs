//! Engine-level errors
//!
//! Every analytical response distinguishes "no data" (an empty result or an
//! explicit insufficient-sample outcome) from a computation error, which is
//! always an [`EngineError`].

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::schema::{NodeKind, RelType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A required node is absent
    #[error("{kind} '{key}' not found")]
    NotFound { kind: NodeKind, key: String },

    /// A field needed by one computation is missing or unusable
    #[error("{entity}: attribute {attribute} {reason}")]
    InvalidAttribute {
        entity: String,
        attribute: String,
        reason: String,
    },

    /// A write lost against another writer for the same tuple
    #[error("Concurrent write conflict on {source_key} -[{rel}]-> {target_key}")]
    ConcurrentWriteConflict {
        source_key: String,
        rel: RelType,
        target_key: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl EngineError {
    pub fn missing_attribute(entity: impl Into<String>, attribute: &str) -> Self {
        EngineError::InvalidAttribute {
            entity: entity.into(),
            attribute: attribute.to_string(),
            reason: "is required for this computation".to_string(),
        }
    }

    /// True for errors that mean "the thing asked about does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound { .. } | EngineError::Graph(GraphError::NodeNotFound { .. })
        )
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// One entity that could not be processed inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub kind: NodeKind,
    pub key: String,
    pub error: String,
}

impl EntityFailure {
    pub fn new(kind: NodeKind, key: impl Into<String>, error: &EngineError) -> Self {
        EntityFailure {
            kind,
            key: key.into(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}): {}", self.kind, self.key, self.error)
    }
}
