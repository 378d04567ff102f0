//! Concurrent access to one graph
//!
//! Writers are serialised by a single lock, so two upserts of the same
//! `(source, type, target)` triple can never race into parallel edges; the
//! later one simply overwrites the properties. Readers clone an `Arc` of the
//! current store and keep querying that snapshot while writers move on.

use super::node::Node;
use super::property::PropertyMap;
use super::store::{GraphError, GraphResult, GraphStore, UpsertOutcome};
use super::types::{EdgeId, NodeId};
use crate::schema::{NodeKind, RelType};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct SharedGraph {
    inner: RwLock<Arc<GraphStore>>,
}

impl SharedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable view of the graph as of now
    pub fn snapshot(&self) -> GraphResult<Arc<GraphStore>> {
        let guard = self.inner.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Run `f` with exclusive access
    ///
    /// The store is cloned only if a reader still holds the current snapshot.
    pub fn write<T>(&self, f: impl FnOnce(&mut GraphStore) -> GraphResult<T>) -> GraphResult<T> {
        let mut guard = self.inner.write().map_err(|_| GraphError::LockPoisoned)?;
        f(Arc::make_mut(&mut guard))
    }

    pub fn upsert_node(&self, kind: NodeKind, properties: PropertyMap) -> GraphResult<UpsertOutcome<NodeId>> {
        self.write(|store| store.upsert_node(kind, properties))
    }

    pub fn upsert_edge(
        &self,
        source: NodeId,
        rel: RelType,
        target: NodeId,
        properties: PropertyMap,
    ) -> GraphResult<UpsertOutcome<EdgeId>> {
        self.write(|store| store.upsert_edge(source, rel, target, properties))
    }

    pub fn flag_edge_stale(&self, id: EdgeId) -> GraphResult<bool> {
        self.write(|store| store.flag_edge_stale(id))
    }

    pub fn remove_edge(&self, id: EdgeId) -> GraphResult<()> {
        self.write(|store| store.remove_edge(id).map(|_| ()))
    }

    /// Owned copy of a node, for callers that do not want a whole snapshot
    pub fn get_node(&self, kind: NodeKind, key: &str) -> GraphResult<Node> {
        self.snapshot()?.get_node(kind, key).cloned()
    }

    pub fn version(&self) -> GraphResult<u64> {
        Ok(self.snapshot()?.version())
    }
}
