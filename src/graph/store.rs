//! In-memory graph storage
//!
//! Nodes are addressed by dense ids and by their natural key; edges are
//! unique per `(source, type, target)` triple. Nodes are append-only, edges
//! may only be removed by an explicit reconciliation pass.

use super::edge::{Edge, STALE_PROPERTY};
use super::node::Node;
use super::property::{PropertyMap, PropertyValue};
use super::types::{Direction, EdgeId, EdgeType, Label, NodeId};
use crate::schema::{NodeKind, RelType, SchemaError, SchemaRegistry};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("{label} '{key}' not found")]
    NodeNotFound { label: NodeKind, key: String },

    #[error("Node {0} not found")]
    NodeIdNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),

    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] SchemaError),

    #[error("{kind} '{key}': lastUpdated {incoming} is older than stored {current}")]
    StaleNodeUpdate {
        kind: NodeKind,
        key: String,
        current: i64,
        incoming: i64,
    },

    #[error("Graph lock poisoned by a failed writer")]
    LockPoisoned,
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Outcome of a match-or-create write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome<I> {
    Created(I),
    Updated(I),
    /// Matched an existing element with identical properties
    Unchanged(I),
}

impl<I: Copy> UpsertOutcome<I> {
    pub fn id(&self) -> I {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) | UpsertOutcome::Unchanged(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Attribute whose value may never move backwards for one node
const MONOTONIC_TIMESTAMP: &str = "lastUpdated";

type TripleKey = (NodeId, EdgeType, NodeId);

/// In-memory graph storage
///
/// - nodes: NodeId -> Node (dense, append-only)
/// - edges: EdgeId -> Edge (None once removed by reconciliation)
/// - outgoing / incoming: adjacency lists in insertion order
/// - key_index: (kind, natural key) -> NodeId
/// - triple_index: (source, type, target) -> EdgeId
///
/// Label and type indices keep insertion order so scans are deterministic.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    edges: Vec<Option<Edge>>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    key_index: FxHashMap<(NodeKind, String), NodeId>,
    label_index: FxHashMap<Label, Vec<NodeId>>,
    triple_index: FxHashMap<TripleKey, EdgeId>,
    edge_type_index: FxHashMap<EdgeType, Vec<EdgeId>>,
    live_edges: usize,
    /// Incremented by every mutation
    version: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutation counter; two snapshots with equal versions hold equal graphs
    pub fn version(&self) -> u64 {
        self.version
    }

    // ============================================================
    // Nodes
    // ============================================================

    /// Create or merge a node keyed by its natural key
    ///
    /// Properties are validated against the schema first; an existing node
    /// has the incoming attributes merged over its own.
    pub fn upsert_node(&mut self, kind: NodeKind, properties: PropertyMap) -> GraphResult<UpsertOutcome<NodeId>> {
        let key = SchemaRegistry::validate_node(kind, &properties)?;

        if let Some(&id) = self.key_index.get(&(kind, key.clone())) {
            let node = &mut self.nodes[id.index()];
            if let (Some(current), Some(incoming)) = (
                node.get_property(MONOTONIC_TIMESTAMP).and_then(PropertyValue::as_datetime),
                properties.get(MONOTONIC_TIMESTAMP).and_then(PropertyValue::as_datetime),
            ) {
                if incoming < current {
                    return Err(GraphError::StaleNodeUpdate { kind, key, current, incoming });
                }
            }
            return Ok(if node.merge_properties(properties) {
                self.version += 1;
                UpsertOutcome::Updated(id)
            } else {
                UpsertOutcome::Unchanged(id)
            });
        }

        let id = NodeId::new(self.nodes.len() as u64);
        let node = Node::new(id, kind, key.clone(), properties);
        for label in &node.labels {
            self.label_index.entry(label.clone()).or_default().push(id);
        }
        self.key_index.insert((kind, key), id);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.version += 1;
        Ok(UpsertOutcome::Created(id))
    }

    /// Required lookup by natural key
    pub fn get_node(&self, kind: NodeKind, key: &str) -> GraphResult<&Node> {
        self.find_node(kind, key).ok_or_else(|| GraphError::NodeNotFound {
            label: kind,
            key: key.to_string(),
        })
    }

    /// Optional lookup by natural key
    pub fn find_node(&self, kind: NodeKind, key: &str) -> Option<&Node> {
        self.key_index
            .get(&(kind, key.trim().to_string()))
            .map(|id| &self.nodes[id.index()])
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.get_node_by_id(id).ok_or(GraphError::NodeIdNotFound(id))
    }

    pub fn get_node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes of one kind in ingestion order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.get_nodes_by_label(&Label::new(kind.label()))
    }

    /// All nodes carrying a label in ingestion order
    pub fn get_nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        self.label_index
            .get(label)
            .map(|ids| ids.iter().map(|id| &self.nodes[id.index()]).collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ============================================================
    // Edges
    // ============================================================

    /// Match-or-create the edge for `(source, rel, target)`
    ///
    /// A matched edge has its property set replaced in place (last writer
    /// wins); identical properties leave it untouched.
    pub fn upsert_edge(
        &mut self,
        source: NodeId,
        rel: RelType,
        target: NodeId,
        properties: PropertyMap,
    ) -> GraphResult<UpsertOutcome<EdgeId>> {
        let source_kind = self
            .get_node_by_id(source)
            .ok_or(GraphError::InvalidEdgeSource(source))?
            .kind;
        let target_kind = self
            .get_node_by_id(target)
            .ok_or(GraphError::InvalidEdgeTarget(target))?
            .kind;
        SchemaRegistry::validate_edge(rel, source_kind, target_kind, &properties)?;

        let edge_type = rel.edge_type();
        let triple = (source, edge_type.clone(), target);
        if let Some(&id) = self.triple_index.get(&triple) {
            let edge = self.edges[id.index()]
                .as_mut()
                .ok_or(GraphError::EdgeNotFound(id))?;
            return Ok(if edge.replace_properties(properties) {
                self.version += 1;
                UpsertOutcome::Updated(id)
            } else {
                UpsertOutcome::Unchanged(id)
            });
        }

        let id = EdgeId::new(self.edges.len() as u64);
        self.edges.push(Some(Edge::new(id, source, target, edge_type.clone(), properties)));
        self.outgoing[source.index()].push(id);
        self.incoming[target.index()].push(id);
        self.edge_type_index.entry(edge_type).or_default().push(id);
        self.triple_index.insert(triple, id);
        self.live_edges += 1;
        self.version += 1;
        Ok(UpsertOutcome::Created(id))
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index()).and_then(Option::as_ref)
    }

    /// The unique edge for a triple, if materialised
    pub fn find_edge(&self, source: NodeId, rel: RelType, target: NodeId) -> Option<&Edge> {
        self.triple_index
            .get(&(source, rel.edge_type(), target))
            .and_then(|id| self.get_edge(*id))
    }

    /// Edges touching `node`, optionally restricted to one type
    pub fn get_edges(&self, node: NodeId, edge_type: Option<&EdgeType>, direction: Direction) -> Vec<&Edge> {
        let idx = node.index();
        let lists: [Option<&Vec<EdgeId>>; 2] = match direction {
            Direction::Outgoing => [self.outgoing.get(idx), None],
            Direction::Incoming => [self.incoming.get(idx), None],
            Direction::Both => [self.outgoing.get(idx), self.incoming.get(idx)],
        };
        lists
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|id| self.get_edge(*id))
            .filter(|edge| edge_type.map_or(true, |t| &edge.edge_type == t))
            .collect()
    }

    /// All edges of one type in creation order
    pub fn get_edges_by_type(&self, edge_type: &EdgeType) -> Vec<&Edge> {
        self.edge_type_index
            .get(edge_type)
            .map(|ids| ids.iter().filter_map(|id| self.get_edge(*id)).collect())
            .unwrap_or_default()
    }

    /// Mark an edge as no longer desired without removing it
    ///
    /// Returns false when the edge was already flagged.
    pub fn flag_edge_stale(&mut self, id: EdgeId) -> GraphResult<bool> {
        let edge = self
            .edges
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::EdgeNotFound(id))?;
        if edge.is_stale() {
            return Ok(false);
        }
        let mut properties = edge.properties.clone();
        properties.insert(STALE_PROPERTY.to_string(), PropertyValue::Boolean(true));
        edge.replace_properties(properties);
        self.version += 1;
        Ok(true)
    }

    /// Remove an edge and all index entries pointing at it
    pub fn remove_edge(&mut self, id: EdgeId) -> GraphResult<Edge> {
        let edge = self
            .edges
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(GraphError::EdgeNotFound(id))?;
        self.triple_index
            .remove(&(edge.source, edge.edge_type.clone(), edge.target));
        if let Some(ids) = self.edge_type_index.get_mut(&edge.edge_type) {
            ids.retain(|&eid| eid != id);
        }
        self.outgoing[edge.source.index()].retain(|&eid| eid != id);
        self.incoming[edge.target.index()].retain(|&eid| eid != id);
        self.live_edges -= 1;
        self.version += 1;
        Ok(edge)
    }

    pub fn edge_count(&self) -> usize {
        self.live_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::property::props;
    use chrono::{TimeZone, Utc};

    fn company(name: &str) -> PropertyMap {
        props([
            ("companyName", PropertyValue::from(name)),
            ("sector", PropertyValue::from("steel")),
        ])
    }

    fn indicator(name: &str) -> PropertyMap {
        props([
            ("indicatorName", PropertyValue::from(name)),
            ("value", PropertyValue::Float(3.5)),
        ])
    }

    fn exposure(level: &str) -> PropertyMap {
        props([("exposureLevel", level), ("riskType", "interest_rate")])
    }

    #[test]
    fn test_upsert_node_creates_then_merges() {
        let mut store = GraphStore::new();
        let created = store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap();
        assert!(created.is_created());

        let again = store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap();
        assert_eq!(again, UpsertOutcome::Unchanged(created.id()));

        let mut changed = company("Acme");
        changed.insert("revenue".to_string(), PropertyValue::Integer(100));
        let updated = store.upsert_node(NodeKind::SubjectCompany, changed).unwrap();
        assert_eq!(updated, UpsertOutcome::Updated(created.id()));
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.get_node(NodeKind::SubjectCompany, "Acme").unwrap().number("revenue"), Some(100.0));
    }

    #[test]
    fn test_company_name_unique_per_variant() {
        let mut store = GraphStore::new();
        let subject = store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap().id();
        let reference = store.upsert_node(NodeKind::ReferenceCompany, company("Acme")).unwrap().id();
        assert_ne!(subject, reference);
        assert_eq!(store.get_nodes_by_label(&Label::new("Company")).len(), 2);
    }

    #[test]
    fn test_get_node_missing_is_not_found() {
        let store = GraphStore::new();
        assert_eq!(
            store.get_node(NodeKind::MacroIndicator, "base rate").unwrap_err(),
            GraphError::NodeNotFound {
                label: NodeKind::MacroIndicator,
                key: "base rate".to_string()
            }
        );
        assert!(store.find_node(NodeKind::MacroIndicator, "base rate").is_none());
    }

    #[test]
    fn test_last_updated_is_monotonic() {
        let mut store = GraphStore::new();
        let t1 = Utc.with_ymd_and_hms(2025, 8, 13, 0, 0, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 8, 12, 0, 0, 0).unwrap();

        let mut first = indicator("base rate");
        first.insert("lastUpdated".to_string(), t1.into());
        store.upsert_node(NodeKind::MacroIndicator, first).unwrap();

        let mut older = indicator("base rate");
        older.insert("lastUpdated".to_string(), t0.into());
        older.insert("value".to_string(), PropertyValue::Float(9.9));
        let err = store.upsert_node(NodeKind::MacroIndicator, older).unwrap_err();
        assert!(matches!(err, GraphError::StaleNodeUpdate { .. }));
        assert_eq!(store.get_node(NodeKind::MacroIndicator, "base rate").unwrap().number("value"), Some(3.5));
    }

    #[test]
    fn test_upsert_edge_is_idempotent_per_triple() {
        let mut store = GraphStore::new();
        let c = store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap().id();
        let m = store.upsert_node(NodeKind::MacroIndicator, indicator("base rate")).unwrap().id();

        let first = store.upsert_edge(c, RelType::ExposedTo, m, exposure("HIGH")).unwrap();
        assert!(first.is_created());
        let second = store.upsert_edge(c, RelType::ExposedTo, m, exposure("HIGH")).unwrap();
        assert_eq!(second, UpsertOutcome::Unchanged(first.id()));
        let third = store.upsert_edge(c, RelType::ExposedTo, m, exposure("LOW")).unwrap();
        assert_eq!(third, UpsertOutcome::Updated(first.id()));

        assert_eq!(store.edge_count(), 1);
        let edge = store.find_edge(c, RelType::ExposedTo, m).unwrap();
        assert_eq!(edge.text("exposureLevel"), Some("LOW"));
        assert_eq!(edge.revision, 2);
    }

    #[test]
    fn test_upsert_edge_validation() {
        let mut store = GraphStore::new();
        let c = store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap().id();
        let missing = NodeId::new(99);

        assert_eq!(
            store.upsert_edge(missing, RelType::ExposedTo, c, exposure("HIGH")),
            Err(GraphError::InvalidEdgeSource(missing))
        );
        assert_eq!(
            store.upsert_edge(c, RelType::ExposedTo, missing, exposure("HIGH")),
            Err(GraphError::InvalidEdgeTarget(missing))
        );
        // company -> company is not an exposure
        let other = store.upsert_node(NodeKind::ReferenceCompany, company("Peer")).unwrap().id();
        assert!(matches!(
            store.upsert_edge(c, RelType::ExposedTo, other, exposure("HIGH")),
            Err(GraphError::SchemaViolation(_))
        ));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_adjacency_by_direction_and_type() {
        let mut store = GraphStore::new();
        let a = store.upsert_node(NodeKind::ReferenceCompany, company("A")).unwrap().id();
        let b = store.upsert_node(NodeKind::ReferenceCompany, company("B")).unwrap().id();
        let m = store.upsert_node(NodeKind::MacroIndicator, indicator("base rate")).unwrap().id();
        let competes = props([("similarityScore", 0.8)]);

        store.upsert_edge(a, RelType::CompetesWith, b, competes.clone()).unwrap();
        store.upsert_edge(b, RelType::CompetesWith, a, competes).unwrap();
        store.upsert_edge(a, RelType::ExposedTo, m, exposure("MEDIUM")).unwrap();

        assert_eq!(store.get_edges(a, None, Direction::Outgoing).len(), 2);
        assert_eq!(store.get_edges(a, None, Direction::Incoming).len(), 1);
        assert_eq!(store.get_edges(a, None, Direction::Both).len(), 3);
        let competes_type = RelType::CompetesWith.edge_type();
        assert_eq!(store.get_edges(a, Some(&competes_type), Direction::Both).len(), 2);
        assert_eq!(store.get_edges(m, None, Direction::Incoming).len(), 1);
        assert_eq!(store.get_edges_by_type(&competes_type).len(), 2);
    }

    #[test]
    fn test_flag_and_remove_edge() {
        let mut store = GraphStore::new();
        let c = store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap().id();
        let m = store.upsert_node(NodeKind::MacroIndicator, indicator("base rate")).unwrap().id();
        let id = store.upsert_edge(c, RelType::ExposedTo, m, exposure("HIGH")).unwrap().id();

        assert!(store.flag_edge_stale(id).unwrap());
        assert!(!store.flag_edge_stale(id).unwrap());
        assert!(store.get_edge(id).unwrap().is_stale());

        // a fresh upsert replaces the property set and clears the flag
        store.upsert_edge(c, RelType::ExposedTo, m, exposure("HIGH")).unwrap();
        assert!(!store.get_edge(id).unwrap().is_stale());

        let removed = store.remove_edge(id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(store.edge_count(), 0);
        assert!(store.find_edge(c, RelType::ExposedTo, m).is_none());
        assert!(store.get_edges(c, None, Direction::Outgoing).is_empty());
        assert_eq!(store.remove_edge(id).unwrap_err(), GraphError::EdgeNotFound(id));

        let recreated = store.upsert_edge(c, RelType::ExposedTo, m, exposure("LOW")).unwrap();
        assert!(recreated.is_created());
        assert_ne!(recreated.id(), id);
    }

    #[test]
    fn test_version_tracks_mutations_only() {
        let mut store = GraphStore::new();
        let v0 = store.version();
        store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap();
        let v1 = store.version();
        assert!(v1 > v0);
        store.upsert_node(NodeKind::SubjectCompany, company("Acme")).unwrap();
        assert_eq!(store.version(), v1);
    }
}
