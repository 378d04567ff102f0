//! Bounded breadth-first path enumeration
//!
//! A [`Traversal`] is a lazy iterator: each call to `next` pops one partial
//! path, expands it by one hop, and yields it. Paths come out in discovery
//! order (all 1-hop paths, then 2-hop, ...). Termination holds on cyclic
//! graphs because a path never revisits one of its own nodes and expansion
//! stops at `max_hops`.

use super::edge::Edge;
use super::node::Node;
use super::store::{GraphResult, GraphStore};
use super::types::{Direction, EdgeId, EdgeType, NodeId};
use crate::schema::RelType;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One relationship filter: which edge type may be crossed, and which way
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraversalStep {
    pub edge_type: EdgeType,
    pub direction: Direction,
}

impl TraversalStep {
    pub fn new(rel: RelType, direction: Direction) -> Self {
        TraversalStep {
            edge_type: rel.edge_type(),
            direction,
        }
    }

    pub fn outgoing(rel: RelType) -> Self {
        Self::new(rel, Direction::Outgoing)
    }

    pub fn incoming(rel: RelType) -> Self {
        Self::new(rel, Direction::Incoming)
    }

    pub fn both(rel: RelType) -> Self {
        Self::new(rel, Direction::Both)
    }
}

/// Classification of a path by length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopClass {
    /// 1 hop
    Direct,
    /// 2 hops
    Indirect,
    /// 3 or more hops
    Ripple,
}

impl HopClass {
    pub fn from_hops(hops: usize) -> Self {
        match hops {
            0 | 1 => HopClass::Direct,
            2 => HopClass::Indirect,
            _ => HopClass::Ripple,
        }
    }
}

/// A simple path: `nodes.len() == edges.len() + 1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl Path {
    fn start(origin: NodeId) -> Self {
        Path {
            nodes: vec![origin],
            edges: Vec::new(),
        }
    }

    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn hop_class(&self) -> HopClass {
        HopClass::from_hops(self.hops())
    }

    pub fn origin(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn terminal(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    fn extended(&self, edge: EdgeId, node: NodeId) -> Self {
        let mut next = self.clone();
        next.edges.push(edge);
        next.nodes.push(node);
        next
    }
}

/// Lazy path iterator returned by [`GraphStore::traverse`]
pub struct Traversal<'g, P> {
    store: &'g GraphStore,
    steps: Vec<TraversalStep>,
    max_hops: usize,
    predicate: P,
    queue: VecDeque<Path>,
    unique_nodes: bool,
    visited: FxHashSet<NodeId>,
}

impl<'g, P> Traversal<'g, P>
where
    P: FnMut(&Edge, &Node) -> bool,
{
    /// Visit every node at most once across all paths
    ///
    /// Yields a breadth-first spanning tree instead of every simple path.
    pub fn unique_nodes(mut self) -> Self {
        self.unique_nodes = true;
        self
    }

    fn expand(&mut self, path: &Path) {
        let tail = path.terminal();
        for step in &self.steps {
            for edge in self.store.get_edges(tail, Some(&step.edge_type), step.direction) {
                if edge.is_stale() {
                    continue;
                }
                let Some(next) = edge.other_end(tail) else {
                    continue;
                };
                if path.contains(next) || (self.unique_nodes && self.visited.contains(&next)) {
                    continue;
                }
                let Some(node) = self.store.get_node_by_id(next) else {
                    continue;
                };
                if !(self.predicate)(edge, node) {
                    continue;
                }
                if self.unique_nodes {
                    self.visited.insert(next);
                }
                self.queue.push_back(path.extended(edge.id, next));
            }
        }
    }
}

impl<'g, P> Iterator for Traversal<'g, P>
where
    P: FnMut(&Edge, &Node) -> bool,
{
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        while let Some(path) = self.queue.pop_front() {
            if path.hops() < self.max_hops {
                self.expand(&path);
            }
            if path.hops() > 0 {
                return Some(path);
            }
        }
        None
    }
}

/// Predicate accepting every hop
pub type AcceptAll = fn(&Edge, &Node) -> bool;

fn accept_all(_: &Edge, _: &Node) -> bool {
    true
}

impl GraphStore {
    /// Paths of 1..=max_hops edges starting at `start`
    ///
    /// Each hop crosses one edge matching any of `steps` whose far node
    /// satisfies `predicate`. Stale-flagged edges are never crossed.
    pub fn traverse<P>(
        &self,
        start: NodeId,
        steps: &[TraversalStep],
        max_hops: usize,
        predicate: P,
    ) -> GraphResult<Traversal<'_, P>>
    where
        P: FnMut(&Edge, &Node) -> bool,
    {
        self.node(start)?;
        let mut visited = FxHashSet::default();
        visited.insert(start);
        Ok(Traversal {
            store: self,
            steps: steps.to_vec(),
            max_hops,
            predicate,
            queue: VecDeque::from([Path::start(start)]),
            unique_nodes: false,
            visited,
        })
    }

    pub fn traverse_all(
        &self,
        start: NodeId,
        steps: &[TraversalStep],
        max_hops: usize,
    ) -> GraphResult<Traversal<'_, AcceptAll>> {
        self.traverse(start, steps, max_hops, accept_all as AcceptAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::property::props;
    use crate::graph::GraphError;
    use crate::schema::NodeKind;

    fn reference(store: &mut GraphStore, name: &str) -> NodeId {
        store
            .upsert_node(NodeKind::ReferenceCompany, props([("companyName", name)]))
            .unwrap()
            .id()
    }

    fn compete(store: &mut GraphStore, a: NodeId, b: NodeId) {
        let p = props([("similarityScore", 0.8)]);
        store.upsert_edge(a, RelType::CompetesWith, b, p.clone()).unwrap();
        store.upsert_edge(b, RelType::CompetesWith, a, p).unwrap();
    }

    /// a <-> b <-> c <-> d <-> a, a 4-cycle in both directions
    fn ring() -> (GraphStore, Vec<NodeId>) {
        let mut store = GraphStore::new();
        let ids: Vec<NodeId> = ["A", "B", "C", "D"].iter().map(|n| reference(&mut store, n)).collect();
        for i in 0..ids.len() {
            compete(&mut store, ids[i], ids[(i + 1) % ids.len()]);
        }
        (store, ids)
    }

    #[test]
    fn test_hop_class() {
        assert_eq!(HopClass::from_hops(1), HopClass::Direct);
        assert_eq!(HopClass::from_hops(2), HopClass::Indirect);
        assert_eq!(HopClass::from_hops(3), HopClass::Ripple);
        assert_eq!(HopClass::from_hops(7), HopClass::Ripple);
    }

    #[test]
    fn test_traversal_terminates_on_cycle_within_bound() {
        let (store, ids) = ring();
        let steps = [TraversalStep::outgoing(RelType::CompetesWith)];
        let paths: Vec<Path> = store.traverse_all(ids[0], &steps, 3).unwrap().collect();

        // 2 neighbours, then 2 continuations each, then 2 more each (no revisits)
        assert_eq!(paths.len(), 2 + 2 + 2);
        assert!(paths.iter().all(|p| p.hops() <= 3));
        assert!(paths.iter().all(|p| p.origin() == ids[0]));
        for path in &paths {
            let mut seen = path.nodes.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), path.nodes.len());
        }
    }

    #[test]
    fn test_paths_come_out_breadth_first() {
        let (store, ids) = ring();
        let steps = [TraversalStep::outgoing(RelType::CompetesWith)];
        let hops: Vec<usize> = store
            .traverse_all(ids[0], &steps, 3)
            .unwrap()
            .map(|p| p.hops())
            .collect();
        let mut sorted = hops.clone();
        sorted.sort();
        assert_eq!(hops, sorted);
    }

    #[test]
    fn test_unique_nodes_visits_each_node_once() {
        let (store, ids) = ring();
        let steps = [TraversalStep::outgoing(RelType::CompetesWith)];
        let paths: Vec<Path> = store
            .traverse_all(ids[0], &steps, 3)
            .unwrap()
            .unique_nodes()
            .collect();
        assert_eq!(paths.len(), 3);
        let mut ends: Vec<NodeId> = paths.iter().map(Path::terminal).collect();
        ends.sort();
        assert_eq!(ends, vec![ids[1], ids[2], ids[3]]);
    }

    #[test]
    fn test_zero_hops_yields_nothing() {
        let (store, ids) = ring();
        let steps = [TraversalStep::outgoing(RelType::CompetesWith)];
        assert_eq!(store.traverse_all(ids[0], &steps, 0).unwrap().count(), 0);
    }

    #[test]
    fn test_predicate_and_stale_edges_prune() {
        let (mut store, ids) = ring();
        let steps = [TraversalStep::outgoing(RelType::CompetesWith)];
        let blocked = ids[1];
        let paths: Vec<Path> = store
            .traverse(ids[0], &steps, 3, |_, node| node.id != blocked)
            .unwrap()
            .collect();
        assert!(paths.iter().all(|p| !p.contains(blocked)));
        // A-D, A-D-C; the way back round to B is blocked
        assert_eq!(paths.len(), 2);

        let stale = store.find_edge(ids[0], RelType::CompetesWith, ids[3]).unwrap().id;
        store.flag_edge_stale(stale).unwrap();
        let paths: Vec<Path> = store.traverse_all(ids[0], &steps, 1).unwrap().collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].terminal(), ids[1]);
    }

    #[test]
    fn test_traversal_is_lazy_and_restartable() {
        let (store, ids) = ring();
        let steps = [TraversalStep::both(RelType::CompetesWith)];
        let first: Vec<Path> = store.traverse_all(ids[0], &steps, 3).unwrap().take(1).collect();
        assert_eq!(first.len(), 1);
        let again: Vec<Path> = store.traverse_all(ids[0], &steps, 3).unwrap().take(1).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_missing_start_is_an_error() {
        let store = GraphStore::new();
        let err = store.traverse_all(NodeId::new(5), &[], 2).err().unwrap();
        assert_eq!(err, GraphError::NodeIdNotFound(NodeId::new(5)));
    }
}
