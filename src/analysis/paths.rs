//! Multi-hop propagation from one origin node
//!
//! Paths are scored by multiplying normalised edge scores: an EXPOSED_TO
//! hop contributes its exposure weight, every other hop its unit-interval
//! score. Results are ranked by score with ties kept in discovery order.

use crate::config::TraversalConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::{Edge, GraphError, GraphStore, HopClass, NodeId, Path, TraversalStep};
use crate::model::ExposureLevel;
use crate::schema::{NodeKind, RelType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// One node along a path, resolved for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPath {
    pub nodes: Vec<PathNode>,
    pub relationships: Vec<RelType>,
    pub hops: usize,
    pub hop_class: HopClass,
    pub score: f64,
    #[serde(skip)]
    pub path: Option<Path>,
}

impl ScoredPath {
    pub fn terminal(&self) -> Option<&PathNode> {
        self.nodes.last()
    }
}

/// Ranked result of one propagation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSet {
    pub origin: PathNode,
    pub max_hops: usize,
    pub paths: Vec<ScoredPath>,
}

impl PathSet {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn by_class(&self, class: HopClass) -> impl Iterator<Item = &ScoredPath> {
        self.paths.iter().filter(move |p| p.hop_class == class)
    }

    pub fn count(&self, class: HopClass) -> usize {
        self.by_class(class).count()
    }

    /// Paths ending at a node of `kind`
    pub fn ending_at(&self, kind: NodeKind) -> impl Iterator<Item = &ScoredPath> {
        self.paths
            .iter()
            .filter(move |p| p.terminal().map_or(false, |n| n.kind == kind))
    }

    /// Hop-weighted mean path score (weight 1/hops), scaled to 0..=100
    ///
    /// `None` when there are no paths.
    pub fn composite_risk(&self) -> Option<f64> {
        composite_risk(&self.paths)
    }
}

pub fn composite_risk(paths: &[ScoredPath]) -> Option<f64> {
    let (weighted, total) = paths
        .iter()
        .filter(|p| p.hops > 0)
        .fold((0.0, 0.0), |(weighted, total), p| {
            let weight = 1.0 / p.hops as f64;
            (weighted + p.score * weight, total + weight)
        });
    if total == 0.0 {
        return None;
    }
    Some((weighted / total * 100.0).clamp(0.0, 100.0))
}

/// Normalised score of one hop
pub fn edge_score(edge: &Edge) -> f64 {
    match RelType::from_edge_type(&edge.edge_type) {
        Some(RelType::ExposedTo) => edge
            .text("exposureLevel")
            .and_then(|l| l.parse::<ExposureLevel>().ok())
            .map_or(0.0, |l| l.weight()),
        Some(rel) => edge.number(rel.score_field()).map_or(0.0, |s| s.clamp(0.0, 1.0)),
        None => 0.0,
    }
}

/// Stable sort, highest score first
pub fn rank(paths: &mut [ScoredPath]) {
    paths.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Bounded propagation queries over one snapshot
pub struct PathAnalyzer<'g> {
    store: &'g GraphStore,
    config: &'g TraversalConfig,
}

impl<'g> PathAnalyzer<'g> {
    pub fn new(store: &'g GraphStore, config: &'g TraversalConfig) -> Self {
        Self { store, config }
    }

    /// Indicator -> exposed companies -> their peers' subjects and solutions
    pub fn macro_steps() -> Vec<TraversalStep> {
        vec![
            TraversalStep::incoming(RelType::ExposedTo),
            TraversalStep::incoming(RelType::SimilarTo),
            TraversalStep::outgoing(RelType::EligibleFor),
        ]
    }

    /// News -> impacted companies/indicators, continuing as the macro preset
    pub fn news_steps() -> Vec<TraversalStep> {
        let mut steps = vec![TraversalStep::outgoing(RelType::Impacts)];
        steps.extend(Self::macro_steps());
        steps
    }

    /// Company -> its exposures and peers -> the news impacting them
    pub fn company_risk_steps() -> Vec<TraversalStep> {
        vec![
            TraversalStep::outgoing(RelType::ExposedTo),
            TraversalStep::outgoing(RelType::SimilarTo),
            TraversalStep::incoming(RelType::Impacts),
        ]
    }

    fn hop_bound(&self, requested: Option<usize>) -> usize {
        let requested = requested.unwrap_or(self.config.default_max_hops);
        if requested > self.config.max_hops_limit {
            warn!(
                requested,
                limit = self.config.max_hops_limit,
                "Hop bound clamped"
            );
        }
        requested.min(self.config.max_hops_limit)
    }

    fn path_node(&self, id: NodeId) -> EngineResult<PathNode> {
        let node = self.store.node(id)?;
        Ok(PathNode {
            id,
            kind: node.kind,
            key: node.key.clone(),
        })
    }

    fn score_path(&self, path: Path) -> EngineResult<ScoredPath> {
        let mut score = 1.0;
        let mut relationships = Vec::with_capacity(path.hops());
        for id in &path.edges {
            let edge = self
                .store
                .get_edge(*id)
                .ok_or(GraphError::EdgeNotFound(*id))?;
            score *= edge_score(edge);
            if let Some(rel) = RelType::from_edge_type(&edge.edge_type) {
                relationships.push(rel);
            }
        }
        let nodes = path
            .nodes
            .iter()
            .map(|id| self.path_node(*id))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(ScoredPath {
            nodes,
            relationships,
            hops: path.hops(),
            hop_class: path.hop_class(),
            score,
            path: Some(path),
        })
    }

    /// Lazily scored paths in discovery order
    pub fn propagate_iter<'a>(
        &'a self,
        origin: NodeId,
        filters: &[TraversalStep],
        max_hops: Option<usize>,
    ) -> EngineResult<impl Iterator<Item = EngineResult<ScoredPath>> + 'a> {
        let bound = self.hop_bound(max_hops);
        let store: &'a GraphStore = self.store;
        let traversal = store.traverse_all(origin, filters, bound)?;
        Ok(traversal.map(move |path| self.score_path(path)))
    }

    /// All paths from `origin`, ranked
    pub fn propagate(&self, origin: NodeId, filters: &[TraversalStep], max_hops: Option<usize>) -> EngineResult<PathSet> {
        let bound = self.hop_bound(max_hops);
        let mut paths = self
            .propagate_iter(origin, filters, Some(bound))?
            .collect::<EngineResult<Vec<_>>>()?;
        rank(&mut paths);
        let set = PathSet {
            origin: self.path_node(origin)?,
            max_hops: bound,
            paths,
        };
        debug!(
            origin = %set.origin.key,
            max_hops = bound,
            paths = set.len(),
            "Propagation finished"
        );
        Ok(set)
    }

    /// Propagation from a node named by kind and natural key
    pub fn propagate_from(
        &self,
        kind: NodeKind,
        key: &str,
        filters: &[TraversalStep],
        max_hops: Option<usize>,
    ) -> EngineResult<PathSet> {
        let origin = self
            .store
            .find_node(kind, key)
            .ok_or_else(|| EngineError::NotFound {
                kind,
                key: key.to_string(),
            })?;
        self.propagate(origin.id, filters, max_hops)
    }

    pub fn macro_propagation(&self, indicator: &str, max_hops: Option<usize>) -> EngineResult<PathSet> {
        self.propagate_from(NodeKind::MacroIndicator, indicator, &Self::macro_steps(), max_hops)
    }

    /// Risk paths reaching a Subject company, for composite scoring
    pub fn company_risk(&self, company: &str, max_hops: Option<usize>) -> EngineResult<PathSet> {
        self.propagate_from(NodeKind::SubjectCompany, company, &Self::company_risk_steps(), max_hops)
    }

    pub fn news_propagation(&self, title: &str, max_hops: Option<usize>) -> EngineResult<PathSet> {
        self.propagate_from(NodeKind::NewsArticle, title, &Self::news_steps(), max_hops)
    }
}
