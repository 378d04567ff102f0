//! Relationship upsert service
//!
//! The sole mutating entry point of the engine. A request names a job, an
//! explicit source set and optionally a target set; the service scores
//! every candidate pair against one snapshot, writes the survivors one tuple
//! at a time through [`SharedGraph`], then reconciles edges in the job's
//! scope that are no longer desired.

mod jobs;
mod selector;

pub use jobs::{RelationshipJob, DERIVATION_DIRECT, DERIVATION_INHERITED, DERIVATION_PROPERTY};
pub use selector::EntitySelector;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, EntityFailure};
use crate::graph::{Direction, EdgeId, GraphStore, Node, NodeId, SharedGraph, UpsertOutcome};
use crate::schema::{NodeKind, SchemaError, SchemaRegistry};
use chrono::{DateTime, Utc};
use jobs::{plan_source, JobContext, SourcePlan};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What happens to an existing edge whose pair no longer qualifies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleEdgePolicy {
    /// Leave it in place (edges accumulate)
    #[default]
    Retain,
    /// Keep it but mark it stale; traversal skips it
    Flag,
    Remove,
}

/// What to do when a tuple changed between planning and writing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Overwrite the other writer's properties
    #[default]
    LastWriterWins,
    /// Skip the write and report a failure for the source
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeRequest {
    pub relationship: RelationshipJob,
    pub sources: EntitySelector,
    /// Defaults to every node of the job's target kinds
    pub targets: Option<EntitySelector>,
    /// Reference time for recency windows
    pub as_of: DateTime<Utc>,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
    /// Overrides the configured reconciliation policy
    #[serde(default)]
    pub stale_policy: Option<StaleEdgePolicy>,
}

impl RecomputeRequest {
    pub fn new(relationship: RelationshipJob, sources: EntitySelector, as_of: DateTime<Utc>) -> Self {
        RecomputeRequest {
            relationship,
            sources,
            targets: None,
            as_of,
            on_conflict: ConflictPolicy::default(),
            stale_policy: None,
        }
    }

    pub fn with_targets(mut self, targets: EntitySelector) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn with_stale_policy(mut self, policy: StaleEdgePolicy) -> Self {
        self.stale_policy = Some(policy);
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }
}

/// Outcome of one recompute request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub rules_version: String,
    pub sources_processed: usize,
    /// Sources outside the run's scope (e.g. news outside the recency window)
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub below_threshold: usize,
    /// Edges flagged or removed by reconciliation
    pub reconciled: usize,
    /// Tuples another writer touched between planning and writing
    pub conflicts: usize,
    pub failures: Vec<EntityFailure>,
}

impl RecomputeReport {
    /// Number of edges the run created or changed
    pub fn changed(&self) -> usize {
        self.created + self.updated + self.reconciled
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Materialises scored relationships into a shared graph
pub struct RelationshipService<'a> {
    graph: &'a SharedGraph,
    config: &'a EngineConfig,
}

impl<'a> RelationshipService<'a> {
    pub fn new(graph: &'a SharedGraph, config: &'a EngineConfig) -> Self {
        Self { graph, config }
    }

    pub fn recompute(&self, request: &RecomputeRequest) -> EngineResult<RecomputeReport> {
        let job = request.relationship;
        let rel = job.rel_type();
        check_kind(job.source_kinds(), request.sources.kind(), |kind| SchemaError::SourceNotAllowed { rel, kind })?;
        if let Some(targets) = &request.targets {
            check_kind(job.target_kinds(), targets.kind(), |kind| SchemaError::TargetNotAllowed { rel, kind })?;
        }

        let snapshot = self.graph.snapshot()?;
        let (sources, mut failures) = request.sources.resolve(&snapshot);
        let (targets, target_failures) = match &request.targets {
            Some(selector) => selector.resolve(&snapshot),
            None => (
                job.target_kinds()
                    .iter()
                    .flat_map(|kind| snapshot.nodes_of_kind(*kind))
                    .collect(),
                Vec::new(),
            ),
        };
        failures.extend(target_failures);

        info!(
            job = ?job,
            sources = sources.len(),
            targets = targets.len(),
            rules_version = %self.config.rules.version,
            "Starting recompute"
        );

        let ctx = JobContext {
            store: &snapshot,
            config: self.config,
            targets: &targets,
            as_of: request.as_of,
        };
        // pure scoring in parallel; collect keeps source order
        let plans: Vec<EngineResult<Option<SourcePlan>>> = sources
            .par_iter()
            .map(|source| plan_source(job, &ctx, source))
            .collect();

        let mut report = RecomputeReport {
            rules_version: self.config.rules.version.clone(),
            failures,
            ..RecomputeReport::default()
        };
        let mut written: FxHashMap<(NodeId, NodeId), u64> = FxHashMap::default();
        let mut reconcile: Vec<(&Node, FxHashSet<NodeId>)> = Vec::new();

        for (source, plan) in sources.iter().zip(plans) {
            let plan = match plan {
                Ok(Some(plan)) => plan,
                Ok(None) => {
                    debug!(source = %source.key, "Source outside recompute scope");
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    warn!(source = %source.key, error = %err, "Scoring failed");
                    report.failures.push(EntityFailure::new(source.kind, source.key.as_str(), &err));
                    continue;
                }
            };
            report.sources_processed += 1;
            report.below_threshold += plan.below_threshold;
            let desired: FxHashSet<NodeId> = plan.desired_targets(source.id).into_iter().collect();

            match self.apply(request, &snapshot, &plan, &mut written, &mut report) {
                Ok(()) => reconcile.push((*source, desired)),
                Err(err) => {
                    warn!(source = %source.key, error = %err, "Write failed");
                    report.failures.push(EntityFailure::new(source.kind, source.key.as_str(), &err));
                }
            }
        }

        let policy = request.stale_policy.unwrap_or(self.config.reconciliation.policy);
        let reconciled = self.reconcile(job, policy, &targets, request.targets.is_some(), &reconcile, &mut report)?;
        report.reconciled = reconciled;

        info!(
            job = ?job,
            processed = report.sources_processed,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            below_threshold = report.below_threshold,
            reconciled = report.reconciled,
            failures = report.failures.len(),
            "Recompute finished"
        );
        Ok(report)
    }

    /// Run several requests in order, stopping only on request-level errors
    pub fn recompute_all(&self, requests: &[RecomputeRequest]) -> EngineResult<Vec<RecomputeReport>> {
        requests.iter().map(|request| self.recompute(request)).collect()
    }

    fn apply(
        &self,
        request: &RecomputeRequest,
        snapshot: &GraphStore,
        plan: &SourcePlan,
        written: &mut FxHashMap<(NodeId, NodeId), u64>,
        report: &mut RecomputeReport,
    ) -> EngineResult<()> {
        let rel = request.relationship.rel_type();
        for edge in &plan.writes {
            let expected = written
                .get(&(edge.source, edge.target))
                .copied()
                .or(edge.seen_revision);
            let properties = edge.properties.clone();
            let (outcome, revision, conflicted) = self.graph.write(|store| {
                let current = store.find_edge(edge.source, rel, edge.target).map(|e| e.revision);
                let conflicted = current != expected;
                if conflicted && request.on_conflict == ConflictPolicy::Fail {
                    return Ok((None, current, true));
                }
                let outcome = store.upsert_edge(edge.source, rel, edge.target, properties)?;
                let revision = store.get_edge(outcome.id()).map(|e| e.revision);
                Ok((Some(outcome), revision, conflicted))
            })?;

            if conflicted {
                report.conflicts += 1;
                let (source_key, target_key) = (node_key(snapshot, edge.source), node_key(snapshot, edge.target));
                if outcome.is_none() {
                    return Err(EngineError::ConcurrentWriteConflict {
                        source_key,
                        rel,
                        target_key,
                    });
                }
                warn!(source = %source_key, target = %target_key, rel = %rel, "Overwrote a concurrent write");
            }
            if let Some(revision) = revision {
                written.insert((edge.source, edge.target), revision);
            }
            match outcome {
                Some(UpsertOutcome::Created(_)) => report.created += 1,
                Some(UpsertOutcome::Updated(_)) => report.updated += 1,
                Some(UpsertOutcome::Unchanged(_)) => report.unchanged += 1,
                None => {}
            }
        }
        Ok(())
    }

    /// Diff the desired edge set against the live one for every processed
    /// source and apply the stale-edge policy to the difference
    ///
    /// Symmetric relationships are diffed in both directions so the pair of
    /// directed edges is reconciled together.
    fn reconcile(
        &self,
        job: RelationshipJob,
        policy: StaleEdgePolicy,
        targets: &[&Node],
        explicit_targets: bool,
        processed: &[(&Node, FxHashSet<NodeId>)],
        report: &mut RecomputeReport,
    ) -> EngineResult<usize> {
        if policy == StaleEdgePolicy::Retain || processed.is_empty() {
            return Ok(0);
        }
        let rel = job.rel_type();
        let edge_type = rel.edge_type();
        let direction = if SchemaRegistry::relationship(rel).symmetric {
            Direction::Both
        } else {
            Direction::Outgoing
        };
        let target_kinds = job.target_kinds();
        let target_scope: FxHashSet<NodeId> = targets.iter().map(|n| n.id).collect();
        let current = self.graph.snapshot()?;

        let mut reconciled = 0;
        let mut handled: FxHashSet<EdgeId> = FxHashSet::default();
        for (source, desired) in processed {
            let stale: Vec<EdgeId> = current
                .get_edges(source.id, Some(&edge_type), direction)
                .into_iter()
                .filter(|e| job.owns(e))
                .filter_map(|e| e.other_end(source.id).map(|other| (e.id, other)))
                .filter(|(_, other)| !desired.contains(other))
                .filter(|(_, other)| !explicit_targets || target_scope.contains(other))
                .filter(|(_, other)| {
                    current
                        .get_node_by_id(*other)
                        .map_or(false, |n| target_kinds.contains(&n.kind))
                })
                .map(|(id, _)| id)
                .filter(|id| handled.insert(*id))
                .collect();

            for id in stale {
                let result = match policy {
                    StaleEdgePolicy::Flag => self.graph.flag_edge_stale(id),
                    StaleEdgePolicy::Remove => self.graph.remove_edge(id).map(|_| true),
                    StaleEdgePolicy::Retain => Ok(false),
                };
                match result {
                    Ok(true) => reconciled += 1,
                    Ok(false) => {}
                    Err(err) => {
                        let err = EngineError::from(err);
                        report.failures.push(EntityFailure::new(source.kind, source.key.as_str(), &err));
                    }
                }
            }
        }
        if reconciled > 0 {
            info!(job = ?job, policy = ?policy, reconciled, "Reconciled stale edges");
        }
        Ok(reconciled)
    }
}

fn check_kind(
    allowed: &[NodeKind],
    kind: NodeKind,
    violation: impl FnOnce(NodeKind) -> SchemaError,
) -> EngineResult<()> {
    if allowed.contains(&kind) {
        Ok(())
    } else {
        Err(EngineError::Graph(violation(kind).into()))
    }
}

fn node_key(store: &GraphStore, id: NodeId) -> String {
    store
        .get_node_by_id(id)
        .map(|n| n.key.clone())
        .unwrap_or_else(|| id.to_string())
}
