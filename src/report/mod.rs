//! Aggregation and reporting over the current graph state
//!
//! Everything here reads one snapshot. A batch summary never fails as a
//! whole: entities that cannot be summarised are listed as failures next to
//! the summaries that succeeded.

use crate::analysis::cohort::cohort_value;
use crate::analysis::{cohort_exposures, CohortExposure, PathAnalyzer};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, EntityFailure};
use crate::graph::{Direction, GraphStore, Node, NodeId};
use crate::model::{CompanyProfile, ExposureLevel};
use crate::scoring::{assess_overall_risk, RiskAssessment};
use crate::schema::{NodeKind, RelType};
use crate::upsert::{EntitySelector, DERIVATION_PROPERTY};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapVerdict {
    /// More material risks than eligible solutions
    Insufficient,
    Balanced,
    Sufficient,
}

impl GapVerdict {
    pub fn from_counts(risk_count: usize, solution_count: usize) -> Self {
        match risk_count.cmp(&solution_count) {
            Ordering::Greater => GapVerdict::Insufficient,
            Ordering::Equal => GapVerdict::Balanced,
            Ordering::Less => GapVerdict::Sufficient,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapAnalysis {
    /// Distinct MEDIUM or HIGH exposures
    pub risk_count: usize,
    /// Distinct solutions at or above the solution threshold
    pub solution_count: usize,
    pub verdict: GapVerdict,
}

impl GapAnalysis {
    pub fn new(risk_count: usize, solution_count: usize) -> Self {
        GapAnalysis {
            risk_count,
            solution_count,
            verdict: GapVerdict::from_counts(risk_count, solution_count),
        }
    }
}

/// First `n` items by descending score; equal scores keep input order
pub fn top_n<T, F>(items: impl IntoIterator<Item = T>, n: usize, score: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    let mut items: Vec<T> = items.into_iter().collect();
    items.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
    items.truncate(n);
    items
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSummary {
    pub indicator: String,
    pub level: ExposureLevel,
    pub risk_type: Option<String>,
    pub derivation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSummary {
    pub name: String,
    pub kind: NodeKind,
    pub score: f64,
    pub urgency: Option<String>,
    pub expected_benefit: Option<String>,
    pub action_required: Option<String>,
}

/// Everything the reporting side needs about one Subject company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub company: String,
    pub gap: GapAnalysis,
    pub exposures: Vec<ExposureSummary>,
    pub top_solutions: Vec<SolutionSummary>,
    pub cohort: Option<String>,
    pub cohort_averages: Vec<CohortExposure>,
    /// 0..=100, `None` when no risk path reaches the company
    pub composite_risk: Option<f64>,
    pub overall_risk: RiskAssessment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryBatch {
    pub summaries: Vec<AggregationSummary>,
    pub failures: Vec<EntityFailure>,
}

/// Read-side facade over one snapshot
pub struct Reporter<'g> {
    store: &'g GraphStore,
    config: &'g EngineConfig,
}

impl<'g> Reporter<'g> {
    pub fn new(store: &'g GraphStore, config: &'g EngineConfig) -> Self {
        Self { store, config }
    }

    fn subject(&self, key: &str) -> EngineResult<&'g Node> {
        self.store
            .find_node(NodeKind::SubjectCompany, key)
            .ok_or_else(|| EngineError::NotFound {
                kind: NodeKind::SubjectCompany,
                key: key.to_string(),
            })
    }

    /// Live EXPOSED_TO edges of a company, in creation order
    pub fn exposures(&self, company: NodeId) -> Vec<ExposureSummary> {
        let exposed_to = RelType::ExposedTo.edge_type();
        self.store
            .get_edges(company, Some(&exposed_to), Direction::Outgoing)
            .into_iter()
            .filter(|e| !e.is_stale())
            .filter_map(|edge| {
                let level = edge.text("exposureLevel")?.parse::<ExposureLevel>().ok()?;
                let indicator = self.store.get_node_by_id(edge.target)?;
                Some(ExposureSummary {
                    indicator: indicator.key.clone(),
                    level,
                    risk_type: edge.text("riskType").map(str::to_string),
                    derivation: edge.text(DERIVATION_PROPERTY).map(str::to_string),
                })
            })
            .collect()
    }

    /// Solutions whose eligibility clears the solution threshold, one
    /// entry per solution
    pub fn eligible_solutions(&self, company: NodeId) -> Vec<SolutionSummary> {
        let eligible_for = RelType::EligibleFor.edge_type();
        let threshold = self.config.thresholds.solution;
        let mut seen = FxHashSet::default();
        self.store
            .get_edges(company, Some(&eligible_for), Direction::Outgoing)
            .into_iter()
            .filter(|e| !e.is_stale())
            .filter_map(|edge| {
                let score = edge.number("eligibilityScore")?;
                if score < threshold || !seen.insert(edge.target) {
                    return None;
                }
                let solution = self.store.get_node_by_id(edge.target)?;
                Some(SolutionSummary {
                    name: solution.key.clone(),
                    kind: solution.kind,
                    score,
                    urgency: edge.text("urgency").map(str::to_string),
                    expected_benefit: edge.text("expectedBenefit").map(str::to_string),
                    action_required: edge.text("actionRequired").map(str::to_string),
                })
            })
            .collect()
    }

    fn gap_for(&self, exposures: &[ExposureSummary], solutions: &[SolutionSummary]) -> GapAnalysis {
        let risks: FxHashSet<&str> = exposures
            .iter()
            .filter(|e| e.level.is_material())
            .map(|e| e.indicator.as_str())
            .collect();
        GapAnalysis::new(risks.len(), solutions.len())
    }

    pub fn gap_analysis(&self, company: &str) -> EngineResult<GapAnalysis> {
        let node = self.subject(company)?;
        Ok(self.gap_for(&self.exposures(node.id), &self.eligible_solutions(node.id)))
    }

    pub fn top_solutions(&self, company: &str) -> EngineResult<Vec<SolutionSummary>> {
        let node = self.subject(company)?;
        Ok(top_n(
            self.eligible_solutions(node.id),
            self.config.reporting.top_n,
            |s| s.score,
        ))
    }

    fn build(&self, node: &Node, cohort_table: &[CohortExposure]) -> EngineResult<AggregationSummary> {
        if node.kind != NodeKind::SubjectCompany {
            return Err(EngineError::InvalidAttribute {
                entity: format!("{}({})", node.kind, node.key),
                attribute: "kind".to_string(),
                reason: "aggregation applies to SubjectCompany nodes only".to_string(),
            });
        }
        let profile = CompanyProfile::from_node(node).ok_or_else(|| EngineError::NotFound {
            kind: NodeKind::SubjectCompany,
            key: node.key.clone(),
        })?;

        let exposures = self.exposures(node.id);
        let solutions = self.eligible_solutions(node.id);
        let gap = self.gap_for(&exposures, &solutions);
        let high = exposures.iter().filter(|e| e.level == ExposureLevel::High).count();

        let cohort = cohort_value(node, &self.config.cohort.attribute);
        let cohort_averages = match &cohort {
            Some(value) => cohort_table.iter().filter(|c| &c.cohort == value).cloned().collect(),
            None => Vec::new(),
        };

        let composite_risk = PathAnalyzer::new(self.store, &self.config.traversal)
            .company_risk(&node.key, None)?
            .composite_risk();

        Ok(AggregationSummary {
            company: node.key.clone(),
            gap,
            exposures,
            top_solutions: top_n(solutions, self.config.reporting.top_n, |s| s.score),
            cohort,
            cohort_averages,
            composite_risk,
            overall_risk: assess_overall_risk(&profile, high),
        })
    }

    pub fn summarize(&self, company: &str) -> EngineResult<AggregationSummary> {
        let node = self.subject(company)?;
        let cohort_table = cohort_exposures(self.store, &self.config.cohort);
        self.build(node, &cohort_table)
    }

    /// Summaries for every selected company; failures are collected, not
    /// propagated
    pub fn summarize_all(&self, selector: &EntitySelector) -> SummaryBatch {
        let (nodes, mut failures) = selector.resolve(self.store);
        let cohort_table = cohort_exposures(self.store, &self.config.cohort);

        let results: Vec<(&Node, EngineResult<AggregationSummary>)> = nodes
            .par_iter()
            .map(|node| (*node, self.build(node, &cohort_table)))
            .collect();

        let mut summaries = Vec::with_capacity(results.len());
        for (node, result) in results {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    warn!(company = %node.key, error = %err, "Aggregation failed");
                    failures.push(EntityFailure::new(node.kind, node.key.as_str(), &err));
                }
            }
        }
        info!(
            summaries = summaries.len(),
            failures = failures.len(),
            "Aggregation finished"
        );
        SummaryBatch { summaries, failures }
    }

    /// Every Subject company
    pub fn aggregate(&self) -> SummaryBatch {
        self.summarize_all(&EntitySelector::all(NodeKind::SubjectCompany))
    }
}
