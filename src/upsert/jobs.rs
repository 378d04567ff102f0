//! Per-source edge planning for each relationship job
//!
//! Planning only reads a snapshot and is safe to run in parallel. A plan
//! lists the edges to write and the targets whose current edge should be
//! kept as is; everything else in the job's scope is a reconciliation
//! candidate.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::{Direction, Edge, GraphStore, Node, NodeId, PropertyMap, PropertyValue};
use crate::model::{CompanyProfile, ExposureLevel, IndicatorView, NewsView, SolutionView};
use crate::schema::{NodeKind, RelType, SchemaRegistry};
use crate::scoring::{
    classify_indicator, inherit_exposure, score_competition, score_eligibility, score_exposure,
    score_impact, score_similarity, ExposureScore,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How an EXPOSED_TO edge was derived
pub const DERIVATION_PROPERTY: &str = "derivation";
pub const DERIVATION_DIRECT: &str = "direct";
pub const DERIVATION_INHERITED: &str = "inherited";

/// A materialisation job: one relationship type plus the rule that scores it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipJob {
    /// Direct company -> indicator exposure
    Exposure,
    /// Subject exposure inherited from SIMILAR_TO peers
    InheritedExposure,
    Eligibility,
    Similarity,
    /// Same-sector reference pairs, written in both directions
    Competition,
    /// Recent news -> companies and indicators
    Impact,
}

impl RelationshipJob {
    pub const ALL: [RelationshipJob; 6] = [
        RelationshipJob::Exposure,
        RelationshipJob::InheritedExposure,
        RelationshipJob::Eligibility,
        RelationshipJob::Similarity,
        RelationshipJob::Competition,
        RelationshipJob::Impact,
    ];

    pub fn rel_type(&self) -> RelType {
        match self {
            RelationshipJob::Exposure | RelationshipJob::InheritedExposure => RelType::ExposedTo,
            RelationshipJob::Eligibility => RelType::EligibleFor,
            RelationshipJob::Similarity => RelType::SimilarTo,
            RelationshipJob::Competition => RelType::CompetesWith,
            RelationshipJob::Impact => RelType::Impacts,
        }
    }

    pub fn source_kinds(&self) -> &'static [NodeKind] {
        match self {
            RelationshipJob::InheritedExposure => &[NodeKind::SubjectCompany],
            _ => SchemaRegistry::relationship(self.rel_type()).sources,
        }
    }

    pub fn target_kinds(&self) -> &'static [NodeKind] {
        SchemaRegistry::relationship(self.rel_type()).targets
    }

    /// Whether an existing edge belongs to this job's reconciliation scope
    pub(crate) fn owns(&self, edge: &Edge) -> bool {
        match self {
            RelationshipJob::Exposure => !is_inherited(edge),
            RelationshipJob::InheritedExposure => is_inherited(edge),
            _ => true,
        }
    }
}

pub(crate) struct PlannedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub properties: PropertyMap,
    /// Revision of the edge in the planning snapshot
    pub seen_revision: Option<u64>,
}

#[derive(Default)]
pub(crate) struct SourcePlan {
    pub writes: Vec<PlannedEdge>,
    /// Targets whose current edge is desired but left untouched
    pub keep: Vec<NodeId>,
    pub below_threshold: usize,
}

impl SourcePlan {
    fn write(&mut self, store: &GraphStore, rel: RelType, source: NodeId, target: NodeId, properties: PropertyMap) {
        let seen_revision = store.find_edge(source, rel, target).map(|e| e.revision);
        self.writes.push(PlannedEdge {
            source,
            target,
            properties,
            seen_revision,
        });
    }

    /// Targets of edges leaving `source` that this plan wants to exist
    pub fn desired_targets(&self, source: NodeId) -> Vec<NodeId> {
        self.writes
            .iter()
            .filter(|w| w.source == source)
            .map(|w| w.target)
            .chain(self.keep.iter().copied())
            .collect()
    }
}

/// Read-only inputs shared by every source of one request
pub(crate) struct JobContext<'a> {
    pub store: &'a GraphStore,
    pub config: &'a EngineConfig,
    pub targets: &'a [&'a Node],
    pub as_of: DateTime<Utc>,
}

/// Plan one source; `Ok(None)` means the source is out of scope for this run
pub(crate) fn plan_source(job: RelationshipJob, ctx: &JobContext<'_>, source: &Node) -> EngineResult<Option<SourcePlan>> {
    match job {
        RelationshipJob::Exposure => plan_exposure(ctx, source).map(Some),
        RelationshipJob::InheritedExposure => plan_inherited(ctx, source).map(Some),
        RelationshipJob::Eligibility => plan_eligibility(ctx, source).map(Some),
        RelationshipJob::Similarity => plan_similarity(ctx, source).map(Some),
        RelationshipJob::Competition => plan_competition(ctx, source).map(Some),
        RelationshipJob::Impact => plan_impact(ctx, source),
    }
}

fn company(node: &Node) -> EngineResult<CompanyProfile> {
    CompanyProfile::from_node(node).ok_or_else(|| EngineError::InvalidAttribute {
        entity: format!("{}({})", node.kind, node.key),
        attribute: "kind".to_string(),
        reason: "is not a company".to_string(),
    })
}

fn is_inherited(edge: &Edge) -> bool {
    edge.text(DERIVATION_PROPERTY) == Some(DERIVATION_INHERITED)
}

fn exposure_level(edge: &Edge) -> EngineResult<ExposureLevel> {
    edge.text("exposureLevel")
        .and_then(|level| level.parse().ok())
        .ok_or_else(|| EngineError::InvalidAttribute {
            entity: format!("EXPOSED_TO {}", edge.id),
            attribute: "exposureLevel".to_string(),
            reason: "is not LOW, MEDIUM or HIGH".to_string(),
        })
}

fn exposure_props(score: &ExposureScore, derivation: &str) -> PropertyMap {
    let mut properties = PropertyMap::new();
    properties.insert("exposureLevel".to_string(), score.level.as_str().into());
    properties.insert("riskType".to_string(), score.risk_type.as_str().into());
    properties.insert("rationale".to_string(), score.rationale.as_str().into());
    properties.insert(DERIVATION_PROPERTY.to_string(), derivation.into());
    properties
}

fn plan_exposure(ctx: &JobContext<'_>, source: &Node) -> EngineResult<SourcePlan> {
    let profile = company(source)?;
    let mut plan = SourcePlan::default();
    for target in ctx.targets {
        let Some(indicator) = IndicatorView::from_node(target) else {
            continue;
        };
        let category = classify_indicator(&ctx.config.rules, &indicator);
        let existing = ctx.store.find_edge(source.id, RelType::ExposedTo, target.id);
        // an inherited edge that already dominates the direct level is left alone
        let inherited = existing.filter(|e| is_inherited(e));
        match score_exposure(&profile, category) {
            Some(score) => {
                if let Some(edge) = inherited {
                    if exposure_level(edge)? >= score.level {
                        plan.keep.push(target.id);
                        continue;
                    }
                }
                plan.write(
                    ctx.store,
                    RelType::ExposedTo,
                    source.id,
                    target.id,
                    exposure_props(&score, DERIVATION_DIRECT),
                );
            }
            None if inherited.is_some() => plan.keep.push(target.id),
            None => plan.below_threshold += 1,
        }
    }
    Ok(plan)
}

fn plan_inherited(ctx: &JobContext<'_>, source: &Node) -> EngineResult<SourcePlan> {
    let profile = company(source)?;
    let similar_to = RelType::SimilarTo.edge_type();
    let peers: Vec<(f64, NodeId)> = ctx
        .store
        .get_edges(source.id, Some(&similar_to), Direction::Outgoing)
        .into_iter()
        .filter(|e| !e.is_stale())
        .filter_map(|e| e.number("similarityScore").map(|s| (s, e.target)))
        .collect();

    let mut plan = SourcePlan::default();
    for target in ctx.targets {
        let Some(indicator) = IndicatorView::from_node(target) else {
            continue;
        };
        let category = classify_indicator(&ctx.config.rules, &indicator);
        let direct = score_exposure(&profile, category);

        let mut peer_levels = Vec::new();
        for (similarity, peer) in &peers {
            if let Some(edge) = ctx
                .store
                .find_edge(*peer, RelType::ExposedTo, target.id)
                .filter(|e| !e.is_stale())
            {
                peer_levels.push((*similarity, exposure_level(edge)?));
            }
        }
        let peer_count = peer_levels.len();

        match inherit_exposure(direct.as_ref().map(|d| d.level), peer_levels) {
            Some(inherited) => {
                let score = ExposureScore {
                    level: inherited.level,
                    risk_type: category,
                    rationale: format!(
                        "inherited from {} similar peer(s), max risk {:.2}",
                        peer_count, inherited.risk
                    ),
                };
                let mut properties = exposure_props(&score, DERIVATION_INHERITED);
                properties.insert("inheritedRisk".to_string(), PropertyValue::Float(inherited.risk));
                plan.write(ctx.store, RelType::ExposedTo, source.id, target.id, properties);
            }
            None => {
                let stale_inherited = ctx
                    .store
                    .find_edge(source.id, RelType::ExposedTo, target.id)
                    .map_or(false, is_inherited);
                match (&direct, stale_inherited) {
                    // hand the edge back to the direct exposure
                    (Some(score), true) => plan.write(
                        ctx.store,
                        RelType::ExposedTo,
                        source.id,
                        target.id,
                        exposure_props(score, DERIVATION_DIRECT),
                    ),
                    _ => plan.below_threshold += 1,
                }
            }
        }
    }
    Ok(plan)
}

fn plan_eligibility(ctx: &JobContext<'_>, source: &Node) -> EngineResult<SourcePlan> {
    let profile = company(source)?;
    let threshold = ctx.config.thresholds.eligibility;
    let mut plan = SourcePlan::default();
    for target in ctx.targets {
        let Some(solution) = SolutionView::from_node(target) else {
            continue;
        };
        match score_eligibility(&ctx.config.rules, &profile, &solution) {
            Some(score) if score.outcome.score >= threshold => {
                let outcome = score.outcome;
                let mut properties = PropertyMap::new();
                properties.insert("eligibilityScore".to_string(), outcome.score.into());
                if let Some(urgency) = outcome.urgency {
                    properties.insert("urgency".to_string(), urgency.as_str().into());
                }
                if let Some(benefit) = outcome.expected_benefit {
                    properties.insert("expectedBenefit".to_string(), benefit.into());
                }
                if let Some(action) = outcome.action_required {
                    properties.insert("actionRequired".to_string(), action.into());
                }
                properties.insert("matchedRule".to_string(), score.rule.into());
                properties.insert(
                    "rulesVersion".to_string(),
                    ctx.config.rules.version.as_str().into(),
                );
                plan.write(ctx.store, RelType::EligibleFor, source.id, target.id, properties);
            }
            _ => plan.below_threshold += 1,
        }
    }
    Ok(plan)
}

fn plan_similarity(ctx: &JobContext<'_>, source: &Node) -> EngineResult<SourcePlan> {
    let profile = company(source)?;
    let threshold = ctx.config.thresholds.similarity;
    let mut plan = SourcePlan::default();
    for target in ctx.targets {
        if target.id == source.id {
            continue;
        }
        let Some(peer) = CompanyProfile::from_node(target) else {
            continue;
        };
        let score = score_similarity(&ctx.config.peers, &profile, &peer);
        if score.score < threshold {
            plan.below_threshold += 1;
            continue;
        }
        let mut properties = PropertyMap::new();
        properties.insert("similarityScore".to_string(), score.score.into());
        properties.insert("matchingFactors".to_string(), score.matching_factors.into());
        plan.write(ctx.store, RelType::SimilarTo, source.id, target.id, properties);
    }
    Ok(plan)
}

fn plan_competition(ctx: &JobContext<'_>, source: &Node) -> EngineResult<SourcePlan> {
    let profile = company(source)?;
    let threshold = ctx.config.thresholds.similarity;
    let mut plan = SourcePlan::default();
    for target in ctx.targets {
        let Some(peer) = CompanyProfile::from_node(target) else {
            continue;
        };
        match score_competition(&profile, &peer) {
            Some(score) if score.score >= threshold => {
                let mut properties = PropertyMap::new();
                properties.insert("similarityScore".to_string(), score.score.into());
                properties.insert("competitionType".to_string(), score.competition_type.into());
                properties.insert("commonFactors".to_string(), score.common_factors.into());
                plan.write(ctx.store, RelType::CompetesWith, source.id, target.id, properties.clone());
                plan.write(ctx.store, RelType::CompetesWith, target.id, source.id, properties);
            }
            Some(_) => plan.below_threshold += 1,
            None => {}
        }
    }
    Ok(plan)
}

fn plan_impact(ctx: &JobContext<'_>, source: &Node) -> EngineResult<Option<SourcePlan>> {
    let Some(news) = NewsView::from_node(source) else {
        return Err(EngineError::InvalidAttribute {
            entity: format!("{}({})", source.kind, source.key),
            attribute: "kind".to_string(),
            reason: "is not a news article".to_string(),
        });
    };
    let published = news
        .publish_date
        .ok_or_else(|| EngineError::missing_attribute(format!("NewsArticle({})", news.title), "publishDate"))?;
    let window = Duration::hours(ctx.config.news.recency_window_hours);
    let as_of = ctx.as_of.timestamp_millis();
    let earliest = (ctx.as_of - window).timestamp_millis();
    if published < earliest || published > as_of {
        return Ok(None);
    }

    let threshold = ctx.config.thresholds.impact;
    let mut plan = SourcePlan::default();
    for target in ctx.targets {
        let mentions: Vec<&str> = match target.kind {
            NodeKind::SubjectCompany | NodeKind::ReferenceCompany => {
                target.text("sector").into_iter().chain([target.key.as_str()]).collect()
            }
            NodeKind::MacroIndicator => vec![target.key.as_str()],
            _ => continue,
        };
        match score_impact(&ctx.config.rules, &news, &mentions) {
            Some(score) if score.score >= threshold => {
                let mut properties = PropertyMap::new();
                properties.insert("impactScore".to_string(), score.score.into());
                properties.insert("impactDirection".to_string(), score.direction.as_str().into());
                properties.insert("rationale".to_string(), format!("rule {}", score.rule).into());
                plan.write(ctx.store, RelType::Impacts, source.id, target.id, properties);
            }
            _ => plan.below_threshold += 1,
        }
    }
    Ok(Some(plan))
}
