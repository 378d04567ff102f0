//! Cohort aggregation over companies sharing a categorical attribute

use crate::config::CohortConfig;
use crate::graph::{Direction, GraphStore, Label, Node};
use crate::model::{CompanyProfile, ExposureLevel};
use crate::schema::{RelType, COMPANY_LABEL};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A mean, or the reason there is none
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortOutcome {
    Average(f64),
    InsufficientSample { size: usize, required: usize },
}

impl CohortOutcome {
    fn from_values(values: &[f64], required: usize) -> Self {
        if values.len() < required || values.is_empty() {
            return CohortOutcome::InsufficientSample {
                size: values.len(),
                required,
            };
        }
        CohortOutcome::Average(values.iter().sum::<f64>() / values.len() as f64)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            CohortOutcome::Average(v) => Some(*v),
            CohortOutcome::InsufficientSample { .. } => None,
        }
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, CohortOutcome::Average(_))
    }
}

/// Mean exposure weight of one cohort towards one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortExposure {
    pub cohort: String,
    pub indicator: String,
    /// Cohort members exposed to the indicator
    pub size: usize,
    pub outcome: CohortOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortProfile {
    pub cohort: String,
    pub size: usize,
    pub debt_ratio: CohortOutcome,
    pub export_ratio_pct: CohortOutcome,
    pub variable_rate_exposure: CohortOutcome,
}

/// How strongly a cohort reacts to one macro factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Estimate {
        coefficient: f64,
        /// 1 - coefficient of variation, clamped to [0.5, 1]
        confidence: f64,
    },
    InsufficientSample { size: usize, required: usize },
}

impl Sensitivity {
    /// Mean of `values` mapped through `scale`, with a dispersion-based
    /// confidence
    fn estimate(values: &[f64], required: usize, scale: impl Fn(f64) -> f64) -> Self {
        if values.len() < required || values.is_empty() {
            return Sensitivity::InsufficientSample {
                size: values.len(),
                required,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let confidence = (1.0 - std / (mean.abs() + 0.001)).clamp(0.5, 1.0);
        Sensitivity::Estimate {
            coefficient: scale(mean),
            confidence,
        }
    }

    pub fn coefficient(&self) -> Option<f64> {
        match self {
            Sensitivity::Estimate { coefficient, .. } => Some(*coefficient),
            Sensitivity::InsufficientSample { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Sensitivity::Estimate { confidence, .. } => Some(*confidence),
            Sensitivity::InsufficientSample { .. } => None,
        }
    }
}

/// Interest-rate and exchange-rate sensitivity of one cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSensitivity {
    pub cohort: String,
    pub size: usize,
    /// From variableRateExposure x debtRatio, in [0, 1]
    pub interest_rate: Sensitivity,
    /// From exportRatioPct and fxSensitivityScore, in [-1, 1]
    pub exchange_rate: Sensitivity,
}

/// Cohort value of a company, normalised for grouping
pub(crate) fn cohort_value(node: &Node, attribute: &str) -> Option<String> {
    node.text(attribute)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

/// Companies of either variant grouped by the configured attribute, in
/// ingestion order of each group's first member
pub fn cohorts<'g>(store: &'g GraphStore, config: &CohortConfig) -> IndexMap<String, Vec<&'g Node>> {
    let mut groups: IndexMap<String, Vec<&Node>> = IndexMap::new();
    for node in store.get_nodes_by_label(&Label::new(COMPANY_LABEL)) {
        if let Some(value) = cohort_value(node, &config.attribute) {
            groups.entry(value).or_default().push(node);
        }
    }
    groups
}

/// Mean exposure weight per (cohort, indicator)
///
/// Companies without a cohort value are left out. Stale edges are ignored.
pub fn cohort_exposures(store: &GraphStore, config: &CohortConfig) -> Vec<CohortExposure> {
    let exposed_to = RelType::ExposedTo.edge_type();
    let mut weights: IndexMap<(String, String), Vec<f64>> = IndexMap::new();

    for (cohort, members) in cohorts(store, config) {
        for company in members {
            for edge in store.get_edges(company.id, Some(&exposed_to), Direction::Outgoing) {
                if edge.is_stale() {
                    continue;
                }
                let Some(level) = edge
                    .text("exposureLevel")
                    .and_then(|l| l.parse::<ExposureLevel>().ok())
                else {
                    continue;
                };
                let Some(indicator) = store.get_node_by_id(edge.target) else {
                    continue;
                };
                weights
                    .entry((cohort.clone(), indicator.key.clone()))
                    .or_default()
                    .push(level.weight());
            }
        }
    }

    weights
        .into_iter()
        .map(|((cohort, indicator), values)| CohortExposure {
            cohort,
            indicator,
            size: values.len(),
            outcome: CohortOutcome::from_values(&values, config.min_size),
        })
        .collect()
}

/// Mean financial figures per cohort; members missing a figure do not
/// count towards that figure's sample
pub fn cohort_profiles(store: &GraphStore, config: &CohortConfig) -> Vec<CohortProfile> {
    cohorts(store, config)
        .into_iter()
        .map(|(cohort, members)| {
            let profiles: Vec<CompanyProfile> = members.iter().filter_map(|n| CompanyProfile::from_node(n)).collect();
            let figure = |get: fn(&CompanyProfile) -> Option<f64>| {
                let values: Vec<f64> = profiles.iter().filter_map(get).collect();
                CohortOutcome::from_values(&values, config.min_size)
            };
            CohortProfile {
                size: profiles.len(),
                debt_ratio: figure(|p| p.debt_ratio),
                export_ratio_pct: figure(|p| p.export_ratio_pct),
                variable_rate_exposure: figure(|p| p.variable_rate_exposure),
                cohort,
            }
        })
        .collect()
}

/// Weight of the export share in the exchange-rate sensitivity; the rest
/// goes to the company's own fxSensitivityScore
const FX_EXPORT_WEIGHT: f64 = 0.7;

/// Per-cohort sensitivity coefficients
///
/// Interest rate: twice the mean of variableRateExposure x debtRatio, capped
/// at 1, over members carrying both. Exchange rate: mean of
/// `0.7 * exportRatioPct / 100 + 0.3 * fxSensitivityScore` over members with
/// an export ratio; a missing score counts as 0.
pub fn cohort_sensitivities(store: &GraphStore, config: &CohortConfig) -> Vec<CohortSensitivity> {
    cohorts(store, config)
        .into_iter()
        .map(|(cohort, members)| {
            let profiles: Vec<CompanyProfile> = members.iter().filter_map(|n| CompanyProfile::from_node(n)).collect();
            let weighted_exposure: Vec<f64> = profiles
                .iter()
                .filter_map(|p| Some(p.variable_rate_exposure? * p.debt_ratio?))
                .collect();
            let weighted_fx: Vec<f64> = profiles
                .iter()
                .filter_map(|p| {
                    let export = p.export_ratio_pct? / 100.0;
                    let score = p.fx_sensitivity_score.unwrap_or(0.0);
                    Some(export * FX_EXPORT_WEIGHT + score * (1.0 - FX_EXPORT_WEIGHT))
                })
                .collect();
            CohortSensitivity {
                size: profiles.len(),
                interest_rate: Sensitivity::estimate(&weighted_exposure, config.min_size, |m| (m * 2.0).min(1.0)),
                exchange_rate: Sensitivity::estimate(&weighted_fx, config.min_size, |m| m.clamp(-1.0, 1.0)),
                cohort,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{props, NodeId, PropertyValue};
    use crate::schema::NodeKind;

    fn company(store: &mut GraphStore, name: &str, sector: &str, debt_ratio: Option<f64>) -> NodeId {
        let mut p = props([
            ("companyName", PropertyValue::from(name)),
            ("sector", PropertyValue::from(sector)),
        ]);
        if let Some(ratio) = debt_ratio {
            p.insert("debtRatio".to_string(), PropertyValue::Float(ratio));
        }
        store.upsert_node(NodeKind::ReferenceCompany, p).unwrap().id()
    }

    fn expose(store: &mut GraphStore, company: NodeId, indicator: NodeId, level: &str) {
        store
            .upsert_edge(
                company,
                RelType::ExposedTo,
                indicator,
                props([("exposureLevel", level), ("riskType", "interest_rate")]),
            )
            .unwrap();
    }

    fn fixture() -> GraphStore {
        let mut store = GraphStore::new();
        let rate = store
            .upsert_node(
                NodeKind::MacroIndicator,
                props([
                    ("indicatorName", PropertyValue::from("기준금리")),
                    ("value", PropertyValue::Float(2.5)),
                ]),
            )
            .unwrap()
            .id();
        let s1 = company(&mut store, "S1", "Steel", Some(1.0));
        let s2 = company(&mut store, "S2", "steel", Some(2.0));
        let s3 = company(&mut store, "S3", "STEEL ", None);
        let c1 = company(&mut store, "C1", "chemicals", Some(0.5));
        let c2 = company(&mut store, "C2", "chemicals", Some(0.7));
        expose(&mut store, s1, rate, "HIGH");
        expose(&mut store, s2, rate, "MEDIUM");
        expose(&mut store, s3, rate, "LOW");
        expose(&mut store, c1, rate, "HIGH");
        expose(&mut store, c2, rate, "HIGH");
        store
    }

    #[test]
    fn test_cohort_of_three_reports_average() {
        let store = fixture();
        let result = cohort_exposures(&store, &CohortConfig::default());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].cohort, "steel");
        assert_eq!(result[0].size, 3);
        let avg = result[0].outcome.value().unwrap();
        assert!((avg - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_cohort_of_two_is_insufficient() {
        let store = fixture();
        let result = cohort_exposures(&store, &CohortConfig::default());
        assert_eq!(result[1].cohort, "chemicals");
        assert_eq!(
            result[1].outcome,
            CohortOutcome::InsufficientSample { size: 2, required: 3 }
        );
        assert!(result[1].outcome.value().is_none());
    }

    #[test]
    fn test_profiles_guard_each_figure() {
        let store = fixture();
        let config = CohortConfig {
            min_size: 2,
            ..CohortConfig::default()
        };
        let profiles = cohort_profiles(&store, &config);
        let steel = &profiles[0];
        assert_eq!(steel.size, 3);
        assert!((steel.debt_ratio.value().unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(
            steel.export_ratio_pct,
            CohortOutcome::InsufficientSample { size: 0, required: 2 }
        );
        assert!((profiles[1].debt_ratio.value().unwrap() - 0.6).abs() < 1e-9);
    }

    fn member(store: &mut GraphStore, name: &str, figures: &[(&str, f64)]) {
        let mut p = props([
            ("companyName", PropertyValue::from(name)),
            ("sector", PropertyValue::from("steel")),
        ]);
        for (key, value) in figures {
            p.insert(key.to_string(), PropertyValue::Float(*value));
        }
        store.upsert_node(NodeKind::ReferenceCompany, p).unwrap();
    }

    #[test]
    fn test_sensitivity_coefficients() {
        let mut store = GraphStore::new();
        member(&mut store, "A", &[("variableRateExposure", 0.5), ("debtRatio", 0.4), ("exportRatioPct", 50.0)]);
        member(&mut store, "B", &[("variableRateExposure", 0.5), ("debtRatio", 0.4), ("exportRatioPct", 50.0)]);
        member(
            &mut store,
            "C",
            &[
                ("variableRateExposure", 0.5),
                ("debtRatio", 0.4),
                ("exportRatioPct", 50.0),
                ("fxSensitivityScore", 1.0),
            ],
        );

        let result = cohort_sensitivities(&store, &CohortConfig::default());
        assert_eq!(result.len(), 1);
        let steel = &result[0];
        assert_eq!(steel.size, 3);
        // mean exposure 0.2, doubled
        assert!((steel.interest_rate.coefficient().unwrap() - 0.4).abs() < 1e-9);
        // identical members: no dispersion
        assert!((steel.interest_rate.confidence().unwrap() - 1.0).abs() < 1e-9);
        // (0.35 + 0.35 + 0.65) / 3
        assert!((steel.exchange_rate.coefficient().unwrap() - 0.45).abs() < 1e-9);
        let confidence = steel.exchange_rate.confidence().unwrap();
        assert!((0.5..1.0).contains(&confidence));
    }

    #[test]
    fn test_sensitivity_capped_and_guarded() {
        let mut store = GraphStore::new();
        for name in ["A", "B", "C"] {
            member(&mut store, name, &[("variableRateExposure", 0.9), ("debtRatio", 2.0)]);
        }
        let result = cohort_sensitivities(&store, &CohortConfig::default());
        assert_eq!(result[0].interest_rate.coefficient(), Some(1.0));
        assert_eq!(
            result[0].exchange_rate,
            Sensitivity::InsufficientSample { size: 0, required: 3 }
        );
    }
}
