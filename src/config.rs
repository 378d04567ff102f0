//! Engine configuration
//!
//! Every section has a default, so an empty YAML document is a valid
//! configuration. Values are validated on load.

use crate::scoring::{PeerOverride, RuleSet};
use crate::upsert::StaleEdgePolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Lowest and highest admissible eligibility gate
pub const ELIGIBILITY_THRESHOLD_RANGE: (f64, f64) = (0.70, 0.75);

/// Inclusion thresholds; a pair scoring below its threshold gets no edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub eligibility: f64,
    pub similarity: f64,
    pub impact: f64,
    /// Minimum eligibilityScore for a solution to count in gap analysis
    pub solution: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            eligibility: 0.70,
            similarity: 0.50,
            impact: 0.70,
            solution: 0.70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub default_max_hops: usize,
    /// Requests above this are clamped
    pub max_hops_limit: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_max_hops: 3,
            max_hops_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub min_size: usize,
    /// Company attribute the cohorts are grouped by
    pub attribute: String,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            min_size: 3,
            attribute: "sector".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub top_n: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub recency_window_hours: i64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            recency_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// indicatorName whose value is the current base rate, in percent
    pub base_rate_indicator: String,
    /// Percentage-point deltas
    pub ladder: Vec<Decimal>,
    /// Exchange-rate move, in won per dollar, that `fx_revenue_effect_pct` applies to
    pub fx_step_won: Decimal,
    /// Change in export revenue per `fx_step_won`, in percent
    pub fx_revenue_effect_pct: Decimal,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_rate_indicator: "기준금리".to_string(),
            ladder: vec![
                Decimal::new(25, 2),
                Decimal::new(50, 2),
                Decimal::new(75, 2),
                Decimal::new(100, 2),
            ],
            fx_step_won: Decimal::new(10, 0),
            fx_revenue_effect_pct: Decimal::new(3, 0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub policy: StaleEdgePolicy,
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub traversal: TraversalConfig,
    pub cohort: CohortConfig,
    pub reporting: ReportingConfig,
    pub news: NewsConfig,
    pub simulation: SimulationConfig,
    pub reconciliation: ReconciliationConfig,
    pub peers: Vec<PeerOverride>,
    pub rules: RuleSet,
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        info!(
            path = %path.display(),
            rules_version = %config.rules.version,
            "Loaded engine configuration"
        );
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("eligibility", t.eligibility),
            ("similarity", t.similarity),
            ("impact", t.impact),
            ("solution", t.solution),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("thresholds.{} must lie in [0, 1], got {}", name, value));
            }
        }
        let (low, high) = ELIGIBILITY_THRESHOLD_RANGE;
        if !(low..=high).contains(&t.eligibility) {
            return invalid(format!(
                "thresholds.eligibility must lie in [{}, {}], got {}",
                low, high, t.eligibility
            ));
        }
        if self.traversal.default_max_hops == 0 {
            return invalid("traversal.default_max_hops must be at least 1".to_string());
        }
        if self.traversal.max_hops_limit < self.traversal.default_max_hops {
            return invalid("traversal.max_hops_limit is below default_max_hops".to_string());
        }
        if self.cohort.min_size == 0 {
            return invalid("cohort.min_size must be at least 1".to_string());
        }
        if self.reporting.top_n == 0 {
            return invalid("reporting.top_n must be at least 1".to_string());
        }
        if self.news.recency_window_hours <= 0 {
            return invalid("news.recency_window_hours must be positive".to_string());
        }
        if self.simulation.ladder.is_empty() {
            return invalid("simulation.ladder must not be empty".to_string());
        }
        if self.simulation.fx_step_won <= Decimal::ZERO {
            return invalid("simulation.fx_step_won must be positive".to_string());
        }
        if let Some(peer) = self.peers.iter().find(|p| !(0.0..=1.0).contains(&p.score)) {
            return invalid(format!(
                "peer score {} -> {} must lie in [0, 1], got {}",
                peer.source, peer.target, peer.score
            ));
        }
        let bad = self.rules.out_of_range_scores();
        if !bad.is_empty() {
            return invalid(format!("rule scores outside [0, 1]: {}", bad.join(", ")));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigResult<()> {
    Err(ConfigError::Invalid(message))
}
