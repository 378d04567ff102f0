//! Interest-rate scenario simulation
//!
//! All currency arithmetic is done in [`Decimal`]. Rates are annual
//! percentages (`5.3` means 5.3%); deltas are percentage points. Monthly
//! figures are the annual figure divided by 12. Cost deltas stay exact;
//! rounding to two places happens only when a result is reported.
//!
//! Arithmetic is checked: inputs that leave the decimal range yield `None`
//! or an `InvalidAttribute` error, never a panic.

use crate::config::SimulationConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::GraphStore;
use crate::model::CompanyProfile;
use crate::schema::NodeKind;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

mod fx;

pub use fx::{fx_impact, FxImpact};

fn hundred() -> Decimal {
    Decimal::new(100, 0)
}

fn months() -> Decimal {
    Decimal::new(12, 0)
}

pub(crate) fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Extra cost caused by a rate change, unrounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CostDelta {
    pub monthly: Decimal,
    pub annual: Decimal,
}

impl CostDelta {
    /// Both figures rounded to currency precision
    pub fn rounded(&self) -> CostDelta {
        CostDelta {
            monthly: round_currency(self.monthly),
            annual: round_currency(self.annual),
        }
    }
}

/// Interest on `principal` at an annual `rate_pct`, for one month
///
/// `None` when the product leaves the decimal range.
pub fn monthly_interest(principal: Decimal, rate_pct: Decimal) -> Option<Decimal> {
    principal
        .checked_mul(rate_pct)?
        .checked_div(hundred())?
        .checked_div(months())
}

/// Cost change when the rate moves from `base_rate_pct` by `delta_pct`
///
/// Equal to the interest at the new rate minus the interest at the base
/// rate. `None` when an intermediate value leaves the decimal range.
pub fn interest_cost_delta(principal: Decimal, base_rate_pct: Decimal, delta_pct: Decimal) -> Option<CostDelta> {
    let new_rate = base_rate_pct.checked_add(delta_pct)?;
    let at_new = principal.checked_mul(new_rate)?;
    let at_base = principal.checked_mul(base_rate_pct)?;
    let annual = at_new.checked_sub(at_base)?.checked_div(hundred())?;
    Some(CostDelta {
        monthly: annual.checked_div(months())?,
        annual,
    })
}

/// Cost deltas for each step of a ladder, in ladder order
///
/// `None` when any step overflows.
pub fn run_ladder(principal: Decimal, base_rate_pct: Decimal, ladder: &[Decimal]) -> Option<Vec<(Decimal, CostDelta)>> {
    ladder
        .iter()
        .map(|delta| interest_cost_delta(principal, base_rate_pct, *delta).map(|cost| (*delta, cost)))
        .collect()
}

/// How hard a cost increase hits, by its share of revenue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// > 2% CRITICAL, > 1% HIGH, > 0.5% MEDIUM, else LOW
    pub fn from_revenue_share(pct: Decimal) -> Self {
        if pct > Decimal::new(2, 0) {
            Severity::Critical
        } else if pct > Decimal::new(1, 0) {
            Severity::High
        } else if pct > Decimal::new(5, 1) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// One company under one rate scenario
///
/// Monthly and annual deltas are rounded to currency precision; the
/// revenue share is computed from the exact annual delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub company: String,
    pub principal: Decimal,
    pub delta_pct: Decimal,
    pub base_rate_pct: Option<Decimal>,
    pub new_rate_pct: Option<Decimal>,
    pub monthly_delta: Decimal,
    pub annual_delta: Decimal,
    /// Annual delta as a share of revenue, in percent
    pub cost_to_revenue_pct: Option<Decimal>,
    pub severity: Option<Severity>,
}

pub(crate) fn to_decimal(entity: &str, attribute: &str, value: f64) -> EngineResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| EngineError::InvalidAttribute {
        entity: entity.to_string(),
        attribute: attribute.to_string(),
        reason: format!("value {} is not representable as a decimal", value),
    })
}

/// Annual cost as a percentage of revenue, to four places
///
/// `None` when revenue is zero at decimal precision or the share overflows.
fn revenue_share_pct(annual: Decimal, revenue: Decimal) -> Option<Decimal> {
    if revenue.is_zero() {
        return None;
    }
    annual
        .checked_div(revenue)?
        .checked_mul(hundred())
        .map(|pct| pct.round_dp(4))
}

/// Simulate one delta for a company profile
///
/// Fails with InvalidAttribute when the company carries no
/// `variableRateDebt` or the scenario overflows the decimal range. A
/// revenue too small to divide by leaves the revenue share unset.
pub fn simulate(
    company: &CompanyProfile,
    base_rate_pct: Option<Decimal>,
    delta_pct: Decimal,
) -> EngineResult<SimulationResult> {
    let entity = company.entity();
    let principal = to_decimal(
        &entity,
        "variableRateDebt",
        company.require("variableRateDebt", company.variable_rate_debt)?,
    )?;
    let cost = interest_cost_delta(principal, base_rate_pct.unwrap_or(Decimal::ZERO), delta_pct).ok_or_else(|| {
        EngineError::InvalidAttribute {
            entity: entity.clone(),
            attribute: "variableRateDebt".to_string(),
            reason: format!("cost of a {} point move is out of decimal range", delta_pct),
        }
    })?;

    let revenue = match company.revenue {
        Some(r) if r > 0.0 => Some(to_decimal(&entity, "revenue", r)?),
        _ => None,
    };
    let cost_to_revenue_pct = revenue.and_then(|r| {
        let share = revenue_share_pct(cost.annual, r);
        if share.is_none() {
            warn!(company = %entity, revenue = %r, "Revenue share not computable");
        }
        share
    });
    let shown = cost.rounded();

    Ok(SimulationResult {
        company: company.name.clone(),
        principal,
        delta_pct,
        base_rate_pct,
        new_rate_pct: base_rate_pct.and_then(|b| b.checked_add(delta_pct)),
        monthly_delta: shown.monthly,
        annual_delta: shown.annual,
        severity: cost_to_revenue_pct.map(Severity::from_revenue_share),
        cost_to_revenue_pct,
    })
}

/// Scenario runner bound to a graph snapshot
pub struct SimulationEngine<'g> {
    store: &'g GraphStore,
    config: &'g SimulationConfig,
}

impl<'g> SimulationEngine<'g> {
    pub fn new(store: &'g GraphStore, config: &'g SimulationConfig) -> Self {
        Self { store, config }
    }

    /// Current value of the configured base-rate indicator, if ingested
    pub fn base_rate(&self) -> Option<Decimal> {
        self.store
            .find_node(NodeKind::MacroIndicator, &self.config.base_rate_indicator)
            .and_then(|n| n.number("value"))
            .and_then(Decimal::from_f64)
    }

    /// A Subject company by name, falling back to a Reference company
    pub fn company(&self, key: &str) -> EngineResult<CompanyProfile> {
        [NodeKind::SubjectCompany, NodeKind::ReferenceCompany]
            .into_iter()
            .find_map(|kind| self.store.find_node(kind, key))
            .and_then(CompanyProfile::from_node)
            .ok_or_else(|| EngineError::NotFound {
                kind: NodeKind::SubjectCompany,
                key: key.to_string(),
            })
    }

    pub fn simulate_company(&self, key: &str, delta_pct: Decimal) -> EngineResult<SimulationResult> {
        let company = self.company(key)?;
        let result = simulate(&company, self.base_rate(), delta_pct)?;
        debug!(
            company = key,
            delta = %delta_pct,
            monthly = %result.monthly_delta,
            "Rate scenario simulated"
        );
        Ok(result)
    }

    /// Ad hoc deltas, in the order given
    pub fn simulate_deltas(&self, key: &str, deltas: &[Decimal]) -> EngineResult<Vec<SimulationResult>> {
        let company = self.company(key)?;
        let base = self.base_rate();
        deltas.iter().map(|d| simulate(&company, base, *d)).collect()
    }

    /// The configured scenario ladder
    pub fn run_ladder(&self, key: &str) -> EngineResult<Vec<SimulationResult>> {
        self.simulate_deltas(key, &self.config.ladder)
    }

    /// Export revenue effect of the won moving `won_move` against the dollar
    pub fn simulate_fx(&self, key: &str, won_move: Decimal) -> EngineResult<FxImpact> {
        let company = self.company(key)?;
        let impact = fx_impact(&company, won_move, self.config)?;
        debug!(
            company = key,
            won_move = %won_move,
            annual = %impact.annual_effect,
            "Exchange-rate scenario simulated"
        );
        Ok(impact)
    }
}
