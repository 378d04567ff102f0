//! Export revenue effect of a won/dollar move

use super::{hundred, months, round_currency, to_decimal};
use crate::config::SimulationConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::CompanyProfile;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One company under one exchange-rate scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxImpact {
    pub company: String,
    pub export_revenue: Decimal,
    /// Won per dollar; positive is a weaker won
    pub won_move: Decimal,
    /// Rounded to currency precision; positive is extra revenue
    pub monthly_effect: Decimal,
    pub annual_effect: Decimal,
}

/// Annual change in export revenue: `effect_pct` of it for every
/// `step_won` the won moves. `None` outside the decimal range.
fn revenue_effect(export_revenue: Decimal, won_move: Decimal, step_won: Decimal, effect_pct: Decimal) -> Option<Decimal> {
    if step_won.is_zero() {
        return None;
    }
    export_revenue
        .checked_mul(effect_pct)?
        .checked_div(hundred())?
        .checked_mul(won_move)?
        .checked_div(step_won)
}

/// Export revenue effect of a `won_move` for a company profile
///
/// Needs both `revenue` and `exportRatioPct`; a company that does not
/// export gets a zero effect.
pub fn fx_impact(company: &CompanyProfile, won_move: Decimal, config: &SimulationConfig) -> EngineResult<FxImpact> {
    let entity = company.entity();
    let revenue = to_decimal(&entity, "revenue", company.require("revenue", company.revenue)?)?;
    let export_pct = to_decimal(
        &entity,
        "exportRatioPct",
        company.require("exportRatioPct", company.export_ratio_pct)?,
    )?;
    let out_of_range = || EngineError::InvalidAttribute {
        entity: entity.clone(),
        attribute: "revenue".to_string(),
        reason: format!("effect of a {} won move is out of decimal range", won_move),
    };

    let export_revenue = revenue
        .checked_mul(export_pct)
        .and_then(|v| v.checked_div(hundred()))
        .ok_or_else(out_of_range)?;
    let annual = revenue_effect(export_revenue, won_move, config.fx_step_won, config.fx_revenue_effect_pct)
        .ok_or_else(out_of_range)?;
    let monthly = annual.checked_div(months()).ok_or_else(out_of_range)?;

    Ok(FxImpact {
        company: company.name.clone(),
        export_revenue: round_currency(export_revenue),
        won_move,
        monthly_effect: round_currency(monthly),
        annual_effect: round_currency(annual),
    })
}
