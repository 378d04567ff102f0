//! Scoring rule engine
//!
//! Pure functions from attribute bags (plus optional peer context) to scores
//! or levels. Nothing here touches the graph; the upsert service feeds typed
//! views in and writes the results out.
//!
//! Keyword tables carry English and Korean synonyms, since the feeds mix both.

pub mod eligibility;
pub mod exposure;
pub mod impact;
pub mod rules;
pub mod similarity;

pub use eligibility::{score_eligibility, EligibilityOutcome, EligibilityScore};
pub use exposure::{
    assess_overall_risk, classify_indicator, inherit_exposure, score_exposure, ExposureScore,
    InheritedExposure, RiskAssessment,
};
pub use impact::{score_impact, ImpactScore};
pub use rules::{Predicate, Requirement, Rule, RuleContext, RuleTable};
pub use similarity::{score_competition, score_similarity, CompetitionScore, PeerOverride, SimilarityRule, SimilarityScore};

use crate::model::{ExposureLevel, ImpactDirection, RiskCategory};
use serde::{Deserialize, Serialize};

/// Rule tables shipped with the engine; overridable from configuration
pub const DEFAULT_RULES_VERSION: &str = "2025.08-default";

/// Every ordered table the engine evaluates, under one version tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub version: String,
    /// Indicator name -> risk category
    pub indicator_risk: RuleTable<RiskCategory>,
    pub product_eligibility: RuleTable<EligibilityOutcome>,
    pub policy_eligibility: RuleTable<EligibilityOutcome>,
    /// News -> impact score
    pub impact: RuleTable<f64>,
    /// News -> direction, evaluated independently of `impact`
    pub direction: RuleTable<ImpactDirection>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            version: DEFAULT_RULES_VERSION.to_string(),
            indicator_risk: default_indicator_risk(),
            product_eligibility: default_product_eligibility(),
            policy_eligibility: default_policy_eligibility(),
            impact: default_impact(),
            direction: default_direction(),
        }
    }
}

impl RuleSet {
    /// Scores that fall outside [0, 1], as `table.rule` names
    pub fn out_of_range_scores(&self) -> Vec<String> {
        let eligibility = [
            ("product_eligibility", &self.product_eligibility),
            ("policy_eligibility", &self.policy_eligibility),
        ];
        let mut bad: Vec<String> = eligibility
            .iter()
            .flat_map(|(table, rules)| {
                rules
                    .rules
                    .iter()
                    .filter(|r| !(0.0..=1.0).contains(&r.then.score))
                    .map(move |r| format!("{}.{}", table, r.name))
            })
            .collect();
        bad.extend(
            self.impact
                .rules
                .iter()
                .filter(|r| !(0.0..=1.0).contains(&r.then))
                .map(|r| format!("impact.{}", r.name)),
        );
        bad
    }
}

fn default_indicator_risk() -> RuleTable<RiskCategory> {
    // fx first: "exchange rate" must not fall through to the interest-rate rule
    RuleTable::new(vec![
        Rule::new(
            "fx",
            Predicate::any(&["exchange", "fx", "usd", "krw", "환율", "달러"]),
            RiskCategory::Fx,
        ),
        Rule::new(
            "interest_rate",
            Predicate::any(&["interest", "rate", "yield", "금리", "국고채"]),
            RiskCategory::InterestRate,
        ),
        Rule::new("other", Predicate::Always, RiskCategory::Other),
    ])
}

fn outcome(score: f64, urgency: ExposureLevel, benefit: &str, action: &str) -> EligibilityOutcome {
    EligibilityOutcome {
        score,
        urgency: Some(urgency),
        expected_benefit: Some(benefit.to_string()),
        action_required: Some(action.to_string()),
    }
}

fn default_product_eligibility() -> RuleTable<EligibilityOutcome> {
    RuleTable::new(vec![
        Rule::new(
            "fixed_rate",
            Predicate::any(&["fixed-rate", "fixed rate", "고정금리"]),
            outcome(
                0.95,
                ExposureLevel::High,
                "Caps interest cost against further rate rises",
                "Refinance variable-rate debt into a fixed-rate facility",
            ),
        )
        .requiring(Requirement::VariableRateDebt),
        Rule::new(
            "rate_swap",
            Predicate::any(&["rate-swap", "rate swap", "금리스왑"]),
            outcome(
                0.90,
                ExposureLevel::High,
                "Converts floating payments to fixed without refinancing",
                "Arrange an interest rate swap on the floating tranche",
            ),
        )
        .requiring(Requirement::VariableRateDebt),
        Rule::new(
            "working_capital",
            Predicate::any(&["working-capital", "working capital", "운전자금"]),
            outcome(
                0.85,
                ExposureLevel::Medium,
                "Bridges cash flow while financing costs rise",
                "Apply for a working capital line",
            ),
        ),
        Rule::new(
            "export_fx",
            Predicate::any(&["export", "fx-hedge", "fx hedge", "수출", "환헤지"]),
            outcome(
                0.80,
                ExposureLevel::Medium,
                "Stabilises export receipts against currency swings",
                "Hedge export receivables",
            ),
        )
        .requiring(Requirement::Exports),
        Rule::new(
            "loan",
            Predicate::any(&["loan", "대출"]),
            outcome(
                0.75,
                ExposureLevel::Low,
                "General funding alternative",
                "Compare terms with current lenders",
            ),
        ),
    ])
}

fn default_policy_eligibility() -> RuleTable<EligibilityOutcome> {
    RuleTable::new(vec![
        Rule::new(
            "interest_subsidy",
            Predicate::any(&["interest subsidy", "이차보전"]),
            outcome(
                0.90,
                ExposureLevel::High,
                "Government covers part of the interest burden",
                "Apply for the interest subsidy programme",
            ),
        ),
        Rule::new(
            "manufacturing",
            Predicate::any(&["manufacturing", "제조"]),
            outcome(
                0.85,
                ExposureLevel::Medium,
                "Sector-targeted support for manufacturers",
                "Check manufacturing programme requirements",
            ),
        ),
        Rule::new(
            "sme",
            Predicate::any(&["sme", "small and medium", "중소기업"]),
            outcome(
                0.80,
                ExposureLevel::Medium,
                "Preferential terms for small and medium enterprises",
                "Confirm SME status and apply",
            ),
        ),
        Rule::new(
            "support",
            Predicate::any(&["support", "지원"]),
            outcome(
                0.70,
                ExposureLevel::Low,
                "General public support",
                "Review programme eligibility",
            ),
        ),
    ])
}

fn default_impact() -> RuleTable<f64> {
    RuleTable::new(vec![
        Rule::new(
            "rate_hike",
            Predicate::all(&[&["rate", "금리"], &["hike", "인상", "raise"]]),
            0.90,
        ),
        Rule::new("target_mention", Predicate::TargetMention, 0.85),
        Rule::new("financial_macro", Predicate::category(&["financial", "macro"]), 0.75),
        Rule::new(
            "manufacturing_policy",
            Predicate::category(&["manufacturing", "policy"]),
            0.70,
        ),
        Rule::new("default", Predicate::Always, 0.60),
    ])
}

fn default_direction() -> RuleTable<ImpactDirection> {
    RuleTable::new(vec![
        Rule::new(
            "negative",
            Predicate::any(&[
                "hike", "인상", "decline", "하락", "fall", "drop", "감소", "slowdown", "둔화",
            ]),
            ImpactDirection::Negative,
        ),
        Rule::new(
            "positive",
            Predicate::any(&[
                "support", "지원", "expansion", "확대", "growth", "성장", "cut", "인하",
            ]),
            ImpactDirection::Positive,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scores_in_range() {
        assert!(RuleSet::default().out_of_range_scores().is_empty());
    }

    #[test]
    fn test_default_tables_are_ordered_by_priority() {
        let rules = RuleSet::default();
        let scores: Vec<f64> = rules.product_eligibility.rules.iter().map(|r| r.then.score).collect();
        assert_eq!(scores, vec![0.95, 0.90, 0.85, 0.80, 0.75]);
        let scores: Vec<f64> = rules.policy_eligibility.rules.iter().map(|r| r.then.score).collect();
        assert_eq!(scores, vec![0.90, 0.85, 0.80, 0.70]);
    }

    #[test]
    fn test_out_of_range_detected() {
        let mut rules = RuleSet::default();
        rules.impact.rules[0].then = 1.5;
        assert_eq!(rules.out_of_range_scores(), vec!["impact.rate_hike".to_string()]);
    }
}
