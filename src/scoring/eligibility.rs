//! Eligibility of companies for policies and financial products

use super::rules::RuleContext;
use super::RuleSet;
use crate::model::{CompanyProfile, ExposureLevel, SolutionView};
use crate::schema::NodeKind;
use serde::{Deserialize, Serialize};

/// Right-hand side of an eligibility rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityOutcome {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<ExposureLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_benefit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_required: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityScore {
    /// Name of the matching rule
    pub rule: String,
    #[serde(flatten)]
    pub outcome: EligibilityOutcome,
}

/// First matching eligibility rule for a company/solution pair
///
/// Products and policies have separate tables. Matching runs over the
/// solution's name and descriptive fields; the category field also feeds
/// `category_in` predicates.
pub fn score_eligibility(
    rules: &RuleSet,
    company: &CompanyProfile,
    solution: &SolutionView,
) -> Option<EligibilityScore> {
    let table = match solution.kind {
        NodeKind::FinancialProduct => &rules.product_eligibility,
        NodeKind::Policy => &rules.policy_eligibility,
        _ => return None,
    };
    let ctx = RuleContext::new(&solution.text)
        .with_category(solution.category.as_deref())
        .with_mentions(company.sector.as_deref())
        .with_company(company);
    table.evaluate(&ctx).map(|rule| EligibilityScore {
        rule: rule.name.clone(),
        outcome: rule.then.clone(),
    })
}
