//! Typed views over node attribute bags and the categorical vocabularies
//! shared by scoring and analysis

use crate::error::{EngineError, EngineResult};
use crate::graph::{Node, NodeId};
use crate::schema::NodeKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categorical exposure level stored on EXPOSED_TO edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExposureLevel {
    Low,
    Medium,
    High,
}

impl ExposureLevel {
    /// Aggregation weight
    pub fn weight(&self) -> f64 {
        match self {
            ExposureLevel::High => 0.9,
            ExposureLevel::Medium => 0.6,
            ExposureLevel::Low => 0.3,
        }
    }

    /// Level a continuous risk value: > 0.7 HIGH, > 0.4 MEDIUM, else LOW
    pub fn from_risk(risk: f64) -> Self {
        if risk > 0.7 {
            ExposureLevel::High
        } else if risk > 0.4 {
            ExposureLevel::Medium
        } else {
            ExposureLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureLevel::Low => "LOW",
            ExposureLevel::Medium => "MEDIUM",
            ExposureLevel::High => "HIGH",
        }
    }

    /// MEDIUM or HIGH
    pub fn is_material(&self) -> bool {
        *self >= ExposureLevel::Medium
    }
}

impl fmt::Display for ExposureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExposureLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(ExposureLevel::Low),
            "MEDIUM" => Ok(ExposureLevel::Medium),
            "HIGH" => Ok(ExposureLevel::High),
            other => Err(format!("unknown exposure level: {}", other)),
        }
    }
}

/// Sign of a news article's effect on its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactDirection {
    Positive,
    Negative,
    Neutral,
}

impl ImpactDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactDirection::Positive => "POSITIVE",
            ImpactDirection::Negative => "NEGATIVE",
            ImpactDirection::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for ImpactDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which macro risk an indicator represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    InterestRate,
    Fx,
    Other,
}

impl RiskCategory {
    /// Value of the `riskType` edge field
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::InterestRate => "interest_rate",
            RiskCategory::Fx => "fx",
            RiskCategory::Other => "other",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interest_rate" => Ok(RiskCategory::InterestRate),
            "fx" => Ok(RiskCategory::Fx),
            "other" => Ok(RiskCategory::Other),
            other => Err(format!("unknown risk type: {}", other)),
        }
    }
}

/// Financial attributes of a Subject or Reference company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub sector: Option<String>,
    pub revenue: Option<f64>,
    pub debt_amount: Option<f64>,
    pub variable_rate_debt: Option<f64>,
    pub employee_count: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub variable_rate_exposure: Option<f64>,
    pub export_ratio_pct: Option<f64>,
    /// Signed exchange-rate sensitivity in [-1, 1]
    pub fx_sensitivity_score: Option<f64>,
}

impl CompanyProfile {
    pub fn from_node(node: &Node) -> Option<Self> {
        if !node.kind.is_company() {
            return None;
        }
        Some(CompanyProfile {
            id: node.id,
            kind: node.kind,
            name: node.key.clone(),
            sector: node.text("sector").map(str::to_string),
            revenue: node.number("revenue"),
            debt_amount: node.number("debtAmount"),
            variable_rate_debt: node.number("variableRateDebt"),
            employee_count: node.number("employeeCount"),
            debt_ratio: node.number("debtRatio"),
            variable_rate_exposure: node.number("variableRateExposure"),
            export_ratio_pct: node.number("exportRatioPct"),
            fx_sensitivity_score: node.number("fxSensitivityScore"),
        })
    }

    pub fn is_subject(&self) -> bool {
        self.kind == NodeKind::SubjectCompany
    }

    /// Share of total debt carried at a variable rate, in percent
    pub fn variable_rate_share_pct(&self) -> Option<f64> {
        match (self.variable_rate_debt, self.debt_amount) {
            (Some(variable), Some(total)) if total > 0.0 => Some(variable * 100.0 / total),
            _ => None,
        }
    }

    pub fn has_variable_rate_debt(&self) -> bool {
        self.variable_rate_debt.map_or(false, |v| v > 0.0)
    }

    pub fn exports(&self) -> bool {
        self.export_ratio_pct.map_or(false, |v| v > 0.0)
    }

    /// Required numeric field, failing with InvalidAttribute when absent
    pub fn require(&self, attribute: &str, value: Option<f64>) -> EngineResult<f64> {
        value.ok_or_else(|| EngineError::missing_attribute(self.entity(), attribute))
    }

    pub fn entity(&self) -> String {
        format!("{}({})", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorView {
    pub id: NodeId,
    pub name: String,
    pub value: Option<f64>,
    pub change_rate: Option<f64>,
    pub unit: Option<String>,
}

impl IndicatorView {
    pub fn from_node(node: &Node) -> Option<Self> {
        if node.kind != NodeKind::MacroIndicator {
            return None;
        }
        Some(IndicatorView {
            id: node.id,
            name: node.key.clone(),
            value: node.number("value"),
            change_rate: node.number("changeRate"),
            unit: node.text("unit").map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsView {
    pub id: NodeId,
    pub title: String,
    pub category: String,
    pub publisher: Option<String>,
    /// Unix milliseconds
    pub publish_date: Option<i64>,
}

impl NewsView {
    pub fn from_node(node: &Node) -> Option<Self> {
        if node.kind != NodeKind::NewsArticle {
            return None;
        }
        Some(NewsView {
            id: node.id,
            title: node.key.clone(),
            category: node.text("category").unwrap_or("other").to_ascii_lowercase(),
            publisher: node.text("publisher").map(str::to_string),
            publish_date: node.get_property("publishDate").and_then(|v| v.as_datetime()),
        })
    }
}

/// A Policy or FinancialProduct with the free text rules are matched against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub category: Option<String>,
    pub text: String,
}

impl SolutionView {
    pub fn from_node(node: &Node) -> Option<Self> {
        let (category, fields): (Option<&str>, &[&str]) = match node.kind {
            NodeKind::FinancialProduct => (
                node.text("productType"),
                &["productType", "interestType", "description"],
            ),
            NodeKind::Policy => (
                node.text("supportField"),
                &["issuingOrg", "supportField", "targetBusiness", "eligibilityText"],
            ),
            _ => return None,
        };
        let mut text = node.key.clone();
        for field in fields {
            if let Some(value) = node.text(field) {
                text.push(' ');
                text.push_str(value);
            }
        }
        Some(SolutionView {
            id: node.id,
            kind: node.kind,
            name: node.key.clone(),
            category: category.map(str::to_string),
            text,
        })
    }
}
