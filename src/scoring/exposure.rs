//! Exposure of companies to macro indicators

use super::rules::RuleContext;
use super::RuleSet;
use crate::model::{CompanyProfile, ExposureLevel, IndicatorView, RiskCategory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureScore {
    pub level: ExposureLevel,
    pub risk_type: RiskCategory,
    pub rationale: String,
}

/// Risk category of an indicator, by keyword on its name and unit
pub fn classify_indicator(rules: &RuleSet, indicator: &IndicatorView) -> RiskCategory {
    let mut text = indicator.name.clone();
    if let Some(unit) = &indicator.unit {
        text.push(' ');
        text.push_str(unit);
    }
    rules
        .indicator_risk
        .evaluate(&RuleContext::new(&text))
        .map(|rule| rule.then)
        .unwrap_or(RiskCategory::Other)
}

/// Direct exposure of `company` to an indicator of `category`
///
/// `None` means no exposure and therefore no edge.
pub fn score_exposure(company: &CompanyProfile, category: RiskCategory) -> Option<ExposureScore> {
    let (level, rationale) = match category {
        RiskCategory::InterestRate => {
            if company.is_subject() && company.has_variable_rate_debt() {
                let debt = company.variable_rate_debt.unwrap_or_default();
                (
                    ExposureLevel::High,
                    format!("variableRateDebt {} > 0", debt),
                )
            } else {
                let exposure = company.variable_rate_exposure?;
                let level = band(exposure, 0.7, 0.4)?;
                (level, format!("variableRateExposure {}", exposure))
            }
        }
        RiskCategory::Fx => {
            let ratio = company.export_ratio_pct?;
            let level = band(ratio, 50.0, 30.0)?;
            (level, format!("exportRatioPct {}", ratio))
        }
        RiskCategory::Other => return None,
    };
    Some(ExposureScore {
        level,
        risk_type: category,
        rationale,
    })
}

/// > high HIGH, > medium MEDIUM, > 0 LOW, otherwise none
fn band(value: f64, high: f64, medium: f64) -> Option<ExposureLevel> {
    if value > high {
        Some(ExposureLevel::High)
    } else if value > medium {
        Some(ExposureLevel::Medium)
    } else if value > 0.0 {
        Some(ExposureLevel::Low)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritedExposure {
    pub level: ExposureLevel,
    /// max(similarity x weight) over peers
    pub risk: f64,
}

/// Exposure a company inherits from similar peers
///
/// `peers` yields `(similarityScore, peer exposure level)` for every
/// SIMILAR_TO peer exposed to the indicator. The result never falls below
/// `direct`; `None` when there is nothing to inherit or the direct level
/// already dominates.
pub fn inherit_exposure(
    direct: Option<ExposureLevel>,
    peers: impl IntoIterator<Item = (f64, ExposureLevel)>,
) -> Option<InheritedExposure> {
    let risk = peers
        .into_iter()
        .map(|(similarity, level)| similarity * level.weight())
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))?;
    let level = ExposureLevel::from_risk(risk);
    match direct {
        Some(d) if d >= level => None,
        _ => Some(InheritedExposure { level, risk }),
    }
}

/// Overall interest/fx risk of one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: ExposureLevel,
    pub score: f64,
    pub factors: u32,
    pub reasons: Vec<String>,
}

/// Additive risk factors: variable-rate share (>= 70% -> 2, >= 50% -> 1),
/// export ratio (>= 50 -> 2, >= 30 -> 1), one per HIGH exposure.
/// >= 4 is HIGH (0.75), >= 2 MEDIUM (0.50), else LOW (0.25).
pub fn assess_overall_risk(company: &CompanyProfile, high_exposures: usize) -> RiskAssessment {
    let mut factors = 0u32;
    let mut reasons = Vec::new();

    if let Some(share) = company.variable_rate_share_pct() {
        let points = if share >= 70.0 {
            2
        } else if share >= 50.0 {
            1
        } else {
            0
        };
        if points > 0 {
            factors += points;
            reasons.push(format!("variable-rate share {:.1}%", share));
        }
    }

    if let Some(ratio) = company.export_ratio_pct {
        let points = if ratio >= 50.0 {
            2
        } else if ratio >= 30.0 {
            1
        } else {
            0
        };
        if points > 0 {
            factors += points;
            reasons.push(format!("export ratio {:.1}%", ratio));
        }
    }

    if high_exposures > 0 {
        factors += high_exposures as u32;
        reasons.push(format!("{} HIGH exposure(s)", high_exposures));
    }

    let (level, score) = if factors >= 4 {
        (ExposureLevel::High, 0.75)
    } else if factors >= 2 {
        (ExposureLevel::Medium, 0.50)
    } else {
        (ExposureLevel::Low, 0.25)
    };
    RiskAssessment {
        level,
        score,
        factors,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::schema::NodeKind;

    fn company(kind: NodeKind) -> CompanyProfile {
        CompanyProfile {
            id: NodeId::new(1),
            kind,
            name: "Acme".to_string(),
            sector: Some("steel".to_string()),
            revenue: None,
            debt_amount: None,
            variable_rate_debt: None,
            employee_count: None,
            debt_ratio: None,
            variable_rate_exposure: None,
            export_ratio_pct: None,
            fx_sensitivity_score: None,
        }
    }

    fn indicator(name: &str) -> IndicatorView {
        IndicatorView {
            id: NodeId::new(2),
            name: name.to_string(),
            value: Some(1.0),
            change_rate: None,
            unit: None,
        }
    }

    #[test]
    fn test_classify_indicator() {
        let rules = RuleSet::default();
        assert_eq!(classify_indicator(&rules, &indicator("기준금리")), RiskCategory::InterestRate);
        assert_eq!(classify_indicator(&rules, &indicator("Base Rate")), RiskCategory::InterestRate);
        assert_eq!(classify_indicator(&rules, &indicator("USD/KRW exchange rate")), RiskCategory::Fx);
        assert_eq!(classify_indicator(&rules, &indicator("원/달러 환율")), RiskCategory::Fx);
        assert_eq!(classify_indicator(&rules, &indicator("CPI")), RiskCategory::Other);
    }

    #[test]
    fn test_subject_with_variable_debt_is_high() {
        let mut subject = company(NodeKind::SubjectCompany);
        subject.variable_rate_debt = Some(5.0e9);
        let score = score_exposure(&subject, RiskCategory::InterestRate).unwrap();
        assert_eq!(score.level, ExposureLevel::High);
        assert_eq!(score.risk_type, RiskCategory::InterestRate);

        // references are judged on variableRateExposure only
        let mut reference = company(NodeKind::ReferenceCompany);
        reference.variable_rate_debt = Some(5.0e9);
        assert!(score_exposure(&reference, RiskCategory::InterestRate).is_none());
    }

    #[test]
    fn test_interest_rate_bands() {
        let mut reference = company(NodeKind::ReferenceCompany);
        for (exposure, expected) in [
            (0.8, Some(ExposureLevel::High)),
            (0.7, Some(ExposureLevel::Medium)),
            (0.41, Some(ExposureLevel::Medium)),
            (0.4, Some(ExposureLevel::Low)),
            (0.0, None),
        ] {
            reference.variable_rate_exposure = Some(exposure);
            assert_eq!(
                score_exposure(&reference, RiskCategory::InterestRate).map(|s| s.level),
                expected,
                "variableRateExposure {}",
                exposure
            );
        }
    }

    #[test]
    fn test_fx_bands() {
        let mut subject = company(NodeKind::SubjectCompany);
        for (ratio, expected) in [
            (60.0, Some(ExposureLevel::High)),
            (50.0, Some(ExposureLevel::Medium)),
            (30.0, Some(ExposureLevel::Low)),
            (0.0, None),
        ] {
            subject.export_ratio_pct = Some(ratio);
            assert_eq!(score_exposure(&subject, RiskCategory::Fx).map(|s| s.level), expected);
        }
        assert!(score_exposure(&subject, RiskCategory::Other).is_none());
    }

    #[test]
    fn test_inherit_takes_max_and_never_downgrades() {
        let peers = [(0.8, ExposureLevel::High), (0.9, ExposureLevel::Low)];
        let inherited = inherit_exposure(None, peers).unwrap();
        assert!((inherited.risk - 0.72).abs() < 1e-9);
        assert_eq!(inherited.level, ExposureLevel::High);

        assert!(inherit_exposure(Some(ExposureLevel::High), peers).is_none());
        assert_eq!(
            inherit_exposure(Some(ExposureLevel::Low), [(0.8, ExposureLevel::Medium)]).map(|i| i.level),
            Some(ExposureLevel::Medium)
        );
        assert!(inherit_exposure(None, []).is_none());
    }

    #[test]
    fn test_overall_risk_factors() {
        let mut subject = company(NodeKind::SubjectCompany);
        subject.debt_amount = Some(100.0);
        subject.variable_rate_debt = Some(70.0);
        subject.export_ratio_pct = Some(35.0);
        let risk = assess_overall_risk(&subject, 1);
        assert_eq!(risk.factors, 4);
        assert_eq!(risk.level, ExposureLevel::High);
        assert_eq!(risk.score, 0.75);

        let risk = assess_overall_risk(&subject, 0);
        assert_eq!(risk.level, ExposureLevel::Medium);

        let plain = company(NodeKind::SubjectCompany);
        let risk = assess_overall_risk(&plain, 0);
        assert_eq!(risk.level, ExposureLevel::Low);
        assert_eq!(risk.score, 0.25);
        assert!(risk.reasons.is_empty());
    }
}
