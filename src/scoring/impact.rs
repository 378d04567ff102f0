//! Impact of news articles on companies and indicators

use super::rules::RuleContext;
use super::RuleSet;
use crate::model::{ImpactDirection, NewsView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub score: f64,
    pub direction: ImpactDirection,
    pub rule: String,
}

/// Score one article against one target
///
/// `mentions` are the target's identifying terms (sector and name for a
/// company, name for an indicator). Score and direction come from two
/// independent tables; an unmatched direction is NEUTRAL.
pub fn score_impact(rules: &RuleSet, news: &NewsView, mentions: &[&str]) -> Option<ImpactScore> {
    let ctx = RuleContext::new(&news.title)
        .with_category(Some(news.category.as_str()))
        .with_mentions(mentions.iter().copied());
    let rule = rules.impact.evaluate(&ctx)?;
    let direction = rules
        .direction
        .evaluate(&ctx)
        .map(|r| r.then)
        .unwrap_or(ImpactDirection::Neutral);
    Some(ImpactScore {
        score: rule.then,
        direction,
        rule: rule.name.clone(),
    })
}
