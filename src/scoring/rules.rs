//! Ordered, first-match-wins rule tables
//!
//! A table is a list, never a map: position encodes priority, and an input
//! matching several rules takes the outcome of the earliest one.

use crate::model::CompanyProfile;
use serde::{Deserialize, Serialize};

/// Condition on the text and category of the scored entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum Predicate {
    /// At least one keyword occurs in the text
    AnyKeyword { keywords: Vec<String> },
    /// Every group has at least one keyword in the text
    AllKeywords { groups: Vec<Vec<String>> },
    /// The entity's category is one of these
    CategoryIn { categories: Vec<String> },
    /// The text mentions one of the context's target terms (sector, name)
    TargetMention,
    Always,
}

impl Predicate {
    pub fn any(keywords: &[&str]) -> Self {
        Predicate::AnyKeyword {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn all(groups: &[&[&str]]) -> Self {
        Predicate::AllKeywords {
            groups: groups
                .iter()
                .map(|g| g.iter().map(|k| k.to_string()).collect())
                .collect(),
        }
    }

    pub fn category(categories: &[&str]) -> Self {
        Predicate::CategoryIn {
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        match self {
            Predicate::AnyKeyword { keywords } => keywords.iter().any(|k| ctx.contains(k)),
            Predicate::AllKeywords { groups } => groups
                .iter()
                .all(|group| group.iter().any(|k| ctx.contains(k))),
            Predicate::CategoryIn { categories } => ctx
                .category
                .map_or(false, |c| categories.iter().any(|x| x.eq_ignore_ascii_case(c))),
            Predicate::TargetMention => ctx.mentions.iter().any(|m| ctx.contains(m)),
            Predicate::Always => true,
        }
    }
}

/// Condition on the company side of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// variableRateDebt > 0
    VariableRateDebt,
    /// exportRatioPct > 0
    Exports,
}

impl Requirement {
    pub fn satisfied_by(&self, company: Option<&CompanyProfile>) -> bool {
        match (self, company) {
            (Requirement::VariableRateDebt, Some(c)) => c.has_variable_rate_debt(),
            (Requirement::Exports, Some(c)) => c.exports(),
            (_, None) => false,
        }
    }
}

/// One `(predicate -> outcome)` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule<O> {
    pub name: String,
    pub when: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requirement>,
    pub then: O,
}

impl<O> Rule<O> {
    pub fn new(name: &str, when: Predicate, then: O) -> Self {
        Rule {
            name: name.to_string(),
            when,
            requires: None,
            then,
        }
    }

    pub fn requiring(mut self, requirement: Requirement) -> Self {
        self.requires = Some(requirement);
        self
    }

    fn applies(&self, ctx: &RuleContext<'_>) -> bool {
        self.requires.map_or(true, |r| r.satisfied_by(ctx.company)) && self.when.matches(ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable<O> {
    pub rules: Vec<Rule<O>>,
}

impl<O> RuleTable<O> {
    pub fn new(rules: Vec<Rule<O>>) -> Self {
        RuleTable { rules }
    }

    /// First rule whose requirement and predicate both hold
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<&Rule<O>> {
        self.rules.iter().find(|rule| rule.applies(ctx))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// What a rule is evaluated against
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    /// Lower-cased searchable text
    text: String,
    pub category: Option<&'a str>,
    pub mentions: Vec<&'a str>,
    pub company: Option<&'a CompanyProfile>,
}

impl<'a> RuleContext<'a> {
    pub fn new(text: &str) -> Self {
        RuleContext {
            text: text.to_lowercase(),
            category: None,
            mentions: Vec::new(),
            company: None,
        }
    }

    pub fn with_category(mut self, category: Option<&'a str>) -> Self {
        self.category = category;
        self
    }

    pub fn with_mentions(mut self, mentions: impl IntoIterator<Item = &'a str>) -> Self {
        self.mentions
            .extend(mentions.into_iter().map(str::trim).filter(|m| !m.is_empty()));
        self
    }

    pub fn with_company(mut self, company: &'a CompanyProfile) -> Self {
        self.company = Some(company);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        !needle.is_empty()
            && self
                .text
                .match_indices(needle.as_str())
                .any(|(at, found)| on_word_boundary(&self.text, at, at + found.len()))
    }
}

/// Plural endings an ASCII keyword may carry and still match
const PLURAL_SUFFIXES: [&str; 2] = ["es", "s"];

fn joins_word(left: Option<char>, right: Option<char>) -> bool {
    matches!((left, right), (Some(l), Some(r)) if l.is_ascii_alphanumeric() && r.is_ascii_alphanumeric())
}

/// Whether `text[start..end]` stands as a whole word
///
/// Only ASCII letters and digits join words: a Hangul keyword matches inside
/// a longer word, since particles and compounds attach to it.
fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let found = &text[start..end];
    if joins_word(text[..start].chars().next_back(), found.chars().next()) {
        return false;
    }
    let rest = &text[end..];
    let rest = PLURAL_SUFFIXES
        .iter()
        .filter_map(|suffix| rest.strip_prefix(suffix))
        .find(|after| !after.starts_with(|c: char| c.is_ascii_alphanumeric()))
        .unwrap_or(rest);
    !joins_word(found.chars().next_back(), rest.chars().next())
}
