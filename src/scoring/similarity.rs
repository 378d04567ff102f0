//! Peer similarity and competition between companies
//!
//! Similarity is an ordered lookup, not a blend: a named-peer override wins
//! outright, then a sector match, then the generic default.

use crate::model::CompanyProfile;
use serde::{Deserialize, Serialize};

pub const SECTOR_MATCH_SCORE: f64 = 0.8;
pub const DEFAULT_SIMILARITY: f64 = 0.3;

/// Explicit similarity for one named pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerOverride {
    /// companyName of the scoring side
    pub source: String,
    /// companyName of the reference peer
    pub target: String,
    pub score: f64,
    #[serde(default)]
    pub factors: Vec<String>,
}

/// Which step of the lookup produced the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityRule {
    NamedPeer,
    SectorMatch,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub score: f64,
    pub rule: SimilarityRule,
    pub matching_factors: Vec<String>,
}

pub fn score_similarity(
    overrides: &[PeerOverride],
    source: &CompanyProfile,
    target: &CompanyProfile,
) -> SimilarityScore {
    if let Some(peer) = overrides
        .iter()
        .find(|p| p.source == source.name && p.target == target.name)
    {
        let mut factors = vec![format!("named peer: {}", target.name)];
        factors.extend(peer.factors.iter().cloned());
        return SimilarityScore {
            score: peer.score,
            rule: SimilarityRule::NamedPeer,
            matching_factors: factors,
        };
    }

    if let Some(sector) = common_sector(source, target) {
        return SimilarityScore {
            score: SECTOR_MATCH_SCORE,
            rule: SimilarityRule::SectorMatch,
            matching_factors: vec![format!("sector: {}", sector)],
        };
    }

    SimilarityScore {
        score: DEFAULT_SIMILARITY,
        rule: SimilarityRule::Default,
        matching_factors: Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionScore {
    pub score: f64,
    pub competition_type: String,
    pub common_factors: Vec<String>,
}

/// Two distinct reference companies compete when they share a sector
pub fn score_competition(a: &CompanyProfile, b: &CompanyProfile) -> Option<CompetitionScore> {
    if a.id == b.id {
        return None;
    }
    let sector = common_sector(a, b)?;
    Some(CompetitionScore {
        score: SECTOR_MATCH_SCORE,
        competition_type: "same_sector".to_string(),
        common_factors: vec![format!("sector: {}", sector)],
    })
}

fn common_sector<'a>(a: &'a CompanyProfile, b: &CompanyProfile) -> Option<&'a str> {
    let left = a.sector.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let right = b.sector.as_deref().map(str::trim)?;
    left.eq_ignore_ascii_case(right).then_some(left)
}
