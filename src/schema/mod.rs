//! Static catalogue of node labels, relationship types and their
//! attribute contracts

mod registry;

pub use registry::{
    AttrKind, AttributeSpec, NodeSchema, RelSchema, SchemaError, SchemaRegistry, ScoreKind,
};

use crate::graph::EdgeType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label shared by both company variants
pub const COMPANY_LABEL: &str = "Company";

/// Kind of node, one per ingestion feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// The analysed firm
    SubjectCompany,
    /// Benchmark peer
    ReferenceCompany,
    MacroIndicator,
    NewsArticle,
    Policy,
    FinancialProduct,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::SubjectCompany,
        NodeKind::ReferenceCompany,
        NodeKind::MacroIndicator,
        NodeKind::NewsArticle,
        NodeKind::Policy,
        NodeKind::FinancialProduct,
    ];

    /// Primary label
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::SubjectCompany => "SubjectCompany",
            NodeKind::ReferenceCompany => "ReferenceCompany",
            NodeKind::MacroIndicator => "MacroIndicator",
            NodeKind::NewsArticle => "NewsArticle",
            NodeKind::Policy => "Policy",
            NodeKind::FinancialProduct => "FinancialProduct",
        }
    }

    /// All labels a node of this kind carries
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            NodeKind::SubjectCompany => &["SubjectCompany", COMPANY_LABEL],
            NodeKind::ReferenceCompany => &["ReferenceCompany", COMPANY_LABEL],
            NodeKind::MacroIndicator => &["MacroIndicator"],
            NodeKind::NewsArticle => &["NewsArticle"],
            NodeKind::Policy => &["Policy"],
            NodeKind::FinancialProduct => &["FinancialProduct"],
        }
    }

    pub fn is_company(&self) -> bool {
        matches!(self, NodeKind::SubjectCompany | NodeKind::ReferenceCompany)
    }

    /// Policies and products are the candidate solutions
    pub fn is_solution(&self) -> bool {
        matches!(self, NodeKind::Policy | NodeKind::FinancialProduct)
    }

    /// Attribute holding the natural key
    pub fn key_attribute(&self) -> &'static str {
        SchemaRegistry::node(*self).key_attribute
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NodeKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| SchemaError::UnknownKind(s.to_string()))
    }
}

/// Relationship type materialised by the upsert service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelType {
    /// Company → MacroIndicator
    ExposedTo,
    /// NewsArticle → Company | MacroIndicator
    Impacts,
    /// Company → Policy | FinancialProduct
    EligibleFor,
    /// Company → ReferenceCompany
    SimilarTo,
    /// ReferenceCompany ↔ ReferenceCompany
    CompetesWith,
}

impl RelType {
    pub const ALL: [RelType; 5] = [
        RelType::ExposedTo,
        RelType::Impacts,
        RelType::EligibleFor,
        RelType::SimilarTo,
        RelType::CompetesWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::ExposedTo => "EXPOSED_TO",
            RelType::Impacts => "IMPACTS",
            RelType::EligibleFor => "ELIGIBLE_FOR",
            RelType::SimilarTo => "SIMILAR_TO",
            RelType::CompetesWith => "COMPETES_WITH",
        }
    }

    pub fn edge_type(&self) -> EdgeType {
        EdgeType::new(self.as_str())
    }

    /// Property holding the edge score
    pub fn score_field(&self) -> &'static str {
        SchemaRegistry::relationship(*self).score_field
    }

    pub fn from_edge_type(edge_type: &EdgeType) -> Option<RelType> {
        RelType::ALL
            .iter()
            .copied()
            .find(|rel| rel.as_str() == edge_type.as_str())
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelType::ALL
            .iter()
            .copied()
            .find(|rel| rel.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SchemaError::UnknownRelationship(s.to_string()))
    }
}
