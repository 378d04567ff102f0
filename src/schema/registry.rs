use super::{NodeKind, RelType};
use crate::graph::{PropertyMap, PropertyValue};
use thiserror::Error;

/// Schema contract violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown node kind: {0}")]
    UnknownKind(String),

    #[error("Unknown relationship type: {0}")]
    UnknownRelationship(String),

    #[error("{kind} is missing its key attribute {attribute}")]
    MissingKey { kind: NodeKind, attribute: &'static str },

    #[error("{owner} is missing required attribute {attribute}")]
    MissingAttribute { owner: String, attribute: &'static str },

    #[error("{owner}.{attribute} expected {expected}, found {found}")]
    WrongType {
        owner: String,
        attribute: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{owner}.{attribute} must be >= 0, found {value}")]
    Negative { owner: String, attribute: &'static str, value: f64 },

    #[error("{owner}.{attribute} must be one of {allowed:?}, found {value}")]
    NotInEnum {
        owner: String,
        attribute: &'static str,
        allowed: &'static [&'static str],
        value: String,
    },

    #[error("{rel} cannot start at a {kind} node")]
    SourceNotAllowed { rel: RelType, kind: NodeKind },

    #[error("{rel} cannot end at a {kind} node")]
    TargetNotAllowed { rel: RelType, kind: NodeKind },

    #[error("{rel}.{field} must lie in [0, 1], found {value}")]
    ScoreOutOfRange { rel: RelType, field: &'static str, value: f64 },
}

/// Value contract of one attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrKind {
    Text,
    /// Finite number, any sign
    Number,
    /// Finite number >= 0
    NonNegative,
    /// `PropertyValue::DateTime`
    Timestamp,
    /// Text restricted to a closed set (compared case-insensitively)
    Enum(&'static [&'static str]),
    /// Array of strings
    TextList,
}

impl AttrKind {
    fn expected(&self) -> &'static str {
        match self {
            AttrKind::Text | AttrKind::Enum(_) => "String",
            AttrKind::Number | AttrKind::NonNegative => "number",
            AttrKind::Timestamp => "DateTime",
            AttrKind::TextList => "Array of String",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttrKind,
    pub required: bool,
}

const fn attr(name: &'static str, kind: AttrKind, required: bool) -> AttributeSpec {
    AttributeSpec { name, kind, required }
}

/// Contract of one node kind
#[derive(Debug)]
pub struct NodeSchema {
    pub kind: NodeKind,
    pub key_attribute: &'static str,
    pub attributes: &'static [AttributeSpec],
}

/// How a relationship's score is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Number in [0, 1]
    UnitInterval,
    /// LOW / MEDIUM / HIGH
    ExposureLevel,
}

/// Contract of one relationship type
#[derive(Debug)]
pub struct RelSchema {
    pub rel_type: RelType,
    pub sources: &'static [NodeKind],
    pub targets: &'static [NodeKind],
    pub score_field: &'static str,
    pub score_kind: ScoreKind,
    pub fields: &'static [AttributeSpec],
    /// Materialised in both directions
    pub symmetric: bool,
}

pub const NEWS_CATEGORIES: &[&str] = &["financial", "manufacturing", "policy", "macro", "other"];
pub const EXPOSURE_LEVELS: &[&str] = &["LOW", "MEDIUM", "HIGH"];
pub const IMPACT_DIRECTIONS: &[&str] = &["POSITIVE", "NEGATIVE", "NEUTRAL"];
pub const RISK_TYPES: &[&str] = &["interest_rate", "fx", "other"];

const COMPANY_ATTRIBUTES: &[AttributeSpec] = &[
    attr("companyName", AttrKind::Text, true),
    attr("sector", AttrKind::Text, false),
    attr("revenue", AttrKind::NonNegative, false),
    attr("debtAmount", AttrKind::NonNegative, false),
    attr("variableRateDebt", AttrKind::NonNegative, false),
    attr("employeeCount", AttrKind::NonNegative, false),
    attr("debtRatio", AttrKind::NonNegative, false),
    attr("variableRateExposure", AttrKind::NonNegative, false),
    attr("exportRatioPct", AttrKind::NonNegative, false),
    attr("fxSensitivityScore", AttrKind::Number, false),
];

static NODE_SCHEMAS: [NodeSchema; 6] = [
    NodeSchema {
        kind: NodeKind::SubjectCompany,
        key_attribute: "companyName",
        attributes: COMPANY_ATTRIBUTES,
    },
    NodeSchema {
        kind: NodeKind::ReferenceCompany,
        key_attribute: "companyName",
        attributes: COMPANY_ATTRIBUTES,
    },
    NodeSchema {
        kind: NodeKind::MacroIndicator,
        key_attribute: "indicatorName",
        attributes: &[
            attr("indicatorName", AttrKind::Text, true),
            attr("value", AttrKind::Number, true),
            attr("changeRate", AttrKind::Number, false),
            attr("unit", AttrKind::Text, false),
            attr("lastUpdated", AttrKind::Timestamp, false),
        ],
    },
    NodeSchema {
        kind: NodeKind::NewsArticle,
        key_attribute: "title",
        attributes: &[
            attr("title", AttrKind::Text, true),
            attr("publisher", AttrKind::Text, false),
            attr("category", AttrKind::Enum(NEWS_CATEGORIES), true),
            attr("publishDate", AttrKind::Timestamp, false),
        ],
    },
    NodeSchema {
        kind: NodeKind::Policy,
        key_attribute: "policyName",
        attributes: &[
            attr("policyName", AttrKind::Text, true),
            attr("issuingOrg", AttrKind::Text, false),
            attr("supportField", AttrKind::Text, false),
            attr("targetBusiness", AttrKind::Text, false),
            attr("eligibilityText", AttrKind::Text, false),
        ],
    },
    NodeSchema {
        kind: NodeKind::FinancialProduct,
        key_attribute: "productName",
        attributes: &[
            attr("productName", AttrKind::Text, true),
            attr("productType", AttrKind::Text, false),
            attr("interestType", AttrKind::Text, false),
            attr("description", AttrKind::Text, false),
        ],
    },
];

const COMPANIES: &[NodeKind] = &[NodeKind::SubjectCompany, NodeKind::ReferenceCompany];

static REL_SCHEMAS: [RelSchema; 5] = [
    RelSchema {
        rel_type: RelType::ExposedTo,
        sources: COMPANIES,
        targets: &[NodeKind::MacroIndicator],
        score_field: "exposureLevel",
        score_kind: ScoreKind::ExposureLevel,
        fields: &[
            attr("rationale", AttrKind::Text, false),
            attr("riskType", AttrKind::Enum(RISK_TYPES), true),
        ],
        symmetric: false,
    },
    RelSchema {
        rel_type: RelType::Impacts,
        sources: &[NodeKind::NewsArticle],
        targets: &[
            NodeKind::SubjectCompany,
            NodeKind::ReferenceCompany,
            NodeKind::MacroIndicator,
        ],
        score_field: "impactScore",
        score_kind: ScoreKind::UnitInterval,
        fields: &[
            attr("impactDirection", AttrKind::Enum(IMPACT_DIRECTIONS), true),
            attr("rationale", AttrKind::Text, false),
        ],
        symmetric: false,
    },
    RelSchema {
        rel_type: RelType::EligibleFor,
        sources: COMPANIES,
        targets: &[NodeKind::Policy, NodeKind::FinancialProduct],
        score_field: "eligibilityScore",
        score_kind: ScoreKind::UnitInterval,
        fields: &[
            attr("urgency", AttrKind::Enum(EXPOSURE_LEVELS), false),
            attr("expectedBenefit", AttrKind::Text, false),
            attr("actionRequired", AttrKind::Text, false),
        ],
        symmetric: false,
    },
    RelSchema {
        rel_type: RelType::SimilarTo,
        sources: COMPANIES,
        targets: &[NodeKind::ReferenceCompany],
        score_field: "similarityScore",
        score_kind: ScoreKind::UnitInterval,
        fields: &[attr("matchingFactors", AttrKind::TextList, false)],
        symmetric: false,
    },
    RelSchema {
        rel_type: RelType::CompetesWith,
        sources: &[NodeKind::ReferenceCompany],
        targets: &[NodeKind::ReferenceCompany],
        score_field: "similarityScore",
        score_kind: ScoreKind::UnitInterval,
        fields: &[
            attr("competitionType", AttrKind::Text, false),
            attr("commonFactors", AttrKind::TextList, false),
        ],
        symmetric: true,
    },
];

/// Lookup and validation over the static catalogue
pub struct SchemaRegistry;

impl SchemaRegistry {
    pub fn node(kind: NodeKind) -> &'static NodeSchema {
        // ALL and NODE_SCHEMAS share the declaration order
        &NODE_SCHEMAS[kind as usize]
    }

    pub fn relationship(rel: RelType) -> &'static RelSchema {
        &REL_SCHEMAS[rel as usize]
    }

    pub fn nodes() -> &'static [NodeSchema] {
        &NODE_SCHEMAS
    }

    pub fn relationships() -> &'static [RelSchema] {
        &REL_SCHEMAS
    }

    /// Check an attribute bag against its node contract and return the
    /// natural key
    pub fn validate_node(kind: NodeKind, properties: &PropertyMap) -> Result<String, SchemaError> {
        let schema = Self::node(kind);
        let key = properties
            .get(schema.key_attribute)
            .and_then(PropertyValue::as_string)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(SchemaError::MissingKey {
                kind,
                attribute: schema.key_attribute,
            })?;
        check_attributes(&format!("{}({})", kind, key), schema.attributes, properties)?;
        Ok(key.to_string())
    }

    /// Check endpoint kinds, score range and qualitative fields of an edge
    pub fn validate_edge(
        rel: RelType,
        source: NodeKind,
        target: NodeKind,
        properties: &PropertyMap,
    ) -> Result<(), SchemaError> {
        let schema = Self::relationship(rel);
        if !schema.sources.contains(&source) {
            return Err(SchemaError::SourceNotAllowed { rel, kind: source });
        }
        if !schema.targets.contains(&target) {
            return Err(SchemaError::TargetNotAllowed { rel, kind: target });
        }

        let owner = rel.as_str().to_string();
        let score = properties.get(schema.score_field).ok_or_else(|| SchemaError::MissingAttribute {
            owner: owner.clone(),
            attribute: schema.score_field,
        })?;
        match schema.score_kind {
            ScoreKind::UnitInterval => {
                let value = score.as_number().ok_or_else(|| SchemaError::WrongType {
                    owner: owner.clone(),
                    attribute: schema.score_field,
                    expected: "number",
                    found: score.type_name(),
                })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(SchemaError::ScoreOutOfRange {
                        rel,
                        field: schema.score_field,
                        value,
                    });
                }
            }
            ScoreKind::ExposureLevel => {
                check_value(&owner, schema.score_field, AttrKind::Enum(EXPOSURE_LEVELS), score)?;
            }
        }
        check_attributes(&owner, schema.fields, properties)
    }
}

fn check_attributes(
    owner: &str,
    specs: &'static [AttributeSpec],
    properties: &PropertyMap,
) -> Result<(), SchemaError> {
    for spec in specs {
        match properties.get(spec.name) {
            None | Some(PropertyValue::Null) => {
                if spec.required {
                    return Err(SchemaError::MissingAttribute {
                        owner: owner.to_string(),
                        attribute: spec.name,
                    });
                }
            }
            Some(value) => check_value(owner, spec.name, spec.kind, value)?,
        }
    }
    Ok(())
}

fn check_value(
    owner: &str,
    attribute: &'static str,
    kind: AttrKind,
    value: &PropertyValue,
) -> Result<(), SchemaError> {
    let wrong_type = || SchemaError::WrongType {
        owner: owner.to_string(),
        attribute,
        expected: kind.expected(),
        found: value.type_name(),
    };

    match kind {
        AttrKind::Text => value.as_string().map(|_| ()).ok_or_else(wrong_type),
        AttrKind::Number => value
            .as_number()
            .filter(|n| n.is_finite())
            .map(|_| ())
            .ok_or_else(wrong_type),
        AttrKind::NonNegative => {
            let n = value.as_number().filter(|n| n.is_finite()).ok_or_else(wrong_type)?;
            if n < 0.0 {
                return Err(SchemaError::Negative {
                    owner: owner.to_string(),
                    attribute,
                    value: n,
                });
            }
            Ok(())
        }
        AttrKind::Timestamp => value.as_datetime().map(|_| ()).ok_or_else(wrong_type),
        AttrKind::Enum(allowed) => {
            let text = value.as_string().ok_or_else(wrong_type)?;
            if allowed.iter().any(|a| a.eq_ignore_ascii_case(text)) {
                Ok(())
            } else {
                Err(SchemaError::NotInEnum {
                    owner: owner.to_string(),
                    attribute,
                    allowed,
                    value: text.to_string(),
                })
            }
        }
        AttrKind::TextList => {
            let items = value.as_array().ok_or_else(wrong_type)?;
            if items.iter().all(|item| item.as_string().is_some()) {
                Ok(())
            } else {
                Err(wrong_type())
            }
        }
    }
}
