//! RiskGraph
//!
//! An in-memory risk-intelligence graph: companies, macro indicators, news,
//! policies and financial products connected by scored relationships.
//!
//! # Architecture
//!
//! - [`graph`]: typed property graph with natural-key upserts, one edge per
//!   `(source, type, target)` triple, snapshot reads and bounded traversal
//! - [`schema`]: static catalogue of node kinds and relationship types
//! - [`scoring`]: ordered, first-match-wins rule tables; pure functions only
//! - [`upsert`]: the single mutating entry point that materialises scored
//!   relationships and reconciles stale ones
//! - [`analysis`]: multi-hop propagation and cohort aggregation
//! - [`simulation`]: exact-decimal interest-rate scenarios
//! - [`report`]: gap analysis and per-company summaries
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use riskgraph::upsert::{EntitySelector, RecomputeRequest, RelationshipJob, RelationshipService};
//! use riskgraph::{props, EngineConfig, NodeKind, PropertyValue, SharedGraph};
//!
//! let graph = SharedGraph::new();
//! graph
//!     .upsert_node(
//!         NodeKind::SubjectCompany,
//!         props([
//!             ("companyName", PropertyValue::from("Acme")),
//!             ("variableRateDebt", PropertyValue::Float(8.0e9)),
//!         ]),
//!     )
//!     .unwrap();
//! graph
//!     .upsert_node(
//!         NodeKind::MacroIndicator,
//!         props([
//!             ("indicatorName", PropertyValue::from("기준금리")),
//!             ("value", PropertyValue::Float(2.5)),
//!         ]),
//!     )
//!     .unwrap();
//!
//! let config = EngineConfig::default();
//! let service = RelationshipService::new(&graph, &config);
//! let request = RecomputeRequest::new(
//!     RelationshipJob::Exposure,
//!     EntitySelector::all(NodeKind::SubjectCompany),
//!     Utc::now(),
//! );
//! let report = service.recompute(&request).unwrap();
//! assert_eq!(report.created, 1);
//!
//! // Same inputs, same graph
//! let again = service.recompute(&request).unwrap();
//! assert_eq!(again.created, 0);
//! assert_eq!(again.unchanged, 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod report;
pub mod schema;
pub mod scoring;
pub mod simulation;
pub mod upsert;

// Re-export main types for convenience
pub use graph::{
    props, Direction, Edge, EdgeId, EdgeType, GraphError, GraphResult, GraphStore, HopClass, Label, Node,
    NodeId, Path, PropertyMap, PropertyValue, SharedGraph, TraversalStep, UpsertOutcome,
};

pub use schema::{NodeKind, RelType, SchemaError, SchemaRegistry};

pub use error::{EngineError, EngineResult, EntityFailure};

pub use config::{ConfigError, EngineConfig};

pub use model::{CompanyProfile, ExposureLevel, ImpactDirection, RiskCategory};

pub use scoring::RuleSet;

pub use upsert::{
    ConflictPolicy, EntitySelector, RecomputeReport, RecomputeRequest, RelationshipJob, RelationshipService,
    StaleEdgePolicy,
};

pub use analysis::{CohortOutcome, PathAnalyzer, PathSet, ScoredPath};

pub use simulation::{interest_cost_delta, CostDelta, FxImpact, Severity, SimulationEngine, SimulationResult};

pub use report::{AggregationSummary, GapAnalysis, GapVerdict, Reporter, SummaryBatch};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
