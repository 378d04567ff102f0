//! Read-only analysis over graph snapshots
//!
//! - [`paths`]: bounded multi-hop propagation with hop classification and
//!   path scoring
//! - [`cohort`]: per-cohort averages and sensitivity coefficients guarded
//!   by a minimum sample size

pub mod cohort;
pub mod paths;

pub use cohort::{
    cohort_exposures, cohort_profiles, cohort_sensitivities, cohorts, CohortExposure, CohortOutcome, CohortProfile,
    CohortSensitivity, Sensitivity,
};
pub use paths::{composite_risk, edge_score, rank, PathAnalyzer, PathNode, PathSet, ScoredPath};
