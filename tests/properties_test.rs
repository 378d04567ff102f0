//! Behavioural properties that must hold for any input in range

use riskgraph::analysis::{cohort_exposures, CohortOutcome};
use riskgraph::config::CohortConfig;
use riskgraph::model::SolutionView;
use riskgraph::scoring::{score_eligibility, score_similarity, RuleSet};
use riskgraph::simulation::interest_cost_delta;
use riskgraph::{props, CompanyProfile, GraphStore, NodeId, NodeKind, PropertyValue, RelType, TraversalStep};
use rust_decimal::Decimal;

fn profile(name: &str, sector: Option<&str>, variable_rate_debt: Option<f64>) -> CompanyProfile {
    CompanyProfile {
        id: NodeId::new(0),
        kind: NodeKind::SubjectCompany,
        name: name.to_string(),
        sector: sector.map(str::to_string),
        revenue: Some(1.0e10),
        debt_amount: Some(1.0e9),
        variable_rate_debt,
        employee_count: None,
        debt_ratio: None,
        variable_rate_exposure: None,
        export_ratio_pct: Some(40.0),
        fx_sensitivity_score: None,
    }
}

fn product(name: &str) -> SolutionView {
    SolutionView {
        id: NodeId::new(1),
        kind: NodeKind::FinancialProduct,
        name: name.to_string(),
        category: None,
        text: name.to_string(),
    }
}

#[test]
fn test_first_match_wins_never_averages() {
    let rules = RuleSet::default();
    let company = profile("Acme", Some("steel"), Some(5.0e8));
    // matches both the fixed-rate (0.95) and the working-capital (0.85) rules
    let solution = product("Fixed-Rate Working Capital Loan");
    let score = score_eligibility(&rules, &company, &solution).unwrap();
    assert_eq!(score.rule, "fixed_rate");
    assert_eq!(score.outcome.score, 0.95);
}

#[test]
fn test_requirement_falls_through_to_next_rule() {
    let rules = RuleSet::default();
    let company = profile("Acme", Some("steel"), None);
    let score = score_eligibility(&rules, &company, &product("Fixed-Rate Working Capital Loan")).unwrap();
    assert_eq!(score.rule, "working_capital");
}

#[test]
fn test_scores_are_deterministic() {
    let rules = RuleSet::default();
    let company = profile("Acme", Some("steel"), Some(5.0e8));
    let peer = CompanyProfile {
        kind: NodeKind::ReferenceCompany,
        ..profile("POSCO", Some("Steel"), None)
    };
    let names = ["KB Interest Rate Swap", "Export FX Hedge", "Generic Loan", "Unrelated"];
    let first: Vec<_> = names
        .iter()
        .map(|n| score_eligibility(&rules, &company, &product(n)))
        .collect();
    for _ in 0..10 {
        let again: Vec<_> = names
            .iter()
            .map(|n| score_eligibility(&rules, &company, &product(n)))
            .collect();
        assert_eq!(first, again);
        assert_eq!(score_similarity(&[], &company, &peer), score_similarity(&[], &company, &peer));
    }
    assert!(first[3].is_none());
}

#[test]
fn test_cost_delta_monotonic_in_delta() {
    let base = Decimal::new(35, 1);
    let deltas: Vec<Decimal> = (1..=200).map(|bp| Decimal::new(bp, 2)).collect();
    for principal in [
        Decimal::new(1, 2),
        Decimal::new(1, 0),
        Decimal::new(100, 0),
        Decimal::new(999, 0),
        Decimal::new(1_000_000, 0),
        Decimal::new(8_000_000_000, 0),
    ] {
        let costs: Vec<_> = deltas
            .iter()
            .map(|d| interest_cost_delta(principal, base, *d).unwrap())
            .collect();
        assert!(costs.windows(2).all(|w| w[0].monthly < w[1].monthly), "monthly, principal {}", principal);
        assert!(costs.windows(2).all(|w| w[0].annual < w[1].annual), "annual, principal {}", principal);
    }
}

#[test]
fn test_concrete_cost_delta() {
    let cost = interest_cost_delta(Decimal::new(8_000_000_000, 0), Decimal::new(48, 1), Decimal::new(5, 1))
        .unwrap()
        .rounded();
    assert_eq!(cost.monthly.to_string(), "3333333.33");
    assert_eq!(cost.annual, Decimal::new(40_000_000, 0));
}

/// Every reference company competes with every other one: a complete
/// directed graph, dense in cycles
fn clique(size: usize) -> (GraphStore, NodeId) {
    let mut store = GraphStore::new();
    let ids: Vec<NodeId> = (0..size)
        .map(|i| {
            store
                .upsert_node(
                    NodeKind::ReferenceCompany,
                    props([("companyName", PropertyValue::from(format!("C{}", i)))]),
                )
                .unwrap()
                .id()
        })
        .collect();
    for a in &ids {
        for b in &ids {
            if a != b {
                store
                    .upsert_edge(*a, RelType::CompetesWith, *b, props([("similarityScore", 0.8)]))
                    .unwrap();
            }
        }
    }
    (store, ids[0])
}

#[test]
fn test_traversal_bounded_on_cycles() {
    let (store, origin) = clique(6);
    let steps = [TraversalStep::both(RelType::CompetesWith)];
    for max_hops in 1..=4 {
        let paths: Vec<_> = store.traverse_all(origin, &steps, max_hops).unwrap().collect();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.hops() >= 1 && p.hops() <= max_hops));
        // simple paths only
        for path in &paths {
            let mut nodes = path.nodes.clone();
            nodes.sort();
            nodes.dedup();
            assert_eq!(nodes.len(), path.nodes.len());
        }
    }

    let unique: Vec<_> = store
        .traverse_all(origin, &steps, 4)
        .unwrap()
        .unique_nodes()
        .collect();
    assert_eq!(unique.len(), 5);
}

fn cohort_graph(members: usize) -> GraphStore {
    let mut store = GraphStore::new();
    let rate = store
        .upsert_node(
            NodeKind::MacroIndicator,
            props([
                ("indicatorName", PropertyValue::from("기준금리")),
                ("value", PropertyValue::Float(3.0)),
            ]),
        )
        .unwrap()
        .id();
    for i in 0..members {
        let id = store
            .upsert_node(
                NodeKind::ReferenceCompany,
                props([
                    ("companyName", PropertyValue::from(format!("S{}", i))),
                    ("sector", PropertyValue::from("steel")),
                ]),
            )
            .unwrap()
            .id();
        store
            .upsert_edge(
                id,
                RelType::ExposedTo,
                rate,
                props([("exposureLevel", "MEDIUM"), ("riskType", "interest_rate")]),
            )
            .unwrap();
    }
    store
}

#[test]
fn test_cohort_guard_boundary() {
    let config = CohortConfig::default();

    let two = cohort_exposures(&cohort_graph(2), &config);
    assert_eq!(two[0].outcome, CohortOutcome::InsufficientSample { size: 2, required: 3 });

    let three = cohort_exposures(&cohort_graph(3), &config);
    let avg = three[0].outcome.value().unwrap();
    assert!((avg - 0.6).abs() < 1e-9);
}
