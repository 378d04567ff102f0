//! End-to-end runs over a small steel-sector graph

use chrono::{DateTime, Duration, TimeZone, Utc};
use riskgraph::analysis::paths::PathAnalyzer;
use riskgraph::{
    props, EngineConfig, EntitySelector, ExposureLevel, GapVerdict, HopClass, NodeKind, PropertyMap, PropertyValue,
    RecomputeRequest, RelType, RelationshipJob, RelationshipService, Reporter, SharedGraph, SimulationEngine,
    StaleEdgePolicy, TraversalStep,
};
use rust_decimal::Decimal;

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 20, 9, 0, 0).unwrap()
}

fn company(name: &str, sector: &str, figures: &[(&str, f64)]) -> PropertyMap {
    let mut properties = props([
        ("companyName", PropertyValue::from(name)),
        ("sector", PropertyValue::from(sector)),
    ]);
    for (key, value) in figures {
        properties.insert(key.to_string(), PropertyValue::Float(*value));
    }
    properties
}

fn seed() -> SharedGraph {
    let graph = SharedGraph::new();
    graph
        .upsert_node(
            NodeKind::SubjectCompany,
            company(
                "Acme",
                "steel",
                &[
                    ("revenue", 2.0e11),
                    ("debtAmount", 1.0e10),
                    ("variableRateDebt", 8.0e9),
                    ("exportRatioPct", 35.0),
                ],
            ),
        )
        .unwrap();
    for (name, sector, variable, export) in [
        ("POSCO", "steel", 0.65, 45.0),
        ("Hyundai Steel", "steel", 0.55, 30.0),
        ("Dongkuk Steel", "steel", 0.75, 20.0),
        ("LG Chem", "chemicals", 0.35, 60.0),
    ] {
        graph
            .upsert_node(
                NodeKind::ReferenceCompany,
                company(
                    name,
                    sector,
                    &[("variableRateExposure", variable), ("exportRatioPct", export)],
                ),
            )
            .unwrap();
    }
    for (name, value) in [("기준금리", 4.8), ("원/달러 환율", 1380.0)] {
        graph
            .upsert_node(
                NodeKind::MacroIndicator,
                props([
                    ("indicatorName", PropertyValue::from(name)),
                    ("value", PropertyValue::Float(value)),
                ]),
            )
            .unwrap();
    }
    for (name, interest_type) in [
        ("KB Fixed-Rate Conversion Loan", "fixed"),
        ("KB Interest Rate Swap", "swap"),
        ("KB Working Capital Loan", "variable"),
    ] {
        graph
            .upsert_node(
                NodeKind::FinancialProduct,
                props([("productName", name), ("interestType", interest_type)]),
            )
            .unwrap();
    }
    graph
        .upsert_node(
            NodeKind::Policy,
            props([("policyName", "Manufacturing SME Interest Subsidy")]),
        )
        .unwrap();
    graph
        .upsert_node(
            NodeKind::NewsArticle,
            props([
                ("title", PropertyValue::from("Bank of Korea signals rate hike")),
                ("category", PropertyValue::from("financial")),
                ("publishDate", PropertyValue::from(as_of() - Duration::hours(3))),
            ]),
        )
        .unwrap();
    graph
}

fn requests() -> Vec<RecomputeRequest> {
    let all = EntitySelector::all;
    vec![
        RecomputeRequest::new(RelationshipJob::Similarity, all(NodeKind::SubjectCompany), as_of()),
        RecomputeRequest::new(RelationshipJob::Competition, all(NodeKind::ReferenceCompany), as_of()),
        RecomputeRequest::new(RelationshipJob::Exposure, all(NodeKind::SubjectCompany), as_of()),
        RecomputeRequest::new(RelationshipJob::Exposure, all(NodeKind::ReferenceCompany), as_of()),
        RecomputeRequest::new(RelationshipJob::InheritedExposure, all(NodeKind::SubjectCompany), as_of()),
        RecomputeRequest::new(RelationshipJob::Eligibility, all(NodeKind::SubjectCompany), as_of()),
        RecomputeRequest::new(RelationshipJob::Impact, all(NodeKind::NewsArticle), as_of()),
    ]
}

fn materialised() -> (SharedGraph, EngineConfig) {
    let graph = seed();
    let config = EngineConfig::default();
    RelationshipService::new(&graph, &config)
        .recompute_all(&requests())
        .unwrap();
    (graph, config)
}

#[test]
fn test_full_pipeline_counts() {
    let graph = seed();
    let config = EngineConfig::default();
    let reports = RelationshipService::new(&graph, &config)
        .recompute_all(&requests())
        .unwrap();

    let created: Vec<usize> = reports.iter().map(|r| r.created).collect();
    // similarity: 3 steel peers; competition: 3 steel pairs, both ways;
    // exposure: 2 subject + 8 reference; inherited: dominated by direct;
    // eligibility: 3 products + 1 policy; impact: 5 companies + 2 indicators
    assert_eq!(created, vec![3, 6, 2, 8, 0, 4, 7]);
    assert!(reports.iter().all(|r| r.is_clean()));
    assert_eq!(reports[0].below_threshold, 1);

    let snapshot = graph.snapshot().unwrap();
    assert_eq!(snapshot.edge_count(), 30);
}

#[test]
fn test_recompute_is_idempotent() {
    let (graph, config) = materialised();
    let before = graph.snapshot().unwrap();

    let again = RelationshipService::new(&graph, &config)
        .recompute_all(&requests())
        .unwrap();
    assert!(again.iter().all(|r| r.created == 0 && r.updated == 0));

    let after = graph.snapshot().unwrap();
    assert_eq!(before.edge_count(), after.edge_count());
    for rel in RelType::ALL {
        let a = before.get_edges_by_type(&rel.edge_type());
        let b = after.get_edges_by_type(&rel.edge_type());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.properties, y.properties);
            assert_eq!(x.revision, y.revision);
        }
    }
}

#[test]
fn test_attribute_change_updates_in_place() {
    let (graph, config) = materialised();
    let acme = graph.get_node(NodeKind::SubjectCompany, "Acme").unwrap();
    let fx = graph.get_node(NodeKind::MacroIndicator, "원/달러 환율").unwrap();
    let edges_before = graph.snapshot().unwrap().edge_count();

    graph
        .upsert_node(
            NodeKind::SubjectCompany,
            company("Acme", "steel", &[("exportRatioPct", 70.0)]),
        )
        .unwrap();
    let report = RelationshipService::new(&graph, &config)
        .recompute(&RecomputeRequest::new(
            RelationshipJob::Exposure,
            EntitySelector::keys(NodeKind::SubjectCompany, ["Acme"]),
            as_of(),
        ))
        .unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);

    let snapshot = graph.snapshot().unwrap();
    assert_eq!(snapshot.edge_count(), edges_before);
    let edge = snapshot.find_edge(acme.id, RelType::ExposedTo, fx.id).unwrap();
    assert_eq!(edge.text("exposureLevel"), Some("HIGH"));
    assert_eq!(edge.revision, 2);
}

#[test]
fn test_reconciliation_removes_edges_that_no_longer_qualify() {
    let (graph, config) = materialised();
    graph
        .upsert_node(
            NodeKind::SubjectCompany,
            company("Acme", "steel", &[("variableRateDebt", 0.0), ("exportRatioPct", 0.0)]),
        )
        .unwrap();

    let service = RelationshipService::new(&graph, &config);
    let retained = service
        .recompute(&RecomputeRequest::new(
            RelationshipJob::Exposure,
            EntitySelector::keys(NodeKind::SubjectCompany, ["Acme"]),
            as_of(),
        ))
        .unwrap();
    assert_eq!(retained.reconciled, 0);
    assert_eq!(retained.below_threshold, 2);

    let removed = service
        .recompute(
            &RecomputeRequest::new(
                RelationshipJob::Exposure,
                EntitySelector::keys(NodeKind::SubjectCompany, ["Acme"]),
                as_of(),
            )
            .with_stale_policy(StaleEdgePolicy::Remove),
        )
        .unwrap();
    assert_eq!(removed.reconciled, 2);

    let snapshot = graph.snapshot().unwrap();
    let acme = snapshot.find_node(NodeKind::SubjectCompany, "Acme").unwrap();
    assert!(snapshot
        .get_edges(acme.id, Some(&RelType::ExposedTo.edge_type()), riskgraph::Direction::Outgoing)
        .is_empty());
}

fn competition_links(graph: &SharedGraph, a: &str, b: &str) -> (bool, bool) {
    let snapshot = graph.snapshot().unwrap();
    let a = snapshot.find_node(NodeKind::ReferenceCompany, a).unwrap().id;
    let b = snapshot.find_node(NodeKind::ReferenceCompany, b).unwrap().id;
    let live = |s, t| {
        snapshot
            .find_edge(s, RelType::CompetesWith, t)
            .map_or(false, |e| !e.is_stale())
    };
    (live(a, b), live(b, a))
}

#[test]
fn test_competition_reconciliation_keeps_pairs_symmetric() {
    let (graph, config) = materialised();
    graph
        .upsert_node(NodeKind::ReferenceCompany, company("POSCO", "chemicals", &[]))
        .unwrap();

    let report = RelationshipService::new(&graph, &config)
        .recompute(
            &RecomputeRequest::new(
                RelationshipJob::Competition,
                EntitySelector::keys(NodeKind::ReferenceCompany, ["POSCO"]),
                as_of(),
            )
            .with_stale_policy(StaleEdgePolicy::Remove),
        )
        .unwrap();
    assert!(report.is_clean());
    // POSCO <-> LG Chem is new; both steel pairs go in both directions
    assert_eq!(report.created, 2);
    assert_eq!(report.reconciled, 4);

    assert_eq!(competition_links(&graph, "POSCO", "Hyundai Steel"), (false, false));
    assert_eq!(competition_links(&graph, "POSCO", "Dongkuk Steel"), (false, false));
    assert_eq!(competition_links(&graph, "POSCO", "LG Chem"), (true, true));
    assert_eq!(competition_links(&graph, "Hyundai Steel", "Dongkuk Steel"), (true, true));

    let snapshot = graph.snapshot().unwrap();
    assert_eq!(snapshot.get_edges_by_type(&RelType::CompetesWith.edge_type()).len(), 4);
}

#[test]
fn test_flagging_shared_pairs_across_sources_flags_each_edge_once() {
    let (graph, config) = materialised();
    graph
        .upsert_node(NodeKind::ReferenceCompany, company("POSCO", "chemicals", &[]))
        .unwrap();

    let report = RelationshipService::new(&graph, &config)
        .recompute(
            &RecomputeRequest::new(
                RelationshipJob::Competition,
                EntitySelector::all(NodeKind::ReferenceCompany),
                as_of(),
            )
            .with_stale_policy(StaleEdgePolicy::Flag),
        )
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.reconciled, 4);
    assert_eq!(competition_links(&graph, "Hyundai Steel", "POSCO"), (false, false));
    assert_eq!(competition_links(&graph, "LG Chem", "POSCO"), (true, true));

    let snapshot = graph.snapshot().unwrap();
    let posco = snapshot.find_node(NodeKind::ReferenceCompany, "POSCO").unwrap();
    let steps = [TraversalStep::outgoing(RelType::CompetesWith)];
    let paths: Vec<_> = snapshot.traverse_all(posco.id, &steps, 3).unwrap().collect();
    assert_eq!(paths.len(), 1);
}

#[test]
fn test_stale_news_is_skipped() {
    let (graph, config) = materialised();
    let later = as_of() + Duration::days(2);
    let report = RelationshipService::new(&graph, &config)
        .recompute(&RecomputeRequest::new(
            RelationshipJob::Impact,
            EntitySelector::all(NodeKind::NewsArticle),
            later,
        ))
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.sources_processed, 0);
}

#[test]
fn test_macro_propagation_over_materialised_graph() {
    let (graph, config) = materialised();
    let snapshot = graph.snapshot().unwrap();
    let analyzer = PathAnalyzer::new(&snapshot, &config.traversal);

    let set = analyzer.macro_propagation("기준금리", None).unwrap();
    assert!(!set.is_empty());
    assert!(set.paths.iter().all(|p| p.hops <= 3));
    // every company is directly exposed to the base rate
    assert_eq!(set.count(HopClass::Direct), 5);
    assert!(set.paths.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(set.ending_at(NodeKind::FinancialProduct).count() > 0);

    let news = analyzer
        .news_propagation("Bank of Korea signals rate hike", Some(2))
        .unwrap();
    assert!(news.paths.iter().all(|p| p.hops <= 2));
    assert_eq!(news.count(HopClass::Direct), 7);
}

#[test]
fn test_traversal_terminates_on_competition_cycles() {
    let (graph, _) = materialised();
    let snapshot = graph.snapshot().unwrap();
    let posco = snapshot.find_node(NodeKind::ReferenceCompany, "POSCO").unwrap();
    let steps = [TraversalStep::outgoing(RelType::CompetesWith)];

    let paths: Vec<_> = snapshot.traverse_all(posco.id, &steps, 3).unwrap().collect();
    // POSCO -> {H, D}, then the other one: 2 + 2, no third hop without revisiting
    assert_eq!(paths.len(), 4);
    assert!(paths.iter().all(|p| p.hops() <= 3));
}

#[test]
fn test_simulation_against_graph_base_rate() {
    let (graph, config) = materialised();
    let snapshot = graph.snapshot().unwrap();
    let engine = SimulationEngine::new(&snapshot, &config.simulation);

    let result = engine.simulate_company("Acme", Decimal::new(5, 1)).unwrap();
    assert_eq!(result.monthly_delta, Decimal::new(333333333, 2));
    assert_eq!(result.annual_delta, Decimal::new(40_000_000, 0));
    assert_eq!(result.new_rate_pct, Some(Decimal::new(53, 1)));

    let err = engine.simulate_company("POSCO", Decimal::new(5, 1)).unwrap_err();
    assert!(!err.is_not_found());
}

#[test]
fn test_aggregation_summary() {
    let (graph, config) = materialised();
    let snapshot = graph.snapshot().unwrap();
    let batch = Reporter::new(&snapshot, &config).aggregate();
    assert!(batch.failures.is_empty());
    assert_eq!(batch.summaries.len(), 1);

    let acme = &batch.summaries[0];
    assert_eq!(acme.gap.risk_count, 2);
    assert_eq!(acme.gap.solution_count, 4);
    assert_eq!(acme.gap.verdict, GapVerdict::Sufficient);
    assert_eq!(acme.top_solutions.len(), 3);
    assert_eq!(acme.top_solutions[0].name, "KB Fixed-Rate Conversion Loan");
    assert!(acme.exposures.iter().any(|e| e.level == ExposureLevel::High));

    let risk = acme.composite_risk.unwrap();
    assert!((0.0..=100.0).contains(&risk));

    let json = serde_json::to_value(acme).unwrap();
    assert_eq!(json["gap"]["verdict"], "sufficient");
}
