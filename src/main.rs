//! RiskGraph demo
//!
//! Seeds a small illustrative graph, materialises every relationship type,
//! then prints propagation, simulation and aggregation results as JSON.
//!
//! Usage: `riskgraph [config.yaml]`. Log level follows `RUST_LOG`.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use riskgraph::analysis::cohort_sensitivities;
use riskgraph::scoring::PeerOverride;
use riskgraph::{
    props, EngineConfig, EntitySelector, NodeKind, PathAnalyzer, PropertyMap, PropertyValue, RecomputeRequest,
    RelationshipJob, RelationshipService, Reporter, SharedGraph, SimulationEngine,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SUBJECT: &str = "Hanbit Steel";
const BASE_RATE: &str = "기준금리";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("RiskGraph v{}", riskgraph::version());
    println!("==========================================");

    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(&path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::default(),
    };
    if config.peers.is_empty() {
        config.peers.push(PeerOverride {
            source: SUBJECT.to_string(),
            target: "POSCO".to_string(),
            score: 0.85,
            factors: vec!["steel".to_string(), "variable-rate debt".to_string()],
        });
    }

    let graph = SharedGraph::new();
    seed(&graph)?;
    let subject = graph.get_node(NodeKind::SubjectCompany, SUBJECT)?;
    info!(version = graph.version()?, subject = %subject.id, "Seeded demo graph");

    // === Step 1: materialise relationships ===
    section("Step 1: Recompute relationships");
    let now = Utc::now();
    let all = EntitySelector::all;
    let requests = vec![
        RecomputeRequest::new(RelationshipJob::Similarity, all(NodeKind::SubjectCompany), now),
        RecomputeRequest::new(RelationshipJob::Competition, all(NodeKind::ReferenceCompany), now),
        RecomputeRequest::new(RelationshipJob::Exposure, all(NodeKind::SubjectCompany), now),
        RecomputeRequest::new(RelationshipJob::Exposure, all(NodeKind::ReferenceCompany), now),
        RecomputeRequest::new(RelationshipJob::InheritedExposure, all(NodeKind::SubjectCompany), now),
        RecomputeRequest::new(RelationshipJob::Eligibility, all(NodeKind::SubjectCompany), now),
        RecomputeRequest::new(RelationshipJob::Impact, all(NodeKind::NewsArticle), now),
    ];
    let service = RelationshipService::new(&graph, &config);
    for (request, report) in requests.iter().zip(service.recompute_all(&requests)?) {
        println!(
            "  {:?}: created {}, updated {}, unchanged {}, below threshold {}, failures {}",
            request.relationship,
            report.created,
            report.updated,
            report.unchanged,
            report.below_threshold,
            report.failures.len()
        );
    }

    let snapshot = graph.snapshot()?;
    println!("  graph: {} nodes, {} edges", snapshot.node_count(), snapshot.edge_count());

    // === Step 2: propagation ===
    section("Step 2: Macro-indicator propagation");
    let analyzer = PathAnalyzer::new(&snapshot, &config.traversal);
    let paths = analyzer.macro_propagation(BASE_RATE, None)?;
    for path in paths.paths.iter().take(5) {
        let route: Vec<&str> = path.nodes.iter().map(|n| n.key.as_str()).collect();
        println!("  [{:?}] {:.3}  {}", path.hop_class, path.score, route.join(" -> "));
    }
    print_json("composite risk", &analyzer.company_risk(SUBJECT, None)?.composite_risk())?;

    // === Step 3: simulation ===
    section("Step 3: Rate and exchange-rate scenarios");
    let simulation = SimulationEngine::new(&snapshot, &config.simulation);
    print_json("ladder", &simulation.run_ladder(SUBJECT)?)?;
    print_json("won +10", &simulation.simulate_fx(SUBJECT, Decimal::new(10, 0))?)?;

    // === Step 4: aggregation ===
    section("Step 4: Aggregation");
    let batch = Reporter::new(&snapshot, &config).aggregate();
    print_json("summaries", &batch)?;
    print_json("sector sensitivities", &cohort_sensitivities(&snapshot, &config.cohort))?;

    Ok(())
}

fn section(title: &str) {
    println!();
    println!("=== {} ===", title);
}

fn print_json<T: Serialize>(label: &str, value: &T) -> Result<()> {
    println!("{}:\n{}", label, serde_json::to_string_pretty(value)?);
    Ok(())
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

fn seed(graph: &SharedGraph) -> Result<()> {
    graph.upsert_node(
        NodeKind::SubjectCompany,
        company(
            SUBJECT,
            "steel",
            &[
                ("revenue", 2.0e11),
                ("debtAmount", 1.0e10),
                ("variableRateDebt", 8.0e9),
                ("employeeCount", 420.0),
                ("debtRatio", 1.2),
                ("variableRateExposure", 0.8),
                ("exportRatioPct", 35.0),
            ],
        ),
    )?;

    let references: [(&str, &str, f64, f64); 5] = [
        ("POSCO", "steel", 0.65, 45.0),
        ("Hyundai Steel", "steel", 0.55, 30.0),
        ("Dongkuk Steel", "steel", 0.75, 20.0),
        ("LG Chem", "chemicals", 0.35, 60.0),
        ("Lotte Chemical", "chemicals", 0.45, 55.0),
    ];
    for (name, sector, variable_exposure, export_ratio) in references {
        graph.upsert_node(
            NodeKind::ReferenceCompany,
            company(
                name,
                sector,
                &[
                    ("variableRateExposure", variable_exposure),
                    ("exportRatioPct", export_ratio),
                    ("debtRatio", 0.9),
                ],
            ),
        )?;
    }

    for (name, value, unit) in [(BASE_RATE, 3.5, "%"), ("원/달러 환율", 1380.0, "KRW")] {
        graph.upsert_node(
            NodeKind::MacroIndicator,
            props([
                ("indicatorName", PropertyValue::from(name)),
                ("value", PropertyValue::Float(value)),
                ("unit", PropertyValue::from(unit)),
                ("lastUpdated", PropertyValue::from(Utc::now())),
            ]),
        )?;
    }

    for (name, product_type, interest_type) in [
        ("KB Fixed-Rate Conversion Loan", "loan", "fixed"),
        ("KB Interest Rate Swap", "derivative", "swap"),
        ("KB Working Capital Loan", "loan", "variable"),
    ] {
        graph.upsert_node(
            NodeKind::FinancialProduct,
            props([
                ("productName", name),
                ("productType", product_type),
                ("interestType", interest_type),
            ]),
        )?;
    }

    graph.upsert_node(
        NodeKind::Policy,
        props([
            ("policyName", "Manufacturing SME Interest Subsidy"),
            ("issuingOrg", "Ministry of SMEs and Startups"),
            ("targetBusiness", "manufacturing"),
        ]),
    )?;

    let published = Utc::now() - Duration::hours(2);
    graph.upsert_node(
        NodeKind::NewsArticle,
        props([
            ("title", PropertyValue::from("Bank of Korea signals rate hike on steel demand")),
            ("publisher", PropertyValue::from("Maeil Business")),
            ("category", PropertyValue::from("financial")),
            ("publishDate", PropertyValue::from(published)),
        ]),
    )?;
    Ok(())
}
