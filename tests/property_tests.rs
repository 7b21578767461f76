use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use vigil::analyzers::aggregate::Aggregator;
use vigil::analyzers::anomaly::Analyzer as AnomalyAnalyzer;
use vigil::analyzers::impact::{self, Analyzer as ImpactAnalyzer, ChangeDescriptor, Features};
use vigil::analyzers::resolver::{Resolver, UNKNOWN_SERVICE};
use vigil::analyzers::scorecard::{self, Analyzer as ScorecardAnalyzer};
use vigil::core::{Snapshot, Status, TestResult, TestRun};
use vigil::registry::{Criticality, Registry, ServiceSpec};

fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Passed),
        Just(Status::Failed),
        Just(Status::Other("SKIPPED".to_string())),
    ]
}

fn suite_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("user-unit-tests"),
        Just("order-api-tests"),
        Just("orders integration"),
        Just("product-e2e-ui"),
        Just("gateway system"),
        Just("nightly"),
    ]
}

// ---------------------------------------------------------------------------
// Service resolver
// ---------------------------------------------------------------------------

proptest! {
    /// Every label resolves to something, and always to the same thing.
    #[test]
    fn resolver_is_total_and_deterministic(label in ".{0,40}") {
        let resolver = Resolver::default();
        let first = resolver.resolve_service(Some(&label)).to_string();
        let second = resolver.resolve_service(Some(&label)).to_string();
        prop_assert!(!first.is_empty());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            resolver.resolve_category(Some(&label)),
            resolver.resolve_category(Some(&label))
        );
    }

    /// Case never changes the resolved service.
    #[test]
    fn resolver_ignores_case(label in "[a-zA-Z -]{0,30}") {
        let resolver = Resolver::default();
        prop_assert_eq!(
            resolver.resolve_service(Some(&label.to_lowercase())),
            resolver.resolve_service(Some(&label.to_uppercase()))
        );
    }
}

// ---------------------------------------------------------------------------
// Score mapping and scorecards
// ---------------------------------------------------------------------------

proptest! {
    /// The 1-10 mapping is bounded and monotone.
    #[test]
    fn percentage_to_score_is_monotone(a in -50.0f64..150.0, b in -50.0f64..150.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let s_lo = scorecard::percentage_to_score(lo);
        let s_hi = scorecard::percentage_to_score(hi);
        prop_assert!((1..=10).contains(&s_lo));
        prop_assert!((1..=10).contains(&s_hi));
        prop_assert!(s_lo <= s_hi);
    }

    /// Every scorecard value stays inside its documented range, and
    /// category counts add up.
    #[test]
    fn scorecards_stay_in_bounds(
        runs in prop::collection::vec((suite_strategy(), status_strategy(), 0i64..30), 0..60),
        penalty in any::<bool>(),
    ) {
        let now = Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap();
        let runs: Vec<TestRun> = runs
            .into_iter()
            .enumerate()
            .map(|(i, (suite, status, age))| {
                TestRun::new(i.to_string(), suite, status).started_at(now - Duration::days(age))
            })
            .collect();

        let aggregates = Aggregator::default().aggregate(&runs, &[], now);
        let total: usize = aggregates.values().map(|a| a.total_runs()).sum();
        prop_assert_eq!(total, runs.len());

        let analyzer = ScorecardAnalyzer::new().with_performance_penalty(penalty);
        for aggregate in aggregates.values() {
            for stats in aggregate.categories.values() {
                prop_assert!(stats.passed + stats.failed <= stats.total);
            }
            let card = analyzer.score(aggregate);
            prop_assert!((1..=10).contains(&card.overall_score));
            prop_assert!((1..=10).contains(&card.stability_score));
            prop_assert!((1..=10).contains(&card.coverage_score));
            prop_assert!(card.overall_pct.is_finite());
            prop_assert!((0.0..=100.0).contains(&card.stability_pct));
            prop_assert!((0.0..=100.0).contains(&card.coverage_pct));
            for category in &card.categories {
                prop_assert!(category.success_rate >= 0.0 && category.success_rate <= 100.0);
            }
            let categories: Vec<_> = card.suggestions.iter().map(|s| s.category).collect();
            let mut sorted = categories.clone();
            sorted.sort();
            prop_assert_eq!(categories, sorted);
        }
    }
}

// ---------------------------------------------------------------------------
// Impact analysis
// ---------------------------------------------------------------------------

fn random_registry(edges: &[(usize, usize)], size: usize) -> Registry {
    let mut services: BTreeMap<String, ServiceSpec> = (0..size)
        .map(|i| {
            (
                format!("svc-{i}"),
                ServiceSpec {
                    criticality: if i == 0 {
                        Criticality::Critical
                    } else {
                        Criticality::Medium
                    },
                    ..Default::default()
                },
            )
        })
        .collect();
    for (from, to) in edges {
        let target = format!("svc-{}", to % size);
        if let Some(spec) = services.get_mut(&format!("svc-{}", from % size)) {
            spec.dependents.push(target);
        }
    }
    Registry::from_services(services).expect("valid registry")
}

proptest! {
    /// The blast radius never lists a service twice and is ordered by
    /// decreasing probability, even on cyclic graphs.
    #[test]
    fn blast_radius_unique_and_sorted(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..24),
        touched in prop::collection::vec(0usize..8, 0..3),
        lines in 0u64..2000,
        files in 0u64..40,
    ) {
        let registry = random_registry(&edges, 8);
        let change = ChangeDescriptor {
            services: touched.iter().map(|i| format!("svc-{i}")).collect(),
            lines_added: lines,
            files_changed: files,
            ..Default::default()
        };
        let report = ImpactAnalyzer::new(change).report(&registry, &Snapshot::default());

        let mut seen = HashSet::new();
        for entry in &report.blast_radius {
            prop_assert!(seen.insert(entry.service.clone()), "duplicate {}", entry.service);
            prop_assert!(entry.probability > 0.0 && entry.probability <= 1.0);
        }
        for pair in report.blast_radius.windows(2) {
            prop_assert!(pair[0].probability >= pair[1].probability);
        }
        prop_assert!((0.0..=10.0).contains(&report.impact_score));
        prop_assert!((0.0..=1.0).contains(&report.risk_assessment.risk_score));
        prop_assert!((0.1..=1.0).contains(&report.confidence));
    }

    /// Scores and confidence stay bounded for any feature vector.
    #[test]
    fn impact_score_and_confidence_bounded(
        total_lines in 0u64..1_000_000,
        files_changed in 0u64..1000,
        services_touched in 0usize..20,
        coverage in prop::option::of(0.0f64..100.0),
        dependency_depth in 0usize..20,
        critical_services in 0usize..5,
        failure_rate in prop::option::of(0.0f64..1.0),
    ) {
        let features = Features {
            total_lines,
            files_changed,
            services_touched,
            complexity: 0.0,
            average_coverage: coverage,
            dependency_depth,
            critical_services,
            historical_failure_rate: failure_rate,
            api_changed: false,
            test_files_changed: 0,
        };
        let score = impact::impact_score(&features);
        let confidence = impact::confidence(&features);
        prop_assert!((0.0..=10.0).contains(&score));
        prop_assert!((0.1..=1.0).contains(&confidence));
    }
}

// ---------------------------------------------------------------------------
// Anomaly detection
// ---------------------------------------------------------------------------

proptest! {
    /// Test cases with fewer than five results are never flagged.
    #[test]
    fn sparse_test_cases_never_flagged(
        samples in prop::collection::vec((status_strategy(), 1.0f64..100_000.0), 0..5),
    ) {
        let now = Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap();
        let results: Vec<TestResult> = samples
            .into_iter()
            .enumerate()
            .map(|(i, (status, ms))| {
                TestResult::new(i.to_string(), "flaky", status)
                    .duration(ms)
                    .created_at(now - Duration::hours(i as i64))
            })
            .collect();
        prop_assert!(AnomalyAnalyzer::new().detect(&results, now).is_empty());
    }

    /// Unknown labels land in the unknown bucket, never in a named service.
    #[test]
    fn unmatched_labels_are_unknown(label in "[0-9 _]{0,12}") {
        let resolver = Resolver::default();
        prop_assert_eq!(resolver.resolve_service(Some(&label)), UNKNOWN_SERVICE);
    }
}
