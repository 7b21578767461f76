//! Benchmarks for the vigil engines over synthetic CI data.
//!
//! Run with: cargo bench
//! Run specific benchmark: cargo bench -- scorecard

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vigil::analyzers::{anomaly, impact, quality, scorecard};
use vigil::config::{Config, Granularity};
use vigil::core::{AnalysisContext, Analyzer, Snapshot, Status, TestResult, TestRun};
use vigil::registry::{Criticality, Registry, ServiceSpec};

const SUITES: &[&str] = &[
    "user-unit-tests",
    "user-api-tests",
    "order-api-tests",
    "order-integration",
    "product-e2e-ui",
    "notification-unit",
    "gateway-system",
    "nightly-smoke",
];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap()
}

/// Deterministic snapshot with `size` runs and `size` results.
fn create_snapshot(size: usize) -> Snapshot {
    let runs = (0..size)
        .map(|i| {
            let status = if i % 7 == 0 { Status::Failed } else { Status::Passed };
            TestRun::new(i.to_string(), SUITES[i % SUITES.len()], status)
                .started_at(now() - Duration::hours((i % 720) as i64))
        })
        .collect();
    let results = (0..size)
        .map(|i| {
            let status = if i % 11 == 0 { Status::Failed } else { Status::Passed };
            TestResult::new(i.to_string(), format!("case-{}", i % 50), status)
                .duration(50.0 + (i % 13) as f64 * 40.0)
                .created_at(now() - Duration::hours((i % 720) as i64))
                .suite(SUITES[i % SUITES.len()])
        })
        .collect();
    Snapshot::new(runs, results)
}

/// A chain-and-fan registry of `size` services.
fn create_registry(size: usize) -> Registry {
    let services: BTreeMap<String, ServiceSpec> = (0..size)
        .map(|i| {
            let dependents = [i * 2 + 1, i * 2 + 2]
                .into_iter()
                .filter(|d| *d < size)
                .map(|d| format!("svc-{d}"))
                .collect();
            (
                format!("svc-{i}"),
                ServiceSpec {
                    dependents,
                    criticality: if i == 0 {
                        Criticality::Critical
                    } else {
                        Criticality::Medium
                    },
                    failure_rate: Some(0.05),
                    ..Default::default()
                },
            )
        })
        .collect();
    Registry::from_services(services).expect("valid registry")
}

fn bench_scorecard(c: &mut Criterion) {
    let mut group = c.benchmark_group("scorecard");
    let config = Config::default();
    let registry = Registry::default();

    for size in [100, 1_000, 10_000] {
        let snapshot = create_snapshot(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            let ctx = AnalysisContext::new(snapshot, &registry, &config).with_now(now());
            let analyzer = scorecard::Analyzer::new();
            b.iter(|| black_box(analyzer.analyze(&ctx).unwrap()));
        });
    }
    group.finish();
}

fn bench_anomalies(c: &mut Criterion) {
    let mut group = c.benchmark_group("anomalies");
    let config = Config::default();
    let registry = Registry::default();
    let snapshot = create_snapshot(5_000);

    for granularity in [Granularity::TestCase, Granularity::Global] {
        let ctx = AnalysisContext::new(&snapshot, &registry, &config).with_now(now());
        let analyzer = anomaly::Analyzer::new().with_granularity(granularity);
        group.bench_function(format!("{granularity:?}"), |b| {
            b.iter(|| black_box(analyzer.analyze(&ctx).unwrap()));
        });
    }
    group.finish();
}

fn bench_quality(c: &mut Criterion) {
    let snapshot = create_snapshot(10_000);
    let analyzer = quality::Analyzer::new();
    c.bench_function("quality", |b| {
        b.iter(|| black_box(analyzer.insights(&snapshot.results, now())));
    });
}

fn bench_impact(c: &mut Criterion) {
    let mut group = c.benchmark_group("impact");
    let snapshot = Snapshot::default();

    for size in [15, 127, 1_023] {
        let registry = create_registry(size);
        let change = impact::ChangeDescriptor {
            services: vec!["svc-0".to_string()],
            lines_added: 250,
            lines_deleted: 40,
            files_changed: 8,
            ..Default::default()
        };
        let analyzer = impact::Analyzer::new(change);
        group.bench_with_input(BenchmarkId::from_parameter(size), &registry, |b, registry| {
            b.iter(|| black_box(analyzer.report(registry, &snapshot)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_scorecard,
    bench_anomalies,
    bench_quality,
    bench_impact
);
criterion_main!(benches);
