//! Folds runs and results into per-service, per-category counters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::resolver::Resolver;
use crate::core::{Category, Status, TestResult, TestRun};

/// Project label used when a run carries none.
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Minimal record of a contributing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    pub id: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub recent: bool,
}

/// Counters for one test category of one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Known durations (ms) in arrival order.
    pub durations: Vec<f64>,
    /// Contributing runs in arrival order.
    pub runs: Vec<RunSample>,
    pub recent_total: usize,
    pub recent_failed: usize,
}

impl CategoryStats {
    /// Pass percentage, 0 for an empty bucket.
    pub fn success_rate(&self) -> f64 {
        ratio_pct(self.passed, self.total)
    }

    /// Mean known duration, 0 when none were recorded.
    pub fn average_duration(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        self.durations.iter().sum::<f64>() / self.durations.len() as f64
    }

    fn record(&mut self, run: &TestRun, recent: bool) {
        self.total += 1;
        match run.status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Other(_) => {}
        }
        if recent {
            self.recent_total += 1;
            if run.status.is_failure() {
                self.recent_failed += 1;
            }
        }
        self.runs.push(RunSample {
            id: run.id.clone(),
            status: String::from(run.status.clone()),
            started_at: run.started_at,
            recent,
        });
    }
}

/// Everything known about one service after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAggregate {
    pub service: String,
    pub project: String,
    pub categories: BTreeMap<Category, CategoryStats>,
    pub last_run: Option<DateTime<Utc>>,
}

impl ServiceAggregate {
    fn new(service: &str, project: Option<&str>) -> Self {
        Self {
            service: service.to_string(),
            project: project.unwrap_or(UNKNOWN_PROJECT).to_string(),
            categories: BTreeMap::new(),
            last_run: None,
        }
    }

    pub fn total_runs(&self) -> usize {
        self.categories.values().map(|c| c.total).sum()
    }

    pub fn failed_runs(&self) -> usize {
        self.categories.values().map(|c| c.failed).sum()
    }

    pub fn recent_runs(&self) -> usize {
        self.categories.values().map(|c| c.recent_total).sum()
    }

    pub fn recent_failures(&self) -> usize {
        self.categories.values().map(|c| c.recent_failed).sum()
    }

    /// Failure percentage over the recent window.
    pub fn recent_failure_rate(&self) -> f64 {
        ratio_pct(self.recent_failures(), self.recent_runs())
    }

    /// Failure percentage over all time.
    pub fn overall_failure_rate(&self) -> f64 {
        ratio_pct(self.failed_runs(), self.total_runs())
    }

    /// Categories with at least one run.
    pub fn present_categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories
            .iter()
            .filter(|(_, s)| s.total > 0)
            .map(|(c, _)| *c)
    }
}

/// Percentage guarded against empty denominators.
pub(crate) fn ratio_pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Builds [`ServiceAggregate`]s from a snapshot.
#[derive(Debug, Clone)]
pub struct Aggregator {
    resolver: Resolver,
    recent_window: Duration,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Resolver::default(), 7)
    }
}

impl Aggregator {
    pub fn new(resolver: Resolver, recent_window_days: u32) -> Self {
        Self {
            resolver,
            recent_window: Duration::days(i64::from(recent_window_days)),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Group runs by resolved service and category, then attach known
    /// result durations to buckets that runs created.
    ///
    /// Results whose bucket was never seen through a run are dropped.
    pub fn aggregate(
        &self,
        runs: &[TestRun],
        results: &[TestResult],
        now: DateTime<Utc>,
    ) -> BTreeMap<String, ServiceAggregate> {
        let window_start = now
            .checked_sub_signed(self.recent_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut services: BTreeMap<String, ServiceAggregate> = BTreeMap::new();

        for run in runs {
            let label = run.suite.as_deref();
            let service = self.resolver.resolve_service(label);
            let category = self.resolver.resolve_category(label);

            let aggregate = services
                .entry(service.to_string())
                .or_insert_with(|| ServiceAggregate::new(service, run.project.as_deref()));

            let recent = run.started_at.is_some_and(|t| t >= window_start);
            aggregate
                .categories
                .entry(category)
                .or_default()
                .record(run, recent);

            if let Some(started) = run.started_at {
                aggregate.last_run = Some(match aggregate.last_run {
                    Some(last) if last >= started => last,
                    _ => started,
                });
            }
        }

        for result in results {
            let Some(duration) = result.duration_ms else {
                continue;
            };
            let label = result.suite.as_deref();
            let service = self.resolver.resolve_service(label);
            let category = self.resolver.resolve_category(label);
            if let Some(bucket) = services
                .get_mut(service)
                .and_then(|s| s.categories.get_mut(&category))
            {
                bucket.durations.push(duration);
            }
        }

        services
    }
}
