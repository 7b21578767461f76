//! Statistical anomaly detection over test results.
//!
//! Two detectors exist and they never share thresholds:
//! - Per test case: duration outliers among the newest results and clusters
//!   of recent failures.
//! - Global: stream-wide duration outliers, failure rates per stream and per
//!   service, and day-over-day volume swings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::resolver::Resolver;
use crate::config::{AnomalyConfig, Config, Granularity};
use crate::core::{AnalysisContext, Analyzer as AnalyzerTrait, Result, TestResult};

/// Test case name used when a result carries none.
const UNKNOWN_TEST: &str = "Unknown";
/// Slack for the sigma comparison so exact boundary cases still flag.
const SIGMA_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Performance,
    Reliability,
    FailureRate,
    ServiceFailure,
    Volume,
}

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// Test case or service the anomaly is about; `all` for stream-wide ones.
    pub subject: String,
    pub title: String,
    pub description: String,
    pub details: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_duration_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub performance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub granularity: Granularity,
    /// Results examined.
    pub examined: usize,
    pub anomalies: Vec<Anomaly>,
    pub summary: Summary,
}

/// Population mean and standard deviation.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Anomaly detector.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnomalyConfig,
    resolver: Resolver,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            config: AnomalyConfig::default(),
            resolver: Resolver::default(),
        }
    }

    pub fn with_config(mut self, config: AnomalyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.config.granularity = granularity;
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run the configured detector, sort by severity and truncate.
    pub fn detect(&self, results: &[TestResult], now: DateTime<Utc>) -> Vec<Anomaly> {
        let mut anomalies = match self.config.granularity {
            Granularity::TestCase => self.detect_per_test_case(results),
            Granularity::Global => self.detect_global(results, now),
        };
        anomalies.sort_by(|a, b| b.severity.cmp(&a.severity));
        anomalies.truncate(self.config.limit);
        anomalies
    }

    fn detect_per_test_case(&self, results: &[TestResult]) -> Vec<Anomaly> {
        let mut groups: BTreeMap<&str, Vec<&TestResult>> = BTreeMap::new();
        for result in results {
            let name = result.test_case.as_deref().unwrap_or(UNKNOWN_TEST);
            groups.entry(name).or_default().push(result);
        }

        let mut anomalies = Vec::new();
        for (name, mut group) in groups {
            if group.len() < self.config.min_samples {
                continue;
            }
            // Newest first; undated results sort last.
            group.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let durations: Vec<f64> = group.iter().filter_map(|r| r.duration_ms).collect();
            if durations.len() < self.config.min_durations {
                continue;
            }
            let Some((mean, std)) = mean_std(&durations) else {
                continue;
            };

            let recent = &group[..self.config.recent_results.min(group.len())];
            let limit = self.config.sigma * std;
            let outlier = std > 0.0
                && recent.iter().any(|r| {
                    r.duration_ms
                        .is_some_and(|d| (d - mean).abs() >= limit - SIGMA_EPSILON)
                });
            if outlier {
                let recent_duration = recent.first().and_then(|r| r.duration_ms);
                anomalies.push(Anomaly {
                    kind: AnomalyKind::Performance,
                    severity: Severity::Warning,
                    subject: name.to_string(),
                    title: format!("Performance Anomaly: {name}"),
                    description: format!("Performance anomaly detected in {name}"),
                    details: format!(
                        "Average duration: {mean:.0}ms, standard deviation: {std:.0}ms"
                    ),
                    count: durations.len(),
                    average_duration_ms: Some(mean.round()),
                    recent_duration_ms: recent_duration.map(f64::round),
                });
            }

            let failures = recent.iter().filter(|r| r.status.is_failure()).count();
            if failures >= self.config.recent_failures {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::Reliability,
                    severity: Severity::Critical,
                    subject: name.to_string(),
                    title: format!("Reliability Anomaly: {name}"),
                    description: format!("Multiple recent failures in {name}"),
                    details: format!(
                        "{failures} of the {} most recent results failed",
                        recent.len()
                    ),
                    count: failures,
                    average_duration_ms: None,
                    recent_duration_ms: None,
                });
            }
        }
        anomalies
    }

    fn detect_global(&self, results: &[TestResult], now: DateTime<Utc>) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if results.is_empty() {
            return anomalies;
        }

        let durations: Vec<f64> = results.iter().filter_map(|r| r.duration_ms).collect();
        if let Some((mean, std)) = mean_std(&durations) {
            let threshold = mean + self.config.sigma * std;
            let slow = durations.iter().filter(|d| **d > threshold).count();
            if slow > 0 {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::Performance,
                    severity: Severity::Warning,
                    subject: "all".to_string(),
                    title: "Performance Degradation Detected".to_string(),
                    description: format!(
                        "{slow} tests are running significantly slower than average"
                    ),
                    details: format!(
                        "Average duration: {mean:.0}ms, Threshold: {threshold:.0}ms"
                    ),
                    count: slow,
                    average_duration_ms: Some(mean.round()),
                    recent_duration_ms: None,
                });
            }
        }

        let failures = results.iter().filter(|r| r.status.is_failure()).count();
        let rate = failures as f64 / results.len() as f64 * 100.0;
        if rate > self.config.failure_rate_pct {
            anomalies.push(Anomaly {
                kind: AnomalyKind::FailureRate,
                severity: Severity::Critical,
                subject: "all".to_string(),
                title: "High Failure Rate Detected".to_string(),
                description: format!("Failure rate is {rate:.1}%, significantly above normal"),
                details: format!("{failures} failures out of {} tests", results.len()),
                count: failures,
                average_duration_ms: None,
                recent_duration_ms: None,
            });
        }

        let mut services: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for result in results {
            let service = self.resolver.resolve_service(result.suite.as_deref());
            let entry = services.entry(service).or_default();
            entry.0 += 1;
            if result.status.is_failure() {
                entry.1 += 1;
            }
        }
        for (service, (total, failed)) in services {
            let rate = failed as f64 / total as f64 * 100.0;
            if rate > self.config.service_failure_rate_pct {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::ServiceFailure,
                    severity: Severity::Critical,
                    subject: service.to_string(),
                    title: format!("Service Failure Anomaly: {service}"),
                    description: format!("{service} has a failure rate of {rate:.1}%"),
                    details: format!("{failed} failures out of {total} tests"),
                    count: failed,
                    average_duration_ms: None,
                    recent_duration_ms: None,
                });
            }
        }

        let today = now.date_naive();
        let yesterday = (now - Duration::days(1)).date_naive();
        let on = |day| {
            results
                .iter()
                .filter(|r| r.created_at.is_some_and(|t| t.date_naive() == day))
                .count()
        };
        let (today_count, yesterday_count) = (on(today), on(yesterday));
        if today_count > 0 && yesterday_count > 0 {
            let change =
                (today_count as f64 - yesterday_count as f64) / yesterday_count as f64 * 100.0;
            if change.abs() > self.config.volume_change_pct {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::Volume,
                    severity: Severity::Info,
                    subject: "all".to_string(),
                    title: "Test Volume Anomaly".to_string(),
                    description: format!("Test volume changed by {:.1}%", change.abs()),
                    details: format!(
                        "Today: {today_count} tests, Yesterday: {yesterday_count} tests"
                    ),
                    count: today_count.abs_diff(yesterday_count),
                    average_duration_ms: None,
                    recent_duration_ms: None,
                });
            }
        }

        anomalies
    }
}

impl AnalyzerTrait for Analyzer {
    type Output = Analysis;

    fn name(&self) -> &'static str {
        "anomalies"
    }

    fn description(&self) -> &'static str {
        "Flag duration outliers and failure clusters in test results"
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.config = config.anomaly.clone();
        self.resolver = Resolver::new(&config.resolver);
        Ok(())
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Self::Output> {
        let results = &ctx.snapshot.results;
        let anomalies = self.detect(results, ctx.now);

        let mut summary = Summary {
            total: anomalies.len(),
            ..Default::default()
        };
        for anomaly in &anomalies {
            match anomaly.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Warning => summary.warning += 1,
                Severity::Info => summary.info += 1,
            }
            if anomaly.kind == AnomalyKind::Performance {
                summary.performance += 1;
            }
        }

        ctx.metric(self.name(), "examined", results.len() as f64);
        ctx.metric(self.name(), "anomalies", summary.total as f64);

        Ok(Analysis {
            granularity: self.config.granularity,
            examined: results.len(),
            anomalies,
            summary,
        })
    }
}
