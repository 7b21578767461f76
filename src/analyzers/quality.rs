//! Stream-wide quality insights over test results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{AnalysisContext, Analyzer as AnalyzerTrait, Result, TestResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    #[default]
    Stable,
}

/// Raw counts behind the insight scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub recent: usize,
    /// Mean of known durations.
    pub average_duration_ms: f64,
    pub slow: usize,
    pub security: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub success_rate: f64,
    pub recent_trend: Trend,
    pub performance_score: f64,
    /// 0-100 blend of pass, recency and security ratios.
    pub quality_score: f64,
    pub metrics: QualityMetrics,
}

/// Quality insights engine.
#[derive(Debug, Clone)]
pub struct Analyzer {
    recent_window_days: u32,
    slow_ms: f64,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            recent_window_days: 7,
            slow_ms: 5000.0,
        }
    }

    pub fn with_recent_window_days(mut self, days: u32) -> Self {
        self.recent_window_days = days;
        self
    }

    pub fn with_slow_threshold(mut self, ms: f64) -> Self {
        self.slow_ms = ms;
        self
    }

    pub fn insights(&self, results: &[TestResult], now: DateTime<Utc>) -> Analysis {
        if results.is_empty() {
            return Analysis::default();
        }
        let window_start = now
            .checked_sub_signed(Duration::days(i64::from(self.recent_window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let durations: Vec<f64> = results.iter().filter_map(|r| r.duration_ms).collect();
        let average_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let metrics = QualityMetrics {
            total: results.len(),
            passed: results.iter().filter(|r| r.status.is_pass()).count(),
            failed: results.iter().filter(|r| r.status.is_failure()).count(),
            recent: results
                .iter()
                .filter(|r| r.created_at.is_some_and(|t| t >= window_start))
                .count(),
            average_duration_ms,
            slow: durations.iter().filter(|d| **d > self.slow_ms).count(),
            security: results.iter().filter(|r| r.is_security()).count(),
        };

        let total = metrics.total as f64;
        let pass_ratio = metrics.passed as f64 / total;
        let recent_ratio = metrics.recent as f64 / total;
        let security_ratio = metrics.security as f64 / total;

        Analysis {
            success_rate: (pass_ratio * 100.0).round(),
            recent_trend: if metrics.recent > 0 {
                Trend::Up
            } else {
                Trend::Stable
            },
            performance_score: (100.0 - average_duration_ms / 100.0).max(0.0),
            quality_score: (pass_ratio * 40.0 + recent_ratio * 30.0 + security_ratio * 30.0)
                .round(),
            metrics,
        }
    }
}

impl AnalyzerTrait for Analyzer {
    type Output = Analysis;

    fn name(&self) -> &'static str {
        "quality"
    }

    fn description(&self) -> &'static str {
        "Summarize pass rate, recency, speed and security coverage of results"
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.recent_window_days = config.scorecard.recent_window_days;
        self.slow_ms = config.scorecard.slow_category_ms;
        Ok(())
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Self::Output> {
        let analysis = self.insights(&ctx.snapshot.results, ctx.now);
        ctx.metric(self.name(), "quality_score", analysis.quality_score);
        Ok(analysis)
    }
}
