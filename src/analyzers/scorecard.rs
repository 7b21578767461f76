//! Per-service quality scorecards.
//!
//! Each service gets a 1-10 overall score from the weighted mean of its
//! category success rates, plus stability and coverage sub-scores, a
//! three-tier risk level and a prioritized list of improvement suggestions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::{Aggregator, CategoryStats, ServiceAggregate};
use super::resolver::Resolver;
use crate::config::{Config, ScorecardConfig};
use crate::core::{AnalysisContext, Analyzer as AnalyzerTrait, Category, Result, RiskLevel};

/// Score reported for anything that cannot be computed.
pub const MIN_SCORE: u8 = 1;
/// Upper bound of the score scale.
pub const MAX_SCORE: u8 = 10;
/// Largest number of points the performance penalty subtracts.
const MAX_PENALTY: f64 = 20.0;

/// Convert a 0-100 percentage to the 1-10 scale.
///
/// Linear with a floor of 1: non-finite or non-positive input maps to 1,
/// anything at or above 100 maps to 10.
pub fn percentage_to_score(pct: f64) -> u8 {
    if !pct.is_finite() || pct <= 0.0 {
        return MIN_SCORE;
    }
    if pct >= 100.0 {
        return MAX_SCORE;
    }
    (1.0 + pct / 100.0 * 9.0).round().clamp(1.0, 10.0) as u8
}

/// Points subtracted when a category's average duration exceeds its threshold.
pub fn performance_penalty(average_ms: f64, threshold_ms: f64) -> f64 {
    let excess = average_ms - threshold_ms;
    if !excess.is_finite() || excess <= 0.0 {
        return 0.0;
    }
    (excess / 1000.0 * 10.0).min(MAX_PENALTY)
}

/// Suggestion bucket. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SuggestionCategory {
    Critical,
    #[serde(rename = "High Priority")]
    HighPriority,
    #[serde(rename = "Medium Priority")]
    MediumPriority,
    Performance,
    Coverage,
    Stability,
    Volume,
    #[serde(rename = "Risk Management")]
    RiskManagement,
}

impl fmt::Display for SuggestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Critical => "Critical",
            Self::HighPriority => "High Priority",
            Self::MediumPriority => "Medium Priority",
            Self::Performance => "Performance",
            Self::Coverage => "Coverage",
            Self::Stability => "Stability",
            Self::Volume => "Volume",
            Self::RiskManagement => "Risk Management",
        })
    }
}

/// Impact or effort estimate of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        })
    }
}

/// A structured improvement suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: SuggestionCategory,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
    pub impact: Tier,
    pub effort: Tier,
}

/// Score breakdown of one test category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub score: u8,
    pub success_rate: f64,
    /// Success rate after the performance penalty.
    pub adjusted_pct: f64,
    pub penalty: f64,
    pub average_duration_ms: f64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Scorecard for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceScorecard {
    pub service: String,
    pub project: String,
    pub overall_score: u8,
    pub overall_pct: f64,
    pub stability_score: u8,
    pub stability_pct: f64,
    pub coverage_score: u8,
    pub coverage_pct: f64,
    pub risk_level: RiskLevel,
    pub categories: Vec<CategoryScore>,
    /// Every run is one executed test.
    pub total_runs: usize,
    pub recent_runs: usize,
    pub recent_failure_rate: f64,
    pub last_run: Option<DateTime<Utc>>,
    pub suggestions: Vec<Suggestion>,
    /// Category of the first rule that fired, before sorting.
    pub priority: Option<SuggestionCategory>,
    pub critical_count: usize,
}

/// Summary statistics across all services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_services: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub average_score: f64,
}

/// Scorecard analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub services: Vec<ServiceScorecard>,
    pub summary: Summary,
}

/// Scorecard engine.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: ScorecardConfig,
    resolver: Resolver,
    /// Canonical service name to keep, compared case-insensitively.
    service: Option<String>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            config: ScorecardConfig::default(),
            resolver: Resolver::default(),
            service: None,
        }
    }

    /// Restrict the report, summary included, to one service.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_config(mut self, config: ScorecardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_performance_penalty(mut self, enabled: bool) -> Self {
        self.config.performance_penalty = enabled;
        self
    }

    /// Score a single aggregated service.
    pub fn score(&self, aggregate: &ServiceAggregate) -> ServiceScorecard {
        let categories: Vec<CategoryScore> = aggregate
            .categories
            .iter()
            .filter(|(_, stats)| stats.total > 0)
            .map(|(category, stats)| self.score_category(*category, stats))
            .collect();

        let overall_pct = self.overall_percentage(&categories);
        let recent_failure_rate = aggregate.recent_failure_rate();

        let (overall_score, risk_level) = if overall_pct.is_finite() {
            (
                percentage_to_score(overall_pct),
                self.classify_risk(overall_pct, recent_failure_rate),
            )
        } else {
            (MIN_SCORE, RiskLevel::High)
        };

        let stability_pct = stability_percentage(
            recent_failure_rate,
            aggregate.overall_failure_rate(),
        );
        let coverage_pct = self.coverage_percentage(aggregate);

        let mut scorecard = ServiceScorecard {
            service: aggregate.service.clone(),
            project: aggregate.project.clone(),
            overall_score,
            overall_pct,
            stability_score: percentage_to_score(stability_pct),
            stability_pct,
            coverage_score: percentage_to_score(coverage_pct),
            coverage_pct,
            risk_level,
            categories,
            total_runs: aggregate.total_runs(),
            recent_runs: aggregate.recent_runs(),
            recent_failure_rate,
            last_run: aggregate.last_run,
            suggestions: Vec::new(),
            priority: None,
            critical_count: 0,
        };

        let suggestions = self.suggest(&scorecard);
        scorecard.priority = suggestions.first().map(|s| s.category);
        scorecard.critical_count = suggestions
            .iter()
            .filter(|s| s.category == SuggestionCategory::Critical)
            .count();
        scorecard.suggestions = sort_suggestions(suggestions);
        scorecard
    }

    fn score_category(&self, category: Category, stats: &CategoryStats) -> CategoryScore {
        let success_rate = stats.success_rate();
        let average_duration_ms = stats.average_duration();
        let penalty = if self.config.performance_penalty {
            performance_penalty(
                average_duration_ms,
                self.config.duration_thresholds.get(category),
            )
        } else {
            0.0
        };
        let adjusted_pct = (success_rate - penalty).max(0.0);

        CategoryScore {
            category,
            score: percentage_to_score(adjusted_pct),
            success_rate,
            adjusted_pct,
            penalty,
            average_duration_ms,
            total: stats.total,
            passed: stats.passed,
            failed: stats.failed,
        }
    }

    /// Weighted mean of adjusted percentages, rounded. 0 with no weight.
    fn overall_percentage(&self, categories: &[CategoryScore]) -> f64 {
        let (weighted, total_weight) = categories.iter().fold((0.0, 0.0), |(sum, w), c| {
            let weight = self.config.weights.get(c.category);
            (sum + c.adjusted_pct * weight, w + weight)
        });
        if total_weight <= 0.0 {
            return 0.0;
        }
        (weighted / total_weight).round()
    }

    /// Rewards category diversity: half from the share of categories present,
    /// half from their summed weights.
    fn coverage_percentage(&self, aggregate: &ServiceAggregate) -> f64 {
        let present: Vec<Category> = aggregate.present_categories().collect();
        let ratio = present.len() as f64 / Category::ALL.len() as f64;
        let weight: f64 = present.iter().map(|c| self.config.weights.get(*c)).sum();
        (ratio * 50.0 + weight * 50.0).clamp(0.0, 100.0)
    }

    fn classify_risk(&self, overall_pct: f64, recent_failure_rate: f64) -> RiskLevel {
        let t = &self.config.risk;
        if overall_pct < t.high_score_below || recent_failure_rate > t.high_recent_failure_above {
            RiskLevel::High
        } else if overall_pct < t.medium_score_below
            || recent_failure_rate > t.medium_recent_failure_above
        {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Run every suggestion rule, in rule order.
    fn suggest(&self, card: &ServiceScorecard) -> Vec<Suggestion> {
        let mut out = Vec::new();

        if card.overall_score <= 4 {
            out.push(Suggestion {
                category: SuggestionCategory::Critical,
                title: "Overall Score Too Low".to_string(),
                description: format!(
                    "Current score of {}/10 indicates significant quality issues.",
                    card.overall_score
                ),
                actions: strings(&[
                    "Review and fix failing tests immediately",
                    "Investigate root causes of test failures",
                    "Implement comprehensive test coverage",
                    "Consider test automation improvements",
                ]),
                impact: Tier::High,
                effort: Tier::High,
            });
        } else if card.overall_score <= 6 {
            out.push(Suggestion {
                category: SuggestionCategory::HighPriority,
                title: "Score Needs Improvement".to_string(),
                description: format!(
                    "Score of {}/10 is below acceptable standards.",
                    card.overall_score
                ),
                actions: strings(&[
                    "Focus on improving test success rates",
                    "Optimize test execution performance",
                    "Add missing test types for better coverage",
                ]),
                impact: Tier::Medium,
                effort: Tier::Medium,
            });
        }

        for c in &card.categories {
            let upper = c.category.as_str().to_uppercase();
            if c.score <= 3 {
                out.push(Suggestion {
                    category: SuggestionCategory::Critical,
                    title: format!("{upper} Tests Failing"),
                    description: format!(
                        "{} tests scoring only {}/10 with {:.1}% success rate.",
                        c.category, c.score, c.success_rate
                    ),
                    actions: category_actions(c.category),
                    impact: Tier::High,
                    effort: category_effort(c.category),
                });
            } else if c.score <= 5 {
                out.push(Suggestion {
                    category: SuggestionCategory::MediumPriority,
                    title: format!("{upper} Tests Need Attention"),
                    description: format!(
                        "{} tests at {}/10 could be improved.",
                        c.category, c.score
                    ),
                    actions: category_actions(c.category),
                    impact: Tier::Medium,
                    effort: category_effort(c.category),
                });
            }

            if c.average_duration_ms > self.config.slow_category_ms {
                out.push(Suggestion {
                    category: SuggestionCategory::Performance,
                    title: format!("{upper} Tests Slow"),
                    description: format!(
                        "Average duration of {:.0}ms is quite slow. Consider optimization.",
                        c.average_duration_ms
                    ),
                    actions: performance_actions(c.category),
                    impact: Tier::Low,
                    effort: Tier::Medium,
                });
            }
        }

        if card.categories.len() < self.config.min_categories {
            out.push(Suggestion {
                category: SuggestionCategory::Coverage,
                title: "Limited Test Type Coverage".to_string(),
                description: format!(
                    "Only {} test types found. Comprehensive testing requires multiple test types.",
                    card.categories.len()
                ),
                actions: strings(&[
                    "Add unit tests for business logic",
                    "Implement API/integration tests",
                    "Consider UI/end-to-end tests",
                    "Add contract tests for service boundaries",
                ]),
                impact: Tier::High,
                effort: Tier::High,
            });
        }

        if card.recent_failure_rate > self.config.unstable_failure_pct {
            out.push(Suggestion {
                category: SuggestionCategory::Stability,
                title: "High Recent Failure Rate".to_string(),
                description: format!(
                    "{:.1}% of recent test runs are failing.",
                    card.recent_failure_rate
                ),
                actions: strings(&[
                    "Investigate recent test failures",
                    "Check for environment issues",
                    "Review test data dependencies",
                    "Implement better error handling",
                ]),
                impact: Tier::High,
                effort: Tier::Medium,
            });
        }

        if card.total_runs < self.config.min_test_volume {
            out.push(Suggestion {
                category: SuggestionCategory::Volume,
                title: "Low Test Volume".to_string(),
                description: format!(
                    "Only {} total tests. More comprehensive test coverage needed.",
                    card.total_runs
                ),
                actions: strings(&[
                    "Increase test coverage for critical paths",
                    "Add edge case testing",
                    "Implement boundary value testing",
                    "Add negative test scenarios",
                ]),
                impact: Tier::Medium,
                effort: Tier::High,
            });
        }

        if card.risk_level == RiskLevel::High {
            out.push(Suggestion {
                category: SuggestionCategory::RiskManagement,
                title: "High Risk Service".to_string(),
                description: "This service poses high risk to system stability.".to_string(),
                actions: strings(&[
                    "Implement additional monitoring",
                    "Add circuit breakers and fallbacks",
                    "Increase test frequency",
                    "Consider canary deployments",
                ]),
                impact: Tier::High,
                effort: Tier::Medium,
            });
        }

        out
    }
}

/// Stability percentage, weighting the recent window at 70%. Floored at 0.
pub fn stability_percentage(recent_failure_rate: f64, overall_failure_rate: f64) -> f64 {
    (100.0 - (0.7 * recent_failure_rate + 0.3 * overall_failure_rate)).max(0.0)
}

/// Stable sort by suggestion bucket.
fn sort_suggestions(mut suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    suggestions.sort_by_key(|s| s.category);
    suggestions
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn category_actions(category: Category) -> Vec<String> {
    let mut actions = strings(&[
        "Review failing test cases",
        "Check test data setup",
        "Verify test environment configuration",
    ]);
    actions.extend(strings(match category {
        Category::Unit => &[
            "Mock external dependencies properly",
            "Test edge cases and boundary conditions",
            "Ensure tests are isolated and repeatable",
            "Add tests for error handling paths",
        ],
        Category::Api => &[
            "Verify API contract compliance",
            "Test different HTTP status codes",
            "Validate request/response schemas",
            "Test authentication and authorization",
        ],
        Category::Integration => &[
            "Check database connectivity",
            "Verify external service integrations",
            "Test data consistency across services",
            "Validate transaction handling",
        ],
        Category::Ui => &[
            "Check browser compatibility",
            "Verify element selectors",
            "Test responsive design",
            "Validate user interaction flows",
        ],
        Category::System => &[
            "Verify end-to-end workflows",
            "Check system resource usage",
            "Test under load conditions",
            "Validate system integration points",
        ],
    }));
    actions
}

fn performance_actions(category: Category) -> Vec<String> {
    let mut actions = strings(&[
        "Profile test execution to identify bottlenecks",
        "Optimize test data setup and teardown",
        "Use parallel test execution where possible",
    ]);
    let extra: &[&str] = match category {
        Category::Unit => &[
            "Reduce database calls in unit tests",
            "Use in-memory databases for testing",
            "Mock slow external services",
        ],
        Category::Api => &[
            "Use connection pooling",
            "Implement request caching",
            "Optimize API response sizes",
        ],
        Category::Integration => &[
            "Use test containers for faster setup",
            "Implement database seeding strategies",
            "Cache frequently used test data",
        ],
        Category::Ui => &[
            "Use headless browser mode",
            "Implement page object pattern",
            "Reduce wait times with smart waits",
        ],
        Category::System => &[],
    };
    actions.extend(strings(extra));
    actions
}

fn category_effort(category: Category) -> Tier {
    match category {
        Category::Unit => Tier::Low,
        Category::Api => Tier::Medium,
        Category::Integration | Category::Ui => Tier::High,
        Category::System => Tier::VeryHigh,
    }
}

impl AnalyzerTrait for Analyzer {
    type Output = Analysis;

    fn name(&self) -> &'static str {
        "scorecard"
    }

    fn description(&self) -> &'static str {
        "Score per-service test quality on a 1-10 scale with risk and suggestions"
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.config = config.scorecard.clone();
        self.resolver = Resolver::new(&config.resolver);
        Ok(())
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Self::Output> {
        let aggregator = Aggregator::new(self.resolver.clone(), self.config.recent_window_days);
        let aggregates = aggregator.aggregate(&ctx.snapshot.runs, &ctx.snapshot.results, ctx.now);

        let mut services: Vec<ServiceScorecard> = aggregates
            .values()
            .filter(|a| {
                self.service
                    .as_deref()
                    .map_or(true, |wanted| a.service.eq_ignore_ascii_case(wanted))
            })
            .map(|a| self.score(a))
            .collect();
        services.sort_by(|a, b| {
            b.overall_score
                .cmp(&a.overall_score)
                .then_with(|| a.service.cmp(&b.service))
        });

        let mut summary = Summary {
            total_services: services.len(),
            ..Default::default()
        };
        for card in &services {
            match card.risk_level {
                RiskLevel::High => summary.high_risk += 1,
                RiskLevel::Medium => summary.medium_risk += 1,
                RiskLevel::Low => summary.low_risk += 1,
            }
        }
        if !services.is_empty() {
            summary.average_score = services
                .iter()
                .map(|s| f64::from(s.overall_score))
                .sum::<f64>()
                / services.len() as f64;
        }

        ctx.metric(self.name(), "services", services.len() as f64);
        ctx.metric(self.name(), "high_risk", summary.high_risk as f64);
        ctx.metric(self.name(), "average_score", summary.average_score);
        if services.is_empty() {
            ctx.note(self.name(), "no runs in snapshot");
        }

        Ok(Analysis { services, summary })
    }
}
