//! Change impact analysis over the service dependency graph.
//!
//! Given a change descriptor (services touched, lines and files changed),
//! predicts:
//! - An impact score on a 0-10 scale
//! - A blast radius of dependents with impact probabilities
//! - A weighted risk assessment over five components
//! - Recommendations tied to the affected services

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::resolver::{Resolver, UNKNOWN_SERVICE};
use crate::config::{Config, ImpactConfig};
use crate::core::{AnalysisContext, Analyzer as AnalyzerTrait, Error, Result, RiskLevel, Snapshot};
use crate::registry::{Criticality, Registry};

const BASE_CONFIDENCE: f64 = 0.8;

/// A proposed or merged code change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDescriptor {
    /// Registry names of the services the change touches.
    pub services: Vec<String>,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub files_changed: u64,
    /// Public endpoints whose contract changed.
    pub api_endpoints: Vec<String>,
    pub test_files_changed: u64,
}

impl ChangeDescriptor {
    /// Load a change descriptor from a `.json` or `.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Ok(toml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    pub fn total_lines(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }

    pub fn api_changed(&self) -> bool {
        !self.api_endpoints.is_empty()
    }

    /// Short labels for what stands out in the change.
    pub fn key_changes(&self) -> Vec<String> {
        let mut changes = Vec::new();
        if self.lines_added > 100 {
            changes.push("Significant code additions".to_string());
        }
        if self.lines_deleted > 50 {
            changes.push("Code refactoring/removal".to_string());
        }
        if self.files_changed > 10 {
            changes.push("Multiple file modifications".to_string());
        }
        if self.services.len() > 1 {
            changes.push("Multi-service changes".to_string());
        }
        if changes.is_empty() {
            changes.push("Minor code changes".to_string());
        }
        changes
    }
}

/// Features extracted from a change and the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub total_lines: u64,
    pub files_changed: u64,
    pub services_touched: usize,
    /// Lines per file over ten, capped at 20.
    pub complexity: f64,
    /// Mean coverage of touched services; `None` when no touched service has data.
    pub average_coverage: Option<f64>,
    pub dependency_depth: usize,
    pub critical_services: usize,
    /// Mean historical failure rate (0-1); `None` when nothing is known.
    pub historical_failure_rate: Option<f64>,
    pub api_changed: bool,
    pub test_files_changed: u64,
}

impl Features {
    /// Coverage used in scoring. Unknown coverage counts as zero.
    fn effective_coverage(&self) -> f64 {
        self.average_coverage.unwrap_or(0.0)
    }

    fn effective_failure_rate(&self) -> f64 {
        self.historical_failure_rate.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactType {
    Direct,
    Indirect,
}

/// How an affected service relates to the changed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    DependsOn,
    TransitiveDependency,
}

/// A service predicted to be affected by the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlastRadiusEntry {
    pub service: String,
    pub probability: f64,
    pub impact_type: ImpactType,
    pub relationship: Relationship,
    pub criticality: Criticality,
    /// Service through which the impact propagates.
    pub via: String,
}

/// The five normalized (0-1) risk components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub complexity: f64,
    pub coverage: f64,
    pub dependency: f64,
    pub historical: f64,
    pub critical_path: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub components: RiskComponents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    TestCoverage,
    DependencyManagement,
    CriticalPath,
    ImpactScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub message: String,
    pub action: String,
    pub services: Vec<String>,
}

/// Impact analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub impact_score: f64,
    pub risk_level: RiskLevel,
    pub blast_radius: Vec<BlastRadiusEntry>,
    pub confidence: f64,
    pub description: String,
    pub key_changes: Vec<String>,
    pub features: Features,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<Recommendation>,
}

/// Impact analysis engine for one change.
#[derive(Debug, Clone)]
pub struct Analyzer {
    change: ChangeDescriptor,
    config: ImpactConfig,
    resolver: Resolver,
}

impl Analyzer {
    pub fn new(change: ChangeDescriptor) -> Self {
        Self {
            change,
            config: ImpactConfig::default(),
            resolver: Resolver::default(),
        }
    }

    pub fn with_config(mut self, config: ImpactConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn change(&self) -> &ChangeDescriptor {
        &self.change
    }

    /// Analyze the change against a registry, falling back to `snapshot`
    /// for failure rates the registry does not carry.
    pub fn report(&self, registry: &Registry, snapshot: &Snapshot) -> ImpactReport {
        let features = self.extract_features(registry, snapshot);
        let impact_score = impact_score(&features);
        let blast_radius = self.blast_radius(registry, &features);
        let risk_assessment = self.assess_risk(&features);
        let recommendations =
            self.recommendations(registry, &risk_assessment, &blast_radius);
        let confidence = confidence(&features);

        ImpactReport {
            impact_score,
            risk_level: risk_assessment.risk_level,
            description: describe(&blast_radius, impact_score),
            blast_radius,
            confidence,
            key_changes: self.change.key_changes(),
            features,
            risk_assessment,
            recommendations,
        }
    }

    fn touched(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.change
            .services
            .iter()
            .map(String::as_str)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    fn extract_features(&self, registry: &Registry, snapshot: &Snapshot) -> Features {
        let touched = self.touched();
        let change = &self.change;

        let complexity = if change.files_changed > 0 {
            (change.total_lines() as f64 / change.files_changed as f64 / 10.0).min(20.0)
        } else {
            0.0
        };

        let average_coverage = if touched.is_empty() {
            Some(100.0)
        } else {
            mean(touched.iter().filter_map(|s| registry.average_coverage(s)))
        };

        let historical_failure_rate = mean(
            touched.iter().filter_map(|s| {
                registry
                    .failure_rate(s)
                    .or_else(|| self.observed_failure_rate(s, snapshot))
            }),
        );

        Features {
            total_lines: change.total_lines(),
            files_changed: change.files_changed,
            services_touched: touched.len(),
            complexity,
            average_coverage,
            dependency_depth: touched
                .iter()
                .map(|s| registry.dependency_depth(s))
                .max()
                .unwrap_or(0),
            critical_services: touched
                .iter()
                .filter(|s| registry.criticality(s) == Criticality::Critical)
                .count(),
            historical_failure_rate,
            api_changed: change.api_changed(),
            test_files_changed: change.test_files_changed,
        }
    }

    /// Failure rate (0-1) of runs whose suite resolves to the same service.
    fn observed_failure_rate(&self, service: &str, snapshot: &Snapshot) -> Option<f64> {
        let canonical = self.resolver.resolve_service(Some(service));
        if canonical == UNKNOWN_SERVICE {
            return None;
        }
        let (total, failed) = snapshot
            .runs
            .iter()
            .filter(|r| self.resolver.resolve_service(r.suite.as_deref()) == canonical)
            .fold((0usize, 0usize), |(t, f), r| {
                (t + 1, f + usize::from(r.status.is_failure()))
            });
        (total > 0).then(|| failed as f64 / total as f64)
    }

    fn probability(
        &self,
        registry: &Registry,
        source: &str,
        target: &str,
        features: &Features,
    ) -> f64 {
        let mut p: f64 = 0.5;
        if registry.criticality(source) == Criticality::Critical {
            p += 0.3;
        }
        if registry.criticality(target) == Criticality::Critical {
            p += 0.2;
        }
        // Unknown coverage counts as under target.
        if registry
            .average_coverage(source)
            .map_or(true, |c| c < self.config.coverage_target)
        {
            p += 0.2;
        }
        if features.effective_failure_rate() > self.config.historical_failure_threshold {
            p += 0.1;
        }
        if features.api_changed {
            p += 0.1;
        }
        p.min(1.0)
    }

    /// Level-ordered walk along dependents edges. Each node is expanded at
    /// most once and each service is listed at most once.
    fn blast_radius(&self, registry: &Registry, features: &Features) -> Vec<BlastRadiusEntry> {
        let mut entries: Vec<BlastRadiusEntry> = Vec::new();
        let mut listed: HashSet<&str> = HashSet::new();
        let mut frontier = self.touched();
        let mut expanded: HashSet<&str> = frontier.iter().copied().collect();

        for level in 1..=self.config.blast_radius_depth {
            let (impact_type, relationship, threshold) = if level == 1 {
                (
                    ImpactType::Direct,
                    Relationship::DependsOn,
                    self.config.direct_threshold,
                )
            } else {
                (
                    ImpactType::Indirect,
                    Relationship::TransitiveDependency,
                    self.config.indirect_threshold,
                )
            };
            let decay = 0.5f64.powi(level as i32 - 1);
            let mut next = Vec::new();

            for source in frontier {
                for target in registry.dependents(source) {
                    let probability = self.probability(registry, source, target, features) * decay;
                    if probability > threshold && listed.insert(target) {
                        entries.push(BlastRadiusEntry {
                            service: target.to_string(),
                            probability,
                            impact_type,
                            relationship,
                            criticality: registry.criticality(target),
                            via: source.to_string(),
                        });
                    }
                    if expanded.insert(target) {
                        next.push(target);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        entries.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        entries
    }

    fn assess_risk(&self, features: &Features) -> RiskAssessment {
        let components = RiskComponents {
            complexity: (features.complexity / 20.0).min(1.0),
            coverage: ((100.0 - features.effective_coverage()) / 100.0).max(0.0),
            dependency: (features.dependency_depth as f64 / 5.0).min(1.0),
            historical: features.effective_failure_rate().min(1.0),
            critical_path: if features.critical_services > 0 { 1.0 } else { 0.0 },
        };
        let w = &self.config.risk_weights;
        let risk_score = components.complexity * w.complexity
            + components.coverage * w.coverage
            + components.dependency * w.dependency
            + components.historical * w.historical
            + components.critical_path * w.critical_path;

        let risk_level = if !risk_score.is_finite() || risk_score >= 0.7 {
            RiskLevel::High
        } else if risk_score >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        RiskAssessment {
            risk_score,
            risk_level,
            components,
        }
    }

    fn recommendations(
        &self,
        registry: &Registry,
        risk: &RiskAssessment,
        blast_radius: &[BlastRadiusEntry],
    ) -> Vec<Recommendation> {
        let mut out = Vec::new();

        if risk.components.coverage > 0.5 {
            out.push(Recommendation {
                kind: RecommendationKind::TestCoverage,
                priority: Priority::High,
                message: "Increase test coverage for modified components".to_string(),
                action: "Add unit and integration tests for changed code paths".to_string(),
                services: blast_radius
                    .iter()
                    .filter(|e| e.impact_type == ImpactType::Direct)
                    .map(|e| e.service.clone())
                    .collect(),
            });
        }

        if risk.components.dependency > 0.6 {
            out.push(Recommendation {
                kind: RecommendationKind::DependencyManagement,
                priority: Priority::Medium,
                message: "Review dependency changes carefully".to_string(),
                action: "Run comprehensive integration tests on dependent services".to_string(),
                services: blast_radius.iter().map(|e| e.service.clone()).collect(),
            });
        }

        if risk.components.critical_path > 0.0 {
            let mut services: Vec<String> = self
                .touched()
                .into_iter()
                .filter(|s| registry.criticality(s) == Criticality::Critical)
                .map(str::to_string)
                .collect();
            for entry in blast_radius {
                if entry.criticality == Criticality::Critical && !services.contains(&entry.service)
                {
                    services.push(entry.service.clone());
                }
            }
            out.push(Recommendation {
                kind: RecommendationKind::CriticalPath,
                priority: Priority::High,
                message: "Critical path components modified".to_string(),
                action: "Execute full regression test suite and staging deployment".to_string(),
                services,
            });
        }

        if blast_radius.len() > 3 {
            out.push(Recommendation {
                kind: RecommendationKind::ImpactScope,
                priority: Priority::Medium,
                message: "Wide impact scope detected".to_string(),
                action: "Coordinate testing across multiple teams and services".to_string(),
                services: blast_radius.iter().take(3).map(|e| e.service.clone()).collect(),
            });
        }

        out
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Impact score on a 0-10 scale.
pub fn impact_score(features: &Features) -> f64 {
    let mut score = (features.total_lines as f64 / 100.0).min(5.0);
    score += (features.services_touched as f64 * 0.5).min(3.0);
    score += (features.dependency_depth as f64 * 0.4).min(2.0);
    if features.critical_services > 0 {
        score += 2.0;
    }
    let coverage = features.effective_coverage();
    if coverage < 80.0 {
        score += (80.0 - coverage) / 40.0;
    }
    if score.is_finite() {
        score.clamp(0.0, 10.0)
    } else {
        10.0
    }
}

/// Confidence in the report given which inputs were missing.
pub fn confidence(features: &Features) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if features.services_touched == 0 {
        confidence -= 0.3;
    }
    if features.average_coverage.is_none() {
        confidence -= 0.2;
    }
    if features.historical_failure_rate.is_none() {
        confidence -= 0.1;
    }
    confidence.clamp(0.1, 1.0)
}

fn describe(blast_radius: &[BlastRadiusEntry], impact_score: f64) -> String {
    if blast_radius.is_empty() {
        return "No significant impact expected on other services.".to_string();
    }
    let names = |kind: ImpactType| {
        blast_radius
            .iter()
            .filter(|e| e.impact_type == kind)
            .map(|e| e.service.as_str())
            .collect::<Vec<_>>()
    };

    let mut description = format!(
        "This change is expected to impact {} service(s). ",
        blast_radius.len()
    );
    let direct = names(ImpactType::Direct);
    if !direct.is_empty() {
        description.push_str(&format!("Direct impact on: {}. ", direct.join(", ")));
    }
    let indirect = names(ImpactType::Indirect);
    if !indirect.is_empty() {
        description.push_str(&format!("Indirect impact on: {}. ", indirect.join(", ")));
    }
    description.push_str(if impact_score > 7.0 {
        "High impact change requiring comprehensive testing."
    } else if impact_score > 4.0 {
        "Medium impact change requiring targeted testing."
    } else {
        "Low impact change with minimal testing requirements."
    });
    description
}

impl AnalyzerTrait for Analyzer {
    type Output = ImpactReport;

    fn name(&self) -> &'static str {
        "impact"
    }

    fn description(&self) -> &'static str {
        "Predict blast radius and risk of a code change"
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.config = config.impact.clone();
        self.resolver = Resolver::new(&config.resolver);
        Ok(())
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Self::Output> {
        if ctx.registry.is_empty() {
            ctx.note(self.name(), "service registry is empty");
        }
        let report = self.report(ctx.registry, ctx.snapshot);

        ctx.metric(self.name(), "impact_score", report.impact_score);
        ctx.metric(self.name(), "blast_radius", report.blast_radius.len() as f64);
        ctx.metric(self.name(), "risk_score", report.risk_assessment.risk_score);
        ctx.metric(self.name(), "confidence", report.confidence);

        Ok(report)
    }
}
