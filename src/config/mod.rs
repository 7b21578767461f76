//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::{Category, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Suite-label keyword table.
    pub resolver: ResolverConfig,
    /// Scorecard weights and thresholds.
    pub scorecard: ScorecardConfig,
    /// Impact analysis weights and thresholds.
    pub impact: ImpactConfig,
    /// Anomaly detection configuration.
    pub anomaly: AnomalyConfig,
    /// Paging bounds for the data source.
    pub source: SourceConfig,
    /// Output configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist. Use this for explicit `--config` flags.
    /// Env vars with `VIGIL_` prefix override file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(crate::core::Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file_exact(path))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .map_err(|e| crate::core::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from directory, looking for vigil.toml or .vigil/vigil.toml.
    ///
    /// Missing files are silently skipped (defaults are used).
    /// Env vars with `VIGIL_` prefix override file/default values.
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(dir.join("vigil.toml")))
            .merge(Toml::file(dir.join(".vigil/vigil.toml")))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .map_err(|e| crate::core::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create default config file content.
    pub fn default_toml() -> &'static str {
        include_str!("default_config.toml")
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        let weights = &self.scorecard.weights;
        if Category::ALL.iter().any(|c| {
            let w = weights.get(*c);
            !w.is_finite() || w < 0.0
        }) {
            return Err(crate::core::Error::config(
                "scorecard weights must be finite and non-negative",
            ));
        }
        if self.source.page_size == 0 || self.source.max_pages == 0 {
            return Err(crate::core::Error::config(
                "source.page_size and source.max_pages must be positive",
            ));
        }
        if !(self.anomaly.sigma.is_finite() && self.anomaly.sigma > 0.0) {
            return Err(crate::core::Error::config("anomaly.sigma must be positive"));
        }
        if self.anomaly.recent_results == 0 || self.anomaly.recent_failures == 0 {
            return Err(crate::core::Error::config(
                "anomaly.recent_results and anomaly.recent_failures must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Maps a lowercase keyword found in a suite label to a service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKeyword {
    pub keyword: String,
    pub service: String,
}

impl ServiceKeyword {
    fn new(keyword: &str, service: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            service: service.to_string(),
        }
    }
}

/// Service resolver configuration. Order matters: the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub services: Vec<ServiceKeyword>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            services: vec![
                ServiceKeyword::new("user", "User Service"),
                ServiceKeyword::new("users", "User Service"),
                ServiceKeyword::new("order", "Order Service"),
                ServiceKeyword::new("orders", "Order Service"),
                ServiceKeyword::new("product", "Product Service"),
                ServiceKeyword::new("products", "Product Service"),
                ServiceKeyword::new("notification", "Notification Service"),
                ServiceKeyword::new("notifications", "Notification Service"),
                ServiceKeyword::new("gateway", "Gateway Service"),
                ServiceKeyword::new("api", "Gateway Service"),
            ],
        }
    }
}

/// Per-category weights for the overall score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub unit: f64,
    pub api: f64,
    pub integration: f64,
    pub ui: f64,
    pub system: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            unit: 0.25,
            api: 0.30,
            integration: 0.25,
            ui: 0.10,
            system: 0.10,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Unit => self.unit,
            Category::Api => self.api,
            Category::Integration => self.integration,
            Category::Ui => self.ui,
            Category::System => self.system,
        }
    }
}

/// Average-duration thresholds (ms) above which the performance penalty applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationThresholds {
    pub unit: f64,
    pub api: f64,
    pub integration: f64,
    pub ui: f64,
    pub system: f64,
}

impl Default for DurationThresholds {
    fn default() -> Self {
        Self {
            unit: 100.0,
            api: 500.0,
            integration: 2000.0,
            ui: 5000.0,
            system: 10000.0,
        }
    }
}

impl DurationThresholds {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Unit => self.unit,
            Category::Api => self.api,
            Category::Integration => self.integration,
            Category::Ui => self.ui,
            Category::System => self.system,
        }
    }
}

/// Boundaries of the three-tier service risk classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRiskThresholds {
    /// Overall percentage below which a service is HIGH risk.
    pub high_score_below: f64,
    /// Recent failure rate (%) above which a service is HIGH risk.
    pub high_recent_failure_above: f64,
    pub medium_score_below: f64,
    pub medium_recent_failure_above: f64,
}

impl Default for ServiceRiskThresholds {
    fn default() -> Self {
        Self {
            high_score_below: 60.0,
            high_recent_failure_above: 30.0,
            medium_score_below: 80.0,
            medium_recent_failure_above: 15.0,
        }
    }
}

/// Scorecard engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardConfig {
    pub weights: CategoryWeights,
    pub duration_thresholds: DurationThresholds,
    /// Subtract up to 20 points from slow categories.
    pub performance_penalty: bool,
    /// Days counted as "recent" for stability and risk.
    pub recent_window_days: u32,
    pub risk: ServiceRiskThresholds,
    /// Average duration (ms) above which a category gets a performance suggestion.
    pub slow_category_ms: f64,
    /// Fewer categories than this triggers a coverage suggestion.
    pub min_categories: usize,
    /// Fewer tests than this triggers a volume suggestion.
    pub min_test_volume: usize,
    /// Recent failure rate (%) above which a stability suggestion is made.
    pub unstable_failure_pct: f64,
}

impl Default for ScorecardConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            duration_thresholds: DurationThresholds::default(),
            performance_penalty: true,
            recent_window_days: 7,
            risk: ServiceRiskThresholds::default(),
            slow_category_ms: 5000.0,
            min_categories: 3,
            min_test_volume: 50,
            unstable_failure_pct: 20.0,
        }
    }
}

/// Weights of the five change-risk components. They sum to 1.0 by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub complexity: f64,
    pub coverage: f64,
    pub dependency: f64,
    pub historical: f64,
    pub critical_path: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            complexity: 0.20,
            coverage: 0.25,
            dependency: 0.20,
            historical: 0.15,
            critical_path: 0.20,
        }
    }
}

/// Impact analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    pub risk_weights: RiskWeights,
    /// Dependents levels followed when computing the blast radius.
    pub blast_radius_depth: usize,
    /// Minimum probability for a direct dependent to be listed.
    pub direct_threshold: f64,
    /// Minimum probability for an indirect dependent to be listed.
    pub indirect_threshold: f64,
    /// Coverage (%) below which a service counts as under-tested.
    pub coverage_target: f64,
    /// Historical failure rate (0-1) above which impact probabilities rise.
    pub historical_failure_threshold: f64,
    /// Service registry file (TOML or JSON).
    pub registry: Option<PathBuf>,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            risk_weights: RiskWeights::default(),
            blast_radius_depth: 2,
            direct_threshold: 0.3,
            indirect_threshold: 0.2,
            coverage_target: 80.0,
            historical_failure_threshold: 0.1,
            registry: None,
        }
    }
}

/// Which anomaly detector runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Per test case: duration outliers and failure clusters.
    #[default]
    TestCase,
    /// Whole stream: outliers, failure rates and volume swings.
    Global,
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "test_case" | "testcase" | "case" => Ok(Self::TestCase),
            "global" => Ok(Self::Global),
            _ => Err(format!("Unknown granularity: {s}. Use 'test_case' or 'global'")),
        }
    }
}

/// Anomaly detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub granularity: Granularity,
    /// Standard deviations that make a duration an outlier.
    pub sigma: f64,
    /// Samples a test case needs before it is examined.
    pub min_samples: usize,
    /// Known durations a test case needs before its timing is examined.
    pub min_durations: usize,
    /// How many of the newest results are inspected.
    pub recent_results: usize,
    /// Failures among the newest results that make a reliability anomaly.
    pub recent_failures: usize,
    /// Global failure rate (%) that is anomalous.
    pub failure_rate_pct: f64,
    /// Per-service failure rate (%) that is anomalous.
    pub service_failure_rate_pct: f64,
    /// Day-over-day volume change (%) that is anomalous.
    pub volume_change_pct: f64,
    /// Maximum anomalies reported.
    pub limit: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::TestCase,
            sigma: 2.0,
            min_samples: 5,
            min_durations: 3,
            recent_results: 3,
            recent_failures: 2,
            failure_rate_pct: 20.0,
            service_failure_rate_pct: 30.0,
            volume_change_pct: 50.0,
            limit: 10,
        }
    }
}

/// Data source paging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub page_size: usize,
    /// Upper bound on pages fetched per table.
    pub max_pages: usize,
    /// Only records newer than this many days are fetched.
    pub since_days: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 100,
            since_days: 90,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format.
    pub format: OutputFormat,
    /// Color output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON format.
    Json,
    /// Markdown format.
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "md" | "markdown" => Ok(Self::Markdown),
            _ => Err(format!("Unknown format: {s}. Use 'text', 'json', or 'md'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scorecard.recent_window_days, 7);
        assert!(config.scorecard.performance_penalty);
        assert_eq!(config.impact.blast_radius_depth, 2);
        assert_eq!(config.anomaly.granularity, Granularity::TestCase);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = CategoryWeights::default();
        let total: f64 = Category::ALL.iter().map(|c| w.get(*c)).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let r = RiskWeights::default();
        let total = r.complexity + r.coverage + r.dependency + r.historical + r.critical_path;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_thresholds() {
        let t = DurationThresholds::default();
        assert_eq!(t.get(Category::Unit), 100.0);
        assert_eq!(t.get(Category::Api), 500.0);
        assert_eq!(t.get(Category::Integration), 2000.0);
        assert_eq!(t.get(Category::Ui), 5000.0);
        assert_eq!(t.get(Category::System), 10000.0);
    }

    #[test]
    fn test_resolver_default_order() {
        let config = ResolverConfig::default();
        assert_eq!(config.services[0].keyword, "user");
        assert_eq!(config.services.last().unwrap().service, "Gateway Service");
    }

    #[test]
    fn test_config_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "vigil.toml",
                "[scorecard]\nperformance_penalty = false\nrecent_window_days = 14",
            )?;
            let config = Config::from_file("vigil.toml").unwrap();
            assert!(!config.scorecard.performance_penalty);
            assert_eq!(config.scorecard.recent_window_days, 14);
            assert_eq!(config.scorecard.weights.api, 0.30);
            Ok(())
        });
    }

    #[test]
    fn test_config_load_default_dot_vigil() {
        Jail::expect_with(|jail| {
            std::fs::create_dir(jail.directory().join(".vigil")).unwrap();
            jail.create_file(".vigil/vigil.toml", "[anomaly]\ngranularity = \"global\"")?;
            let config = Config::load_default(".").unwrap();
            assert_eq!(config.anomaly.granularity, Granularity::Global);
            Ok(())
        });
    }

    #[test]
    fn test_config_load_default_no_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load_default(".").unwrap();
            assert_eq!(config.source.since_days, 90);
            Ok(())
        });
    }

    #[test]
    fn test_resolver_table_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "vigil.toml",
                "[[resolver.services]]\nkeyword = \"billing\"\nservice = \"Billing Service\"",
            )?;
            let config = Config::from_file("vigil.toml").unwrap();
            assert_eq!(config.resolver.services.len(), 1);
            assert_eq!(config.resolver.services[0].service, "Billing Service");
            Ok(())
        });
    }

    #[test]
    fn test_from_file_errors_on_missing_file() {
        let result = Config::from_file("/nonexistent/path/vigil.toml");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("not found"), "expected 'not found' in: {err}");
    }

    #[test]
    fn test_env_var_overrides_file_value() {
        Jail::expect_with(|jail| {
            jail.create_file("vigil.toml", "[impact]\nblast_radius_depth = 3")?;
            jail.set_env("VIGIL_IMPACT__BLAST_RADIUS_DEPTH", "1");
            let config = Config::from_file("vigil.toml").unwrap();
            assert_eq!(config.impact.blast_radius_depth, 1);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_weight_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("vigil.toml", "[scorecard.weights]\nunit = -1.0")?;
            assert!(Config::from_file("vigil.toml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = Config::default();
        config.source.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_anomaly_windows_rejected() {
        let mut config = Config::default();
        config.anomaly.recent_results = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.anomaly.recent_failures = 0;
        assert!(config.validate().is_err());

        Jail::expect_with(|jail| {
            jail.create_file("vigil.toml", "[anomaly]\nrecent_failures = 0")?;
            assert!(Config::from_file("vigil.toml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_default_toml_parses() {
        let content = Config::default_toml();
        let parsed: Config = toml::from_str(content).unwrap();
        assert_eq!(parsed.scorecard.weights.api, 0.30);
        assert_eq!(parsed.anomaly.limit, 10);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("test-case".parse::<Granularity>().unwrap(), Granularity::TestCase);
        assert_eq!("GLOBAL".parse::<Granularity>().unwrap(), Granularity::Global);
        assert!("hourly".parse::<Granularity>().is_err());
    }
}
