//! CLI implementation using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::analyzers::impact::ChangeDescriptor;
use crate::config::Granularity;
use crate::core::Result;

/// Vigil - test-quality scorecards, change impact and anomaly detection.
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding test_run.json and test_result.json
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Output format (defaults to output.format from config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only load records newer than this many days
    #[arg(long)]
    pub since_days: Option<u32>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Score every service on a 1-10 scale with risk and suggestions
    #[command(alias = "sc")]
    Scorecard(ScorecardArgs),

    /// Detect duration outliers and failure clusters
    #[command(alias = "anomaly")]
    Anomalies(AnomalyArgs),

    /// Summarize pass rate, recency and security coverage
    Quality,

    /// Predict the blast radius and risk of a change
    #[command(alias = "pr")]
    Impact(ImpactArgs),

    /// Show the service registry
    #[command(alias = "services")]
    Registry(RegistryArgs),
}

#[derive(Args)]
pub struct ScorecardArgs {
    /// Score without the slow-test performance penalty
    #[arg(long)]
    pub no_penalty: bool,

    /// Only report this service
    #[arg(short, long)]
    pub service: Option<String>,
}

#[derive(Args)]
pub struct AnomalyArgs {
    /// Detector granularity
    #[arg(short, long, value_enum)]
    pub granularity: Option<GranularityArg>,

    /// Maximum number of anomalies
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ImpactArgs {
    /// Change descriptor file (JSON or TOML)
    #[arg(long, conflicts_with = "services")]
    pub change: Option<PathBuf>,

    /// Service touched by the change (repeatable)
    #[arg(short, long = "service")]
    pub services: Vec<String>,

    #[arg(long, default_value_t = 0)]
    pub lines_added: u64,

    #[arg(long, default_value_t = 0)]
    pub lines_deleted: u64,

    #[arg(long, default_value_t = 0)]
    pub files_changed: u64,

    /// API endpoint whose contract changed (repeatable)
    #[arg(long = "api-endpoint")]
    pub api_endpoints: Vec<String>,

    #[arg(long, default_value_t = 0)]
    pub test_files_changed: u64,

    /// Service registry file (overrides impact.registry)
    #[arg(short, long)]
    pub registry: Option<PathBuf>,
}

impl ImpactArgs {
    /// The change under analysis, from `--change` or the inline flags.
    pub fn change_descriptor(&self) -> Result<ChangeDescriptor> {
        if let Some(path) = &self.change {
            return ChangeDescriptor::from_file(path);
        }
        Ok(ChangeDescriptor {
            services: self.services.clone(),
            lines_added: self.lines_added,
            lines_deleted: self.lines_deleted,
            files_changed: self.files_changed,
            api_endpoints: self.api_endpoints.clone(),
            test_files_changed: self.test_files_changed,
        })
    }
}

#[derive(Args)]
pub struct RegistryArgs {
    /// Service registry file (overrides impact.registry)
    #[arg(short, long)]
    pub registry: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
    Text,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GranularityArg {
    TestCase,
    Global,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::TestCase => Granularity::TestCase,
            GranularityArg::Global => Granularity::Global,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
