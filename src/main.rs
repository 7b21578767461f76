//! Vigil CLI - test-quality analytics over CI run data.

use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil::analyzers::{AnomalyAnalyzer, ImpactAnalyzer, QualityAnalyzer, ScorecardAnalyzer};
use vigil::cli::{Cli, Command, OutputFormat};
use vigil::config::{self, Config};
use vigil::core::source::{JsonDirSource, Pager};
use vigil::core::{AnalysisContext, Analyzer, Snapshot, TracingObserver};
use vigil::output::Format;
use vigil::registry::Registry;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "vigil=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default(&cli.path)?,
    };
    if let Some(days) = cli.since_days {
        config.source.since_days = days;
    }
    if cli.no_color || !config.output.color {
        colored::control::set_override(false);
    }

    let format = Format::from(match cli.format {
        Some(OutputFormat::Json) => config::OutputFormat::Json,
        Some(OutputFormat::Markdown) => config::OutputFormat::Markdown,
        Some(OutputFormat::Text) => config::OutputFormat::Text,
        None => config.output.format,
    });

    match cli.command {
        Command::Scorecard(args) => {
            if args.no_penalty {
                config.scorecard.performance_penalty = false;
            }
            let snapshot = load_snapshot(&cli.path, &config)?;
            let registry = Registry::default();
            let mut analyzer = ScorecardAnalyzer::new();
            if let Some(service) = args.service {
                analyzer = analyzer.with_service(service);
            }
            let analysis = run_analyzer(analyzer, &snapshot, &registry, &config)?;
            format.format(&analysis, &mut stdout())?;
        }
        Command::Anomalies(args) => {
            if let Some(granularity) = args.granularity {
                config.anomaly.granularity = granularity.into();
            }
            if let Some(limit) = args.limit {
                config.anomaly.limit = limit;
            }
            let snapshot = load_snapshot(&cli.path, &config)?;
            let registry = Registry::default();
            let analysis = run_analyzer(AnomalyAnalyzer::new(), &snapshot, &registry, &config)?;
            format.format(&analysis, &mut stdout())?;
        }
        Command::Quality => {
            let snapshot = load_snapshot(&cli.path, &config)?;
            let registry = Registry::default();
            let analysis = run_analyzer(QualityAnalyzer::new(), &snapshot, &registry, &config)?;
            format.format(&analysis, &mut stdout())?;
        }
        Command::Impact(args) => {
            let change = args
                .change_descriptor()
                .context("failed to read change descriptor")?;
            let registry = load_registry(args.registry.as_deref(), &config)?;
            let snapshot = load_snapshot(&cli.path, &config)?;
            let report = run_analyzer(ImpactAnalyzer::new(change), &snapshot, &registry, &config)?;
            format.format(&report, &mut stdout())?;
        }
        Command::Registry(args) => {
            let registry = load_registry(args.registry.as_deref(), &config)?;
            format.format(&registry.overview(), &mut stdout())?;
        }
    }

    Ok(())
}

fn load_snapshot(path: &Path, config: &Config) -> Result<Snapshot> {
    let source = JsonDirSource::open(path)
        .with_context(|| format!("failed to open data directory {}", path.display()))?;
    let since = (config.source.since_days > 0).then(|| {
        Utc::now()
            .checked_sub_signed(Duration::days(i64::from(config.source.since_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    });
    let pager = Pager {
        page_size: config.source.page_size,
        max_pages: config.source.max_pages,
    };
    let snapshot = Snapshot::load(&source, since, &pager).context("failed to load CI data")?;
    tracing::info!(
        runs = snapshot.runs.len(),
        results = snapshot.results.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

fn load_registry(flag: Option<&Path>, config: &Config) -> Result<Registry> {
    let path: Option<PathBuf> = flag
        .map(Path::to_path_buf)
        .or_else(|| config.impact.registry.clone());
    match path {
        Some(path) => Registry::from_file(&path)
            .with_context(|| format!("failed to load registry {}", path.display())),
        None => {
            tracing::warn!("no service registry configured; blast radius will be empty");
            Ok(Registry::default())
        }
    }
}

fn run_analyzer<A: Analyzer>(
    mut analyzer: A,
    snapshot: &Snapshot,
    registry: &Registry,
    config: &Config,
) -> Result<A::Output> {
    analyzer.configure(config)?;
    let observer = TracingObserver;
    let ctx = AnalysisContext::new(snapshot, registry, config).with_observer(&observer);
    let output = analyzer
        .analyze(&ctx)
        .with_context(|| format!("{} failed", analyzer.name()))?;
    Ok(output)
}
