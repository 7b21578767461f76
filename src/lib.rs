//! Vigil - test-quality analytics over CI run data.
//!
//! Vigil reads test runs and test results, groups them by service and test
//! category, and produces per-service scorecards, change impact predictions,
//! duration and failure anomalies, and stream-wide quality insights.
//!
//! # Example
//!
//! ```no_run
//! use vigil::analyzers::ScorecardAnalyzer;
//! use vigil::config::Config;
//! use vigil::core::source::{JsonDirSource, Pager};
//! use vigil::core::{AnalysisContext, Analyzer, Snapshot};
//! use vigil::registry::Registry;
//!
//! let config = Config::default();
//! let source = JsonDirSource::open("ci-data").unwrap();
//! let snapshot = Snapshot::load(&source, None, &Pager::default()).unwrap();
//! let registry = Registry::default();
//! let ctx = AnalysisContext::new(&snapshot, &registry, &config);
//! let result = ScorecardAnalyzer::new().analyze(&ctx).unwrap();
//! println!("Scored {} services", result.summary.total_services);
//! ```

pub mod analyzers;
pub mod cli;
pub mod config;
pub mod core;
pub mod output;
pub mod registry;

pub use core::{AnalysisContext, Analyzer, Snapshot};
