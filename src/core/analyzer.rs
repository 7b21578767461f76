//! Analyzer trait and the context every engine runs against.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::observer::{NoopObserver, Observer};
use super::{Result, Snapshot};
use crate::config::Config;
use crate::registry::Registry;

static NOOP: NoopObserver = NoopObserver;

/// Trait implemented by all engines.
pub trait Analyzer: Send + Sync {
    /// The report type produced by this engine.
    type Output: Serialize + Send;

    /// Unique identifier for this engine.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Compute the report. Must not mutate anything reachable from `ctx`.
    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Self::Output>;

    /// Configure the engine from config.
    fn configure(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }
}

/// Immutable inputs shared by all engines during one computation.
pub struct AnalysisContext<'a> {
    /// Fully materialized runs and results.
    pub snapshot: &'a Snapshot,
    /// Static service metadata (dependency graph, coverage, failure rates).
    pub registry: &'a Registry,
    /// Configuration.
    pub config: &'a Config,
    /// Reference instant for recency windows.
    pub now: DateTime<Utc>,
    observer: &'a dyn Observer,
}

impl<'a> AnalysisContext<'a> {
    /// Create a new context anchored at the current time.
    pub fn new(snapshot: &'a Snapshot, registry: &'a Registry, config: &'a Config) -> Self {
        Self {
            snapshot,
            registry,
            config,
            now: Utc::now(),
            observer: &NOOP,
        }
    }

    /// Pin the reference instant (tests, replays).
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Attach an observability hook.
    pub fn with_observer(mut self, observer: &'a dyn Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn observer(&self) -> &dyn Observer {
        self.observer
    }

    /// Report a metric if an observer is attached.
    pub fn metric(&self, engine: &'static str, name: &'static str, value: f64) {
        self.observer.metric(engine, name, value);
    }

    /// Report a note if an observer is attached.
    pub fn note(&self, engine: &'static str, message: &str) {
        self.observer.note(engine, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordingObserver;
    use chrono::TimeZone;

    #[test]
    fn test_context_defaults() {
        let snapshot = Snapshot::default();
        let registry = Registry::default();
        let config = Config::default();
        let ctx = AnalysisContext::new(&snapshot, &registry, &config);
        assert!(ctx.snapshot.runs.is_empty());
        // Should not panic without an observer.
        ctx.metric("test", "value", 1.0);
        ctx.note("test", "nothing to see");
    }

    #[test]
    fn test_context_with_now_and_observer() {
        let snapshot = Snapshot::default();
        let registry = Registry::default();
        let config = Config::default();
        let observer = RecordingObserver::new();
        let now = Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap();

        let ctx = AnalysisContext::new(&snapshot, &registry, &config)
            .with_now(now)
            .with_observer(&observer);
        ctx.metric("test", "value", 42.0);

        assert_eq!(ctx.now, now);
        assert_eq!(observer.last_metric("test", "value"), Some(42.0));
    }
}
