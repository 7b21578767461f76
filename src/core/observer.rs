//! Observability hook handed to every engine.
//!
//! Engines never log directly; they report named metrics and notes through
//! an [`Observer`] carried by the [`AnalysisContext`](super::AnalysisContext).

use std::sync::Mutex;

/// Receives metrics and notes emitted while an engine runs.
pub trait Observer: Send + Sync {
    /// A numeric measurement, e.g. `("scorecard", "overall_pct", 82.0)`.
    fn metric(&self, engine: &'static str, name: &'static str, value: f64);

    /// A free-form note about a degenerate or notable condition.
    fn note(&self, engine: &'static str, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn metric(&self, _engine: &'static str, _name: &'static str, _value: f64) {}

    fn note(&self, _engine: &'static str, _message: &str) {}
}

/// Forwards to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn metric(&self, engine: &'static str, name: &'static str, value: f64) {
        tracing::debug!(engine, metric = name, value, "metric");
    }

    fn note(&self, engine: &'static str, message: &str) {
        tracing::debug!(engine, "{message}");
    }
}

/// One captured observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Metric {
        engine: &'static str,
        name: &'static str,
        value: f64,
    },
    Note {
        engine: &'static str,
        message: String,
    },
}

/// Keeps every observation in memory. Handy for tests and for callers that
/// want to ship metrics elsewhere after a run.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Last recorded value of a metric, if any.
    pub fn last_metric(&self, engine: &str, name: &str) -> Option<f64> {
        self.observations().into_iter().rev().find_map(|o| match o {
            Observation::Metric {
                engine: e,
                name: n,
                value,
            } if e == engine && n == name => Some(value),
            _ => None,
        })
    }

    fn push(&self, observation: Observation) {
        if let Ok(mut guard) = self.observations.lock() {
            guard.push(observation);
        }
    }
}

impl Observer for RecordingObserver {
    fn metric(&self, engine: &'static str, name: &'static str, value: f64) {
        self.push(Observation::Metric {
            engine,
            name,
            value,
        });
    }

    fn note(&self, engine: &'static str, message: &str) {
        self.push(Observation::Note {
            engine,
            message: message.to_string(),
        });
    }
}
