//! Core types and traits shared by every engine.

mod analyzer;
mod error;
pub mod model;
mod observer;
pub mod source;
mod snapshot;

pub use analyzer::{AnalysisContext, Analyzer};
pub use error::{Error, Result};
pub use model::{Category, RiskLevel, Status, TestResult, TestRun};
pub use observer::{NoopObserver, Observation, Observer, RecordingObserver, TracingObserver};
pub use snapshot::Snapshot;
