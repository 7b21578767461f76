//! Engines that turn a snapshot of CI data into reports.

pub mod aggregate;
pub mod anomaly;
pub mod impact;
pub mod quality;
pub mod resolver;
pub mod scorecard;

// Re-export engine types for convenience
pub use aggregate::Aggregator;
pub use anomaly::Analyzer as AnomalyAnalyzer;
pub use impact::{Analyzer as ImpactAnalyzer, ChangeDescriptor};
pub use quality::Analyzer as QualityAnalyzer;
pub use resolver::Resolver;
pub use scorecard::Analyzer as ScorecardAnalyzer;
