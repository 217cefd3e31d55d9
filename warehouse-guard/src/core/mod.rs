//! Core data types shared by the mapper, the evaluators and the engine.
//!
//! - [`NormalizedRecord`]: one inventory unit after column projection
//! - [`Anomaly`]: a finding produced by a rule evaluator
//! - [`AnalysisReport`]: everything a run produced, ready for formatting

mod anomaly;
mod record;
mod report;

pub use anomaly::{Anomaly, AnomalyBuilder, AnomalyType, Priority, RuleCategory};
pub use record::{
    parse_timestamp, render_value, NormalizedRecord, ProjectionStats, RawRow, RecordProjector,
};
pub use report::{
    AnalysisReport, AnalysisSummary, RulePerformance, RuleStatus, RunWarning, WarningKind,
};
