use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Anomaly, AnomalyType, Priority, ProjectionStats};
use crate::mapping::MappingReport;
use crate::prelude::*;

/// Outcome of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    /// The evaluator ran to completion
    Completed,
    /// The evaluator returned an error or panicked
    Failed { error: String },
    /// No evaluator exists for the rule's type
    Skipped { reason: String },
}

/// Timing and yield of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePerformance {
    pub rule_id: String,
    pub rule_name: String,
    /// Anomaly-type tag as written in the definition
    pub rule_type: String,
    pub duration: Duration,
    /// Anomalies the evaluator produced
    pub candidates: usize,
    /// Anomalies that survived deduplication
    pub retained: usize,
    pub status: RuleStatus,
}

/// Non-fatal problem encountered during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Rule definition rejected at load time
    RuleRejected,
    /// Rule type has no registered evaluator
    UnknownRuleType,
    /// Evaluator failed during the run
    EvaluatorFailed,
    /// Input data problem that did not stop the run
    DataQuality,
}

/// A warning attached to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub kind: WarningKind,
    pub rule_id: Option<String>,
    pub message: String,
}

impl RunWarning {
    /// Creates a warning tied to a rule.
    pub fn for_rule(kind: WarningKind, rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule_id: Some(rule_id.into()),
            message: message.into(),
        }
    }

    /// Creates a warning about the input data.
    pub fn data(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::DataQuality,
            rule_id: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_id {
            Some(rule_id) => write!(f, "[{rule_id}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_records: usize,
    pub distinct_locations: usize,
    pub invalid_locations: usize,
    pub rules_evaluated: usize,
    pub rules_failed: usize,
    pub rules_skipped: usize,
    /// Anomalies produced before deduplication
    pub candidates: usize,
    /// Anomalies removed by deduplication
    pub suppressed: usize,
    /// Surviving anomalies that lost units to a higher-precedence anomaly
    pub narrowed: usize,
    /// Anomalies in the final report
    pub anomalies: usize,
    pub by_type: BTreeMap<AnomalyType, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub total_duration: Duration,
}

impl AnalysisSummary {
    /// Fills the per-type and per-priority counts from the final anomalies.
    pub fn count_anomalies(&mut self, anomalies: &[Anomaly]) {
        self.anomalies = anomalies.len();
        self.by_type.clear();
        self.by_priority.clear();
        for anomaly in anomalies {
            *self.by_type.entry(anomaly.anomaly_type).or_default() += 1;
            *self.by_priority.entry(anomaly.priority).or_default() += 1;
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub warehouse_id: String,
    /// Fingerprint of the warehouse configuration used
    pub config_fingerprint: String,
    /// Time all ages were measured against
    pub reference_time: DateTime<Utc>,
    /// Final anomalies in report order
    pub anomalies: Vec<Anomaly>,
    /// Column mapping, when the run started from raw rows
    pub mapping: Option<MappingReport>,
    /// Projection counters, when the run started from raw rows
    pub projection: Option<ProjectionStats>,
    /// Per-rule timing in evaluation order
    pub rule_performance: Vec<RulePerformance>,
    pub warnings: Vec<RunWarning>,
    pub summary: AnalysisSummary,
}

impl AnalysisReport {
    /// Returns true if any anomaly was reported.
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    /// Anomalies of one type.
    pub fn anomalies_of(&self, anomaly_type: AnomalyType) -> impl Iterator<Item = &Anomaly> {
        self.anomalies
            .iter()
            .filter(move |a| a.anomaly_type == anomaly_type)
    }

    /// Anomalies whose primary unit is the given unit.
    pub fn anomalies_for_unit<'a>(&'a self, unit_id: &'a str) -> impl Iterator<Item = &'a Anomaly> {
        self.anomalies.iter().filter(move |a| a.unit_id == unit_id)
    }

    /// Performance entry for a rule.
    pub fn rule(&self, rule_id: &str) -> Option<&RulePerformance> {
        self.rule_performance.iter().find(|p| p.rule_id == rule_id)
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
