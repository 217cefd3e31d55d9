//! The anomaly engine: runs compiled rules over projected records.
//!
//! A run loads the location registry once, resolves every location code into
//! a shared [`LocationIndex`], dispatches each rule to its evaluator on the
//! blocking pool and deduplicates the candidates by precedence.
//!
//! ## Example
//!
//! ```rust,no_run
//! use warehouse_guard::prelude::*;
//!
//! # async fn example(headers: Vec<String>, rows: Vec<RawRow>) -> Result<()> {
//! let engine = AnomalyEngine::builder()
//!     .with_config(EngineConfig::default().with_max_concurrency(4))
//!     .build();
//! let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
//!
//! let report = engine
//!     .analyze(AnalysisRequest::new(headers, rows), &context)
//!     .await?;
//! for anomaly in &report.anomalies {
//!     println!("{} {} {}", anomaly.priority, anomaly.anomaly_type, anomaly.details);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod dedup;

pub use config::EngineConfig;
pub use dedup::{deduplicate, Candidate, DedupOutcome};

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::core::{
    AnalysisReport, AnalysisSummary, Anomaly, NormalizedRecord, RawRow, RecordProjector,
    RulePerformance, RuleStatus, RunWarning, WarningKind,
};
use crate::location::{
    EmptyLocationRegistry, LocationIndex, LocationRegistry, LocationResolver, RegistrySnapshot,
    WarehouseConfig,
};
use crate::logging::LogConfig;
use crate::mapping::{ColumnMapper, MappingDecisions, TargetSchema};
use crate::prelude::*;
use crate::rules::{
    CompiledRule, EvaluationInput, Evaluator, EvaluatorRegistry, RuleDefinition, RuleSet,
};
use crate::{log_rule, perf_debug};

/// Reference data for one warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseContext {
    pub config: Arc<WarehouseConfig>,
    pub registry: Arc<dyn LocationRegistry>,
}

impl WarehouseContext {
    /// Context with an empty location registry.
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(EmptyLocationRegistry),
        }
    }

    /// Sets the location registry.
    pub fn with_registry(mut self, registry: Arc<dyn LocationRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

/// A full analysis starting from raw export rows.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Header row in input order; derived from the rows when empty
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub decisions: MappingDecisions,
    pub rules: Vec<RuleDefinition>,
    /// Time ages are measured against; the current time when absent
    pub reference_time: Option<DateTime<Utc>>,
}

impl AnalysisRequest {
    /// Request with no mapping decisions and the default rule set.
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self {
            headers,
            rows,
            decisions: MappingDecisions::default(),
            rules: RuleDefinition::default_rules(),
            reference_time: None,
        }
    }

    /// Sets the operator's mapping decisions.
    pub fn with_decisions(mut self, decisions: MappingDecisions) -> Self {
        self.decisions = decisions;
        self
    }

    /// Replaces the rule definitions.
    pub fn with_rules(mut self, rules: Vec<RuleDefinition>) -> Self {
        self.rules = rules;
        self
    }

    /// Pins the reference time.
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    fn effective_headers(&self) -> Vec<String> {
        if !self.headers.is_empty() {
            return self.headers.clone();
        }
        let mut headers: Vec<String> = self
            .rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        headers.sort();
        headers
    }
}

/// What one rule produced.
#[derive(Debug)]
struct RuleOutcome {
    performance: RulePerformance,
    order: usize,
    anomalies: Vec<Anomaly>,
    warning: Option<RunWarning>,
}

/// Runs rule sets against inventory snapshots.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    config: EngineConfig,
    evaluators: EvaluatorRegistry,
    mapper: ColumnMapper,
}

impl Default for AnomalyEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AnomalyEngine {
    /// Creates a builder with the built-in evaluators and inventory schema.
    pub fn builder() -> AnomalyEngineBuilder {
        AnomalyEngineBuilder::new()
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The evaluator registry rule types resolve through.
    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    /// The column mapper used by [`analyze`](Self::analyze).
    pub fn mapper(&self) -> &ColumnMapper {
        &self.mapper
    }

    /// Compiles rule definitions against this engine's evaluators.
    pub fn compile(&self, definitions: &[RuleDefinition]) -> RuleSet {
        RuleSet::compile(definitions, &self.evaluators)
    }

    /// Maps, projects and analyzes raw export rows.
    ///
    /// Fails only when a required field is left unmapped or the reference data
    /// cannot be read.
    #[instrument(skip_all, fields(warehouse.id = %context.config.warehouse_id, rows = request.rows.len()))]
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        context: &WarehouseContext,
    ) -> Result<AnalysisReport> {
        let headers = request.effective_headers();
        let mapping = self.mapper.map_headers(&headers);
        let resolved = mapping.resolve(&request.decisions)?;

        let (records, projection) = RecordProjector::new(resolved).project(&request.rows);
        let rules = self.compile(&request.rules);
        let reference_time = request.reference_time.unwrap_or_else(Utc::now);

        let mut report = self.run(&rules, records, context, reference_time).await?;

        let mut data_warnings = Vec::new();
        if projection.missing_unit_id > 0 {
            data_warnings.push(RunWarning::data(format!(
                "{} row(s) skipped without a pallet id",
                projection.missing_unit_id
            )));
        }
        if projection.missing_location > 0 {
            data_warnings.push(RunWarning::data(format!(
                "{} row(s) have no location",
                projection.missing_location
            )));
        }
        if projection.unparseable_timestamps > 0 {
            data_warnings.push(RunWarning::data(format!(
                "{} row(s) have an unparseable creation date",
                projection.unparseable_timestamps
            )));
        }
        for warning in &data_warnings {
            warn!(warning = %warning, "Input data quality");
        }
        report.warnings.extend(data_warnings);
        report.mapping = Some(mapping);
        report.projection = Some(projection);
        Ok(report)
    }

    /// Runs a compiled rule set over already-projected records.
    #[instrument(skip_all, fields(
        warehouse.id = %context.config.warehouse_id,
        rules = rules.len(),
        records = records.len(),
        parallel = self.config.parallel
    ))]
    pub async fn run(
        &self,
        rules: &RuleSet,
        records: Vec<NormalizedRecord>,
        context: &WarehouseContext,
        reference_time: DateTime<Utc>,
    ) -> Result<AnalysisReport> {
        info!(
            warehouse.id = %context.config.warehouse_id,
            rules = rules.len(),
            records = records.len(),
            "Starting anomaly analysis"
        );
        let start_time = Instant::now();
        let log = &self.config.log;

        let snapshot = RegistrySnapshot::load(context.registry.as_ref(), &context.config).await?;
        let resolver = LocationResolver::new(context.config.clone(), Arc::new(snapshot))?;
        let index = LocationIndex::build(
            &resolver,
            records.iter().map(|r| r.location.as_str()),
            log,
        );
        let config_fingerprint = index.fingerprint().to_string();
        let distinct_locations = index.len();
        let invalid_locations = index.invalid_count();
        let total_records = records.len();

        let input = Arc::new(EvaluationInput::new(records, index, reference_time));
        let outcomes = self.evaluate_all(rules, input).await;

        let mut warnings: Vec<RunWarning> = rules.warnings().to_vec();
        let mut performance = Vec::with_capacity(outcomes.len());
        let mut candidates = Vec::new();
        let mut summary = AnalysisSummary {
            total_records,
            distinct_locations,
            invalid_locations,
            ..AnalysisSummary::default()
        };

        for outcome in outcomes {
            match outcome.performance.status {
                RuleStatus::Completed => summary.rules_evaluated += 1,
                RuleStatus::Failed { .. } => summary.rules_failed += 1,
                RuleStatus::Skipped { .. } => summary.rules_skipped += 1,
            }
            if let Some(warning) = outcome.warning {
                warnings.push(warning);
            }
            candidates.extend(outcome.anomalies.into_iter().map(|anomaly| Candidate {
                rule_order: outcome.order,
                anomaly,
            }));
            performance.push(outcome.performance);
        }

        summary.candidates = candidates.len();
        let dedup = deduplicate(candidates);
        for entry in &mut performance {
            entry.retained = dedup
                .retained_by_rule
                .get(&entry.rule_id)
                .copied()
                .unwrap_or(0);
        }
        summary.suppressed = dedup.suppressed;
        summary.narrowed = dedup.narrowed;
        summary.count_anomalies(&dedup.retained);
        summary.total_duration = start_time.elapsed();

        if log.run_metrics {
            info!(
                anomalies = summary.anomalies,
                candidates = summary.candidates,
                suppressed = summary.suppressed,
                narrowed = summary.narrowed,
                rules.failed = summary.rules_failed,
                duration_ms = summary.total_duration.as_millis() as u64,
                "Anomaly analysis completed"
            );
        } else {
            info!(anomalies = summary.anomalies, "Anomaly analysis completed");
        }

        Ok(AnalysisReport {
            warehouse_id: context.config.warehouse_id.clone(),
            config_fingerprint,
            reference_time,
            anomalies: dedup.retained,
            mapping: None,
            projection: None,
            rule_performance: performance,
            warnings,
            summary,
        })
    }

    async fn evaluate_all(&self, rules: &RuleSet, input: Arc<EvaluationInput>) -> Vec<RuleOutcome> {
        let log = &self.config.log;
        if self.config.parallel {
            let concurrency = self.config.effective_concurrency();
            debug!(concurrency, "Evaluating rules concurrently");
            // `buffered` yields in submission order, so output follows rule order
            stream::iter(rules.rules().iter().cloned())
                .map(|rule| evaluate_rule(rule, input.clone(), log.clone()))
                .buffered(concurrency)
                .collect()
                .await
        } else {
            let mut outcomes = Vec::with_capacity(rules.len());
            for rule in rules.rules() {
                outcomes.push(evaluate_rule(rule.clone(), input.clone(), log.clone()).await);
            }
            outcomes
        }
    }
}

/// Evaluates one rule on the blocking pool, turning faults into warnings.
#[instrument(skip_all, fields(rule.id = %rule.id, rule.kind = %rule.rule_type))]
async fn evaluate_rule(rule: CompiledRule, input: Arc<EvaluationInput>, log: LogConfig) -> RuleOutcome {
    let order = rule.order;
    let mut performance = RulePerformance {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        rule_type: rule.rule_type.clone(),
        duration: Duration::ZERO,
        candidates: 0,
        retained: 0,
        status: RuleStatus::Completed,
    };

    if rule.is_noop() {
        debug!(rule.id = %rule.id, "Skipping rule without evaluator");
        performance.status = RuleStatus::Skipped {
            reason: format!("no evaluator for rule type '{}'", rule.rule_type),
        };
        return RuleOutcome {
            performance,
            order,
            anomalies: Vec::new(),
            warning: None,
        };
    }

    log_rule!(log, rule.id = %rule.id, rule.precedence = rule.precedence, "Evaluating rule");
    let start = Instant::now();
    let rule_id = rule.id.clone();
    let joined = tokio::task::spawn_blocking(move || rule.evaluator.evaluate(&rule, &input)).await;
    performance.duration = start.elapsed();

    let failure = match joined {
        Ok(Ok(anomalies)) => {
            performance.candidates = anomalies.len();
            for anomaly in &anomalies {
                log_rule!(
                    log,
                    rule.id = %rule_id,
                    unit = %anomaly.unit_id,
                    location = %log.field(&anomaly.location),
                    details = %log.field(&anomaly.details),
                    "Candidate anomaly"
                );
            }
            perf_debug!(
                log,
                rule.id = %rule_id,
                candidates = anomalies.len(),
                duration_us = performance.duration.as_micros() as u64,
                "Rule evaluated"
            );
            return RuleOutcome {
                performance,
                order,
                anomalies,
                warning: None,
            };
        }
        Ok(Err(e)) => e.to_string(),
        Err(join_error) if join_error.is_panic() => {
            format!("evaluator panicked: {}", panic_message(join_error.into_panic()))
        }
        Err(join_error) => format!("evaluator task failed: {join_error}"),
    };

    error!(rule.id = %rule_id, error = %failure, "Rule evaluation failed");
    performance.status = RuleStatus::Failed {
        error: failure.clone(),
    };
    RuleOutcome {
        performance,
        order,
        anomalies: Vec::new(),
        warning: Some(RunWarning::for_rule(
            WarningKind::EvaluatorFailed,
            rule_id,
            failure,
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`AnomalyEngine`].
#[derive(Debug)]
pub struct AnomalyEngineBuilder {
    config: EngineConfig,
    evaluators: EvaluatorRegistry,
    schema: TargetSchema,
}

impl Default for AnomalyEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyEngineBuilder {
    /// Creates a builder with defaults.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            evaluators: EvaluatorRegistry::with_defaults(),
            schema: TargetSchema::inventory(),
        }
    }

    /// Sets the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an evaluator, replacing any built-in one for the same type.
    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.register(evaluator);
        self
    }

    /// Replaces the whole evaluator registry.
    pub fn with_evaluators(mut self, evaluators: EvaluatorRegistry) -> Self {
        self.evaluators = evaluators;
        self
    }

    /// Sets the target schema for column mapping.
    pub fn with_schema(mut self, schema: TargetSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> AnomalyEngine {
        AnomalyEngine {
            config: self.config,
            evaluators: self.evaluators,
            mapper: ColumnMapper::new(self.schema),
        }
    }
}
