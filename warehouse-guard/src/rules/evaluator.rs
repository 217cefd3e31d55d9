use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use super::evaluators;
use super::{CompiledRule, RuleConditions};
use crate::core::{Anomaly, AnomalyType, NormalizedRecord};
use crate::location::{LocationDescriptor, LocationIndex};
use crate::prelude::*;

/// Everything an evaluator may look at. Shared read-only across rules.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub records: Vec<NormalizedRecord>,
    pub locations: LocationIndex,
    /// Time ages are measured against
    pub reference_time: DateTime<Utc>,
}

/// Records sharing one normalized location.
#[derive(Debug)]
pub struct LocationGroup<'a> {
    pub descriptor: &'a LocationDescriptor,
    pub records: Vec<&'a NormalizedRecord>,
}

impl LocationGroup<'_> {
    /// Distinct unit ids in first-seen order.
    pub fn distinct_units(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.unit_id.as_str()))
            .map(|r| r.unit_id.clone())
            .collect()
    }
}

impl EvaluationInput {
    /// Creates an input from projected records and their location index.
    pub fn new(
        records: Vec<NormalizedRecord>,
        locations: LocationIndex,
        reference_time: DateTime<Utc>,
    ) -> Self {
        Self {
            records,
            locations,
            reference_time,
        }
    }

    /// Descriptor of a record's location.
    pub fn descriptor(&self, record: &NormalizedRecord) -> Option<&LocationDescriptor> {
        self.locations.get(&record.location).map(|d| &**d)
    }

    /// Records paired with their descriptors, in record order.
    pub fn located(&self) -> impl Iterator<Item = (&NormalizedRecord, &LocationDescriptor)> {
        self.records
            .iter()
            .filter_map(|r| self.descriptor(r).map(|d| (r, d)))
    }

    /// Records grouped by normalized location code, in code order.
    pub fn by_location(&self) -> BTreeMap<&str, LocationGroup<'_>> {
        let mut groups: BTreeMap<&str, LocationGroup<'_>> = BTreeMap::new();
        for (record, descriptor) in self.located() {
            groups
                .entry(descriptor.code.as_str())
                .or_insert_with(|| LocationGroup {
                    descriptor,
                    records: Vec::new(),
                })
                .records
                .push(record);
        }
        groups
    }

    /// Hours between a record's creation and the reference time.
    pub fn age_hours(&self, record: &NormalizedRecord) -> Option<f64> {
        record
            .age_at(self.reference_time)
            .map(|age| age.num_seconds() as f64 / 3600.0)
    }
}

/// A detector for one anomaly type.
///
/// Evaluators are stateless and pure: the same rule and input always produce
/// the same anomalies in the same order.
pub trait Evaluator: Debug + Send + Sync {
    /// Anomaly type handled, `None` for the no-op evaluator.
    fn anomaly_type(&self) -> Option<AnomalyType>;

    /// Human-readable evaluator name.
    fn name(&self) -> &str;

    /// Parses and validates a condition bag at rule-load time.
    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions>;

    /// Produces anomaly candidates.
    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>>;

    /// Returns true if this evaluator never produces anything.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Stand-in for rule types without an evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvaluator;

impl Evaluator for NoopEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        None
    }

    fn name(&self) -> &str {
        "noop"
    }

    fn parse_conditions(&self, _rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        Ok(RuleConditions::Unchecked(conditions.clone()))
    }

    fn evaluate(&self, _rule: &CompiledRule, _input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        Ok(Vec::new())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Maps anomaly-type tags to evaluators.
#[derive(Debug, Clone)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<AnomalyType, Arc<dyn Evaluator>>,
    noop: Arc<dyn Evaluator>,
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EvaluatorRegistry {
    /// A registry with no evaluators; every tag resolves to the no-op.
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
            noop: Arc::new(NoopEvaluator),
        }
    }

    /// A registry with the built-in evaluator for every anomaly type.
    pub fn with_defaults() -> Self {
        Self::empty()
            .with(Arc::new(evaluators::StagnantPalletsEvaluator))
            .with(Arc::new(evaluators::UncoordinatedLotsEvaluator))
            .with(Arc::new(evaluators::OvercapacityEvaluator))
            .with(Arc::new(evaluators::InvalidLocationEvaluator))
            .with(Arc::new(evaluators::LocationSpecificStagnantEvaluator))
            .with(Arc::new(evaluators::TemperatureZoneEvaluator))
            .with(Arc::new(evaluators::DataIntegrityEvaluator))
            .with(Arc::new(evaluators::LocationMappingEvaluator))
    }

    /// Registers an evaluator, replacing any previous one for its type.
    pub fn with(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.register(evaluator);
        self
    }

    /// Registers an evaluator, replacing any previous one for its type.
    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) {
        match evaluator.anomaly_type() {
            Some(anomaly_type) => {
                self.evaluators.insert(anomaly_type, evaluator);
            }
            None => warn!(evaluator = evaluator.name(), "Ignoring evaluator without an anomaly type"),
        }
    }

    /// Evaluator for a tag; unknown tags get the no-op evaluator.
    pub fn resolve(&self, tag: &str) -> Arc<dyn Evaluator> {
        AnomalyType::from_tag(tag)
            .and_then(|t| self.evaluators.get(&t))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.noop))
    }

    /// Number of registered evaluators.
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

/// Builds the error returned when a rule carries conditions for another type.
pub(crate) fn conditions_mismatch(rule: &CompiledRule, expected: &str) -> WarehouseError {
    WarehouseError::evaluation(
        &rule.id,
        format!(
            "expected {expected} conditions, got {}",
            rule.conditions.kind()
        ),
    )
}
