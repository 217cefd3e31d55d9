//! Rule definitions, compilation and the evaluator contract.
//!
//! A [`RuleDefinition`] is operator data: a type tag, a priority, a precedence
//! level and a JSON condition bag. Compilation turns each active definition
//! into a [`CompiledRule`] with typed [`RuleConditions`] and the evaluator
//! that handles its tag. Definitions that fail to compile are rejected with a
//! warning; the remaining rules still run.
//!
//! ```rust
//! use warehouse_guard::rules::{EvaluatorRegistry, RuleDefinition, RuleSet};
//!
//! let rules = RuleSet::compile(&RuleDefinition::default_rules(), &EvaluatorRegistry::with_defaults());
//! assert_eq!(rules.len(), 8);
//! assert!(rules.warnings().is_empty());
//! ```

mod conditions;
mod evaluator;
pub mod evaluators;

pub use conditions::{
    CodePattern, DataIntegrityConditions, InvalidLocationConditions, LocationStagnantConditions,
    MappingErrorConditions, OvercapacityConditions, RuleConditions, StagnantConditions,
    TemperatureConditions, UncoordinatedLotsConditions,
};
pub use evaluator::{
    EvaluationInput, Evaluator, EvaluatorRegistry, LocationGroup, NoopEvaluator,
};

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::{Anomaly, AnomalyBuilder, AnomalyType, Priority, RuleCategory, RunWarning, WarningKind};
use crate::location::LocationDescriptor;

/// Precedence level for rule types without one.
pub const UNKNOWN_RULE_PRECEDENCE: u32 = 99;

/// Default precedence tier of an anomaly type. Lower wins deduplication.
///
/// 1: data integrity and invalid locations, 2: capacity and temperature safety,
/// 3: flow and time, 4: mapping quality.
pub fn default_precedence(anomaly_type: AnomalyType) -> u32 {
    match anomaly_type {
        AnomalyType::DataIntegrity | AnomalyType::InvalidLocation => 1,
        AnomalyType::Overcapacity | AnomalyType::TemperatureZoneMismatch => 2,
        AnomalyType::StagnantPallets
        | AnomalyType::UncoordinatedLots
        | AnomalyType::LocationSpecificStagnant => 3,
        AnomalyType::LocationMappingError => 4,
    }
}

fn default_active() -> bool {
    true
}

/// Operator-defined rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    /// Anomaly-type tag, e.g. `OVERCAPACITY`
    pub rule_type: String,
    pub category: RuleCategory,
    /// Free-form condition bag, parsed per rule type
    #[serde(default)]
    pub conditions: Value,
    pub priority: Priority,
    /// Precedence level; the type's default tier when absent
    #[serde(default)]
    pub precedence: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl RuleDefinition {
    /// Creates an active definition with empty conditions.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        anomaly_type: AnomalyType,
        category: RuleCategory,
        priority: Priority,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rule_type: anomaly_type.tag().to_string(),
            category,
            conditions: Value::Null,
            priority,
            precedence: None,
            active: true,
        }
    }

    /// Sets the condition bag.
    pub fn with_conditions(mut self, conditions: Value) -> Self {
        self.conditions = conditions;
        self
    }

    /// Sets an explicit precedence level.
    pub fn with_precedence(mut self, precedence: u32) -> Self {
        self.precedence = Some(precedence);
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Precedence level after applying the type default.
    pub fn effective_precedence(&self) -> u32 {
        self.precedence.unwrap_or_else(|| {
            AnomalyType::from_tag(&self.rule_type)
                .map(default_precedence)
                .unwrap_or(UNKNOWN_RULE_PRECEDENCE)
        })
    }

    /// Parses a JSON array of definitions.
    pub fn list_from_json(json: &str) -> crate::prelude::Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// One active rule per anomaly type with default conditions.
    pub fn default_rules() -> Vec<Self> {
        vec![
            Self::new(
                "stagnant-pallets",
                "Forgotten pallets in receiving",
                AnomalyType::StagnantPallets,
                RuleCategory::FlowTime,
                Priority::Medium,
            ),
            Self::new(
                "uncoordinated-lots",
                "Lot stragglers",
                AnomalyType::UncoordinatedLots,
                RuleCategory::FlowTime,
                Priority::High,
            ),
            Self::new(
                "overcapacity",
                "Location over capacity",
                AnomalyType::Overcapacity,
                RuleCategory::Space,
                Priority::High,
            ),
            Self::new(
                "invalid-location",
                "Unresolvable location code",
                AnomalyType::InvalidLocation,
                RuleCategory::Space,
                Priority::High,
            ),
            Self::new(
                "aisle-stagnant",
                "Pallets left in aisles",
                AnomalyType::LocationSpecificStagnant,
                RuleCategory::FlowTime,
                Priority::Medium,
            )
            .with_conditions(json!({"location_pattern": "^AISLE"})),
            Self::new(
                "temperature-zone",
                "Temperature-sensitive product in ambient zone",
                AnomalyType::TemperatureZoneMismatch,
                RuleCategory::Product,
                Priority::VeryHigh,
            ),
            Self::new(
                "data-integrity",
                "Scanner and data entry errors",
                AnomalyType::DataIntegrity,
                RuleCategory::Space,
                Priority::High,
            ),
            Self::new(
                "location-mapping",
                "Location declared with the wrong type",
                AnomalyType::LocationMappingError,
                RuleCategory::Space,
                Priority::Low,
            ),
        ]
    }
}

/// A definition ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    /// Tag as written in the definition
    pub rule_type: String,
    pub category: RuleCategory,
    pub priority: Priority,
    pub precedence: u32,
    pub conditions: RuleConditions,
    pub evaluator: Arc<dyn Evaluator>,
    /// Position in evaluation order
    pub order: usize,
}

impl CompiledRule {
    /// Starts an anomaly stamped with this rule's id, priority and precedence.
    pub fn anomaly(
        &self,
        anomaly_type: AnomalyType,
        unit_id: impl Into<String>,
        descriptor: &LocationDescriptor,
    ) -> AnomalyBuilder {
        Anomaly::builder(anomaly_type, unit_id, descriptor.code.clone(), descriptor.category).rule(
            self.id.clone(),
            self.priority,
            self.precedence,
        )
    }

    /// Returns true if no evaluator handles this rule's type.
    pub fn is_noop(&self) -> bool {
        self.evaluator.is_noop()
    }
}

/// Compiled, ordered rules plus the warnings produced while compiling them.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    warnings: Vec<RunWarning>,
}

impl RuleSet {
    /// Compiles definitions in `(precedence, id)` order.
    ///
    /// Inactive rules are dropped. Duplicate ids, blank ids and invalid
    /// condition bags reject the rule with a warning. Unknown tags compile to
    /// the no-op evaluator with a warning.
    #[instrument(skip_all, fields(definitions = definitions.len()))]
    pub fn compile(definitions: &[RuleDefinition], registry: &EvaluatorRegistry) -> Self {
        let mut rules = Vec::new();
        let mut warnings = Vec::new();
        let mut seen_ids = HashSet::new();

        for definition in definitions {
            if !definition.active {
                debug!(rule.id = %definition.id, "Skipping inactive rule");
                continue;
            }
            let id = definition.id.trim();
            if id.is_empty() {
                warn!(rule.name = %definition.name, "Rejecting rule with a blank id");
                warnings.push(RunWarning::for_rule(
                    WarningKind::RuleRejected,
                    definition.name.clone(),
                    "rule id must not be blank",
                ));
                continue;
            }
            if !seen_ids.insert(id.to_string()) {
                warn!(rule.id = %id, "Rejecting duplicate rule id");
                warnings.push(RunWarning::for_rule(
                    WarningKind::RuleRejected,
                    id,
                    "duplicate rule id",
                ));
                continue;
            }

            let evaluator = registry.resolve(&definition.rule_type);
            if evaluator.is_noop() {
                warn!(rule.id = %id, rule.kind = %definition.rule_type, "No evaluator for rule type");
                warnings.push(RunWarning::for_rule(
                    WarningKind::UnknownRuleType,
                    id,
                    format!("no evaluator for rule type '{}'", definition.rule_type),
                ));
            }

            let conditions = match evaluator.parse_conditions(id, &definition.conditions) {
                Ok(conditions) => conditions,
                Err(e) => {
                    warn!(rule.id = %id, error = %e, "Rejecting rule with invalid conditions");
                    warnings.push(RunWarning::for_rule(
                        WarningKind::RuleRejected,
                        id,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            rules.push(CompiledRule {
                id: id.to_string(),
                name: definition.name.clone(),
                rule_type: definition.rule_type.clone(),
                category: definition.category,
                priority: definition.priority,
                precedence: definition.effective_precedence(),
                conditions,
                evaluator,
                order: 0,
            });
        }

        rules.sort_by(|a, b| a.precedence.cmp(&b.precedence).then_with(|| a.id.cmp(&b.id)));
        for (order, rule) in rules.iter_mut().enumerate() {
            rule.order = order;
        }

        info!(
            compiled = rules.len(),
            rejected = warnings
                .iter()
                .filter(|w| w.kind == WarningKind::RuleRejected)
                .count(),
            "Rules compiled"
        );
        Self { rules, warnings }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Warnings produced while compiling.
    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    /// Looks up a rule by id.
    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rule compiled.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(definitions: &[RuleDefinition]) -> RuleSet {
        RuleSet::compile(definitions, &EvaluatorRegistry::with_defaults())
    }

    #[test]
    fn test_default_rules_compile_in_precedence_order() {
        let rules = compile(&RuleDefinition::default_rules());
        assert_eq!(rules.len(), 8);
        assert!(rules.warnings().is_empty());

        let precedences: Vec<_> = rules.rules().iter().map(|r| r.precedence).collect();
        assert_eq!(precedences, vec![1, 1, 2, 2, 3, 3, 3, 4]);
        let first: Vec<_> = rules.rules()[..2].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(first, vec!["data-integrity", "invalid-location"]);
        assert!(rules.rules().iter().enumerate().all(|(i, r)| r.order == i));
    }

    #[test]
    fn test_invalid_conditions_reject_only_that_rule() {
        let definitions = vec![
            RuleDefinition::new(
                "bad",
                "Bad",
                AnomalyType::StagnantPallets,
                RuleCategory::FlowTime,
                Priority::Low,
            )
            .with_conditions(json!({"time_threshold_hours": "six"})),
            RuleDefinition::new(
                "good",
                "Good",
                AnomalyType::Overcapacity,
                RuleCategory::Space,
                Priority::High,
            ),
        ];
        let rules = compile(&definitions);
        assert_eq!(rules.len(), 1);
        assert!(rules.get("good").is_some());
        assert_eq!(rules.warnings().len(), 1);
        assert_eq!(rules.warnings()[0].kind, WarningKind::RuleRejected);
        assert_eq!(rules.warnings()[0].rule_id.as_deref(), Some("bad"));
    }

    #[test]
    fn test_unknown_type_gets_noop() {
        let mut definition = RuleDefinition::new(
            "x",
            "Mystery",
            AnomalyType::Overcapacity,
            RuleCategory::Space,
            Priority::Low,
        );
        definition.rule_type = "FORKLIFT_SPEEDING".into();

        let rules = compile(&[definition]);
        assert_eq!(rules.len(), 1);
        assert!(rules.rules()[0].is_noop());
        assert_eq!(rules.rules()[0].precedence, UNKNOWN_RULE_PRECEDENCE);
        assert_eq!(rules.warnings()[0].kind, WarningKind::UnknownRuleType);
    }

    #[test]
    fn test_inactive_and_duplicate_rules() {
        let base = RuleDefinition::new(
            "dup",
            "Dup",
            AnomalyType::InvalidLocation,
            RuleCategory::Space,
            Priority::High,
        );
        let definitions = vec![
            base.clone(),
            base.clone(),
            base.with_active(false).with_precedence(0),
        ];
        let rules = compile(&definitions);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.warnings().len(), 1);
        assert_eq!(rules.rules()[0].precedence, 1);
    }

    #[test]
    fn test_definitions_from_json() {
        let definitions = RuleDefinition::list_from_json(
            r#"[{
                "id": "r1",
                "name": "Receiving dwell",
                "rule_type": "STAGNANT_PALLETS",
                "category": "FLOW_TIME",
                "priority": "HIGH",
                "conditions": {"time_threshold_hours": 2}
            }]"#,
        )
        .unwrap();
        assert!(definitions[0].active);
        assert_eq!(definitions[0].effective_precedence(), 3);

        let rules = compile(&definitions);
        match &rules.rules()[0].conditions {
            RuleConditions::Stagnant(c) => assert_eq!(c.time_threshold_hours, 2.0),
            other => panic!("unexpected conditions {other:?}"),
        }
    }
}
