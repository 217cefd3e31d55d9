use serde_json::Value;
use tracing::trace;

use crate::core::{Anomaly, AnomalyType};
use crate::location::LocationDescriptor;
use crate::prelude::*;
use crate::rules::conditions::{parse_bag, OvercapacityConditions};
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags locations holding more distinct units than their capacity.
///
/// Produces one representative anomaly per location: the first unit seen
/// there is the primary unit and every distinct unit is listed as affected.
/// Invalid and zero-capacity locations never reach the count.
#[derive(Debug, Clone, Copy, Default)]
pub struct OvercapacityEvaluator;

impl OvercapacityEvaluator {
    fn passes_prevalidation(
        descriptor: &LocationDescriptor,
        conditions: &OvercapacityConditions,
    ) -> bool {
        if !descriptor.has_capacity() {
            return false;
        }
        if descriptor.is_special() && !conditions.check_special_areas {
            return false;
        }
        !conditions
            .invalid_code_patterns
            .iter()
            .any(|p| p.is_match(&descriptor.code))
    }
}

impl Evaluator for OvercapacityEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::Overcapacity)
    }

    fn name(&self) -> &str {
        "overcapacity"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_bag(rule_id, conditions).map(RuleConditions::Overcapacity)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::Overcapacity(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "overcapacity"));
        };

        let mut anomalies = Vec::new();
        for (code, group) in input.by_location() {
            let descriptor = group.descriptor;
            if !Self::passes_prevalidation(descriptor, conditions) {
                trace!(location.code = code, "Excluded from capacity check");
                continue;
            }

            let units = group.distinct_units();
            let capacity = descriptor.capacity as usize;
            if units.len() <= capacity {
                continue;
            }
            let excess = units.len() - capacity;
            let priority = if descriptor.is_special() {
                conditions
                    .special_area_priority
                    .unwrap_or_else(|| rule.priority.lowered())
            } else {
                rule.priority
            };
            let Some(representative) = units.first().cloned() else {
                continue;
            };

            anomalies.push(
                rule.anomaly(AnomalyType::Overcapacity, representative, descriptor)
                    .priority(priority)
                    .details(format!(
                        "{} location {code} holds {} pallets, capacity {capacity} ({excess} over)",
                        descriptor.category,
                        units.len()
                    ))
                    .attribute("capacity", capacity)
                    .attribute("occupancy", units.len())
                    .affected_units(units)
                    .excess(excess)
                    .build(),
            );
        }
        Ok(anomalies)
    }
}
