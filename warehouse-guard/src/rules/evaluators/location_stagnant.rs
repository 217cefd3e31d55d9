use serde_json::Value;

use super::hours;
use crate::core::{Anomaly, AnomalyType};
use crate::prelude::*;
use crate::rules::conditions::parse_location_stagnant;
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Stagnation check scoped to codes matching a pattern, whatever their category.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationSpecificStagnantEvaluator;

impl Evaluator for LocationSpecificStagnantEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::LocationSpecificStagnant)
    }

    fn name(&self) -> &str {
        "location_specific_stagnant"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_location_stagnant(rule_id, conditions).map(RuleConditions::LocationStagnant)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::LocationStagnant(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "location_stagnant"));
        };

        let mut anomalies = Vec::new();
        for (record, descriptor) in input.located() {
            if descriptor.code.is_empty() || !conditions.location_pattern.is_match(&descriptor.code)
            {
                continue;
            }
            let Some(age) = input.age_hours(record) else {
                continue;
            };
            if age <= conditions.time_threshold_hours {
                continue;
            }
            anomalies.push(
                rule.anomaly(AnomalyType::LocationSpecificStagnant, &record.unit_id, descriptor)
                    .details(format!(
                        "Pallet {} has been at {} for {} (threshold {} for locations matching {})",
                        record.unit_id,
                        descriptor.code,
                        hours(age),
                        hours(conditions.time_threshold_hours),
                        conditions.location_pattern.as_str()
                    ))
                    .attribute("age_hours", format!("{age:.2}"))
                    .attribute("pattern", conditions.location_pattern.as_str())
                    .build(),
            );
        }
        Ok(anomalies)
    }
}
