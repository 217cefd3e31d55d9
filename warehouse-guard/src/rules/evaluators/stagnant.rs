use serde_json::Value;

use super::hours;
use crate::core::{Anomaly, AnomalyType};
use crate::prelude::*;
use crate::rules::conditions::parse_stagnant;
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags units that have sat in an intake area longer than the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagnantPalletsEvaluator;

impl Evaluator for StagnantPalletsEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::StagnantPallets)
    }

    fn name(&self) -> &str {
        "stagnant_pallets"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_stagnant(rule_id, conditions).map(RuleConditions::Stagnant)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::Stagnant(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "stagnant"));
        };

        let mut anomalies = Vec::new();
        for (record, descriptor) in input.located() {
            if !conditions.location_types.contains(&descriptor.category) {
                continue;
            }
            let Some(age) = input.age_hours(record) else {
                continue;
            };
            if age <= conditions.time_threshold_hours {
                continue;
            }
            anomalies.push(
                rule.anomaly(AnomalyType::StagnantPallets, &record.unit_id, descriptor)
                    .details(format!(
                        "Pallet {} has been in {} location {} for {} (threshold {})",
                        record.unit_id,
                        descriptor.category,
                        descriptor.code,
                        hours(age),
                        hours(conditions.time_threshold_hours)
                    ))
                    .attribute("age_hours", format!("{age:.2}"))
                    .attribute("threshold_hours", conditions.time_threshold_hours)
                    .build(),
            );
        }
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::evaluators::testing::{input, record, rule};
    use serde_json::json;

    #[test]
    fn test_flags_only_old_units_in_receiving() {
        let input = input(vec![
            record("P-1", "RECV-01", 7),
            record("P-2", "RECV-01", 5),
            record("P-3", "1230A", 30),
            record("P-4", "STAGE-1", 30),
        ]);
        let rule = rule(StagnantPalletsEvaluator, "STAGNANT_PALLETS", Value::Null);
        let anomalies = StagnantPalletsEvaluator.evaluate(&rule, &input).unwrap();

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].unit_id, "P-1");
        assert_eq!(anomalies[0].location, "RECV-01");
        assert_eq!(anomalies[0].attributes["age_hours"], "7.00");
    }

    #[test]
    fn test_custom_threshold_and_categories() {
        let input = input(vec![record("P-1", "STAGE-1", 3), record("P-2", "RECV-01", 3)]);
        let rule = rule(
            StagnantPalletsEvaluator,
            "STAGNANT_PALLETS",
            json!({"time_threshold_hours": 2, "location_types": ["STAGING"]}),
        );
        let anomalies = StagnantPalletsEvaluator.evaluate(&rule, &input).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].unit_id, "P-1");
    }

    #[test]
    fn test_missing_timestamp_is_not_stagnant() {
        let mut stale = record("P-1", "RECV-01", 0);
        stale.created_at = None;
        let input = input(vec![stale]);
        let rule = rule(StagnantPalletsEvaluator, "STAGNANT_PALLETS", Value::Null);
        assert!(StagnantPalletsEvaluator.evaluate(&rule, &input).unwrap().is_empty());
    }
}
