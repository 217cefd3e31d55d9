use serde_json::Value;

use crate::core::{Anomaly, AnomalyType};
use crate::location::{LocationDescriptor, ResolutionSource};
use crate::prelude::*;
use crate::rules::conditions::{parse_bag, MappingErrorConditions};
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags declared locations whose category contradicts their code.
///
/// A configured area named `RECV-05` but declared as storage, or a slot code
/// registered as a dock, is reported once per location with every unit
/// found there listed as affected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationMappingEvaluator;

fn is_checked(descriptor: &LocationDescriptor, conditions: &MappingErrorConditions) -> bool {
    match descriptor.source {
        ResolutionSource::Configuration => conditions.check_configuration,
        ResolutionSource::Registry => conditions.check_registry,
        _ => false,
    }
}

impl Evaluator for LocationMappingEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::LocationMappingError)
    }

    fn name(&self) -> &str {
        "location_mapping_error"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_bag(rule_id, conditions).map(RuleConditions::MappingError)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::MappingError(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "mapping_error"));
        };

        let mut anomalies = Vec::new();
        for (code, group) in input.by_location() {
            let descriptor = group.descriptor;
            if !is_checked(descriptor, conditions) {
                continue;
            }
            let Some(implied) = descriptor.implied_category else {
                continue;
            };
            if implied == descriptor.category {
                continue;
            }
            let units = group.distinct_units();
            let Some(representative) = units.first().cloned() else {
                continue;
            };

            anomalies.push(
                rule.anomaly(AnomalyType::LocationMappingError, representative, descriptor)
                    .details(format!(
                        "Location {code} is declared {} in the {} but its code reads as {implied}",
                        descriptor.category, descriptor.source
                    ))
                    .attribute("declared_category", descriptor.category)
                    .attribute("implied_category", implied)
                    .attribute("source", descriptor.source)
                    .affected_units(units)
                    .build(),
            );
        }
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{LocationCategory, NamedArea, WarehouseConfig};
    use crate::rules::evaluators::testing::{input_with, record, rule};
    use serde_json::json;

    fn config() -> WarehouseConfig {
        WarehouseConfig::new("WH01")
            .with_named_area(NamedArea::new("RECV-05", LocationCategory::Storage, 4))
            .with_named_area(NamedArea::new("1230A", LocationCategory::Receiving, 10))
            .with_named_area(NamedArea::new("RECV-01", LocationCategory::Receiving, 10))
            .with_named_area(NamedArea::new("FLOOR", LocationCategory::Staging, 10))
    }

    #[test]
    fn test_declared_category_contradicts_code() {
        let input = input_with(
            config(),
            vec![
                record("P-1", "RECV-05", 1),
                record("P-2", "recv-05", 1),
                record("P-3", "1230A", 1),
                record("P-4", "RECV-01", 1),
                record("P-5", "FLOOR", 1),
                record("P-6", "1231A", 1),
            ],
        );
        let rule = rule(LocationMappingEvaluator, "LOCATION_MAPPING_ERROR", Value::Null);
        let anomalies = LocationMappingEvaluator.evaluate(&rule, &input).unwrap();

        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].location, "1230A");
        assert_eq!(anomalies[0].attributes["implied_category"], "STORAGE");
        assert_eq!(anomalies[1].location, "RECV-05");
        assert_eq!(anomalies[1].unit_id, "P-1");
        assert_eq!(anomalies[1].affected_count, 2);
        assert_eq!(anomalies[1].attributes["declared_category"], "STORAGE");
    }

    #[test]
    fn test_configuration_check_can_be_disabled() {
        let input = input_with(config(), vec![record("P-1", "RECV-05", 1)]);
        let rule = rule(
            LocationMappingEvaluator,
            "LOCATION_MAPPING_ERROR",
            json!({"check_configuration": false}),
        );
        assert!(LocationMappingEvaluator.evaluate(&rule, &input).unwrap().is_empty());
    }
}
