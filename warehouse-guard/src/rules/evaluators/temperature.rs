use serde_json::Value;

use crate::core::{Anomaly, AnomalyType};
use crate::prelude::*;
use crate::rules::conditions::parse_temperature;
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags temperature-sensitive products sitting in prohibited zones.
///
/// A unit is flagged once it has been in the zone longer than the grace
/// period. Units without a creation timestamp are always flagged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureZoneEvaluator;

impl Evaluator for TemperatureZoneEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::TemperatureZoneMismatch)
    }

    fn name(&self) -> &str {
        "temperature_zone_mismatch"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_temperature(rule_id, conditions).map(RuleConditions::Temperature)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::Temperature(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "temperature"));
        };

        let mut anomalies = Vec::new();
        for (record, descriptor) in input.located() {
            let Some(description) = record.description.as_deref() else {
                continue;
            };
            let Some(zone) = descriptor.zone.as_deref() else {
                continue;
            };
            if !conditions.is_prohibited(zone) || !conditions.product_pattern.is_match(description)
            {
                continue;
            }
            let minutes = record
                .age_at(input.reference_time)
                .map(|age| age.num_minutes());
            if matches!(minutes, Some(m) if m <= conditions.grace_period_minutes) {
                continue;
            }

            let mut builder = rule
                .anomaly(AnomalyType::TemperatureZoneMismatch, &record.unit_id, descriptor)
                .details(format!(
                    "'{description}' (pallet {}) is stored in {zone} zone at {}",
                    record.unit_id, descriptor.code
                ))
                .attribute("zone", zone)
                .attribute("product", description);
            if let Some(minutes) = minutes {
                builder = builder.attribute("minutes_in_zone", minutes);
            }
            anomalies.push(builder.build());
        }
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{LocationCategory, NamedArea, WarehouseConfig};
    use crate::rules::evaluators::testing::{input, input_with, record, rule};
    use serde_json::json;

    #[test]
    fn test_frozen_goods_in_general_storage() {
        let input = input(vec![
            record("P-1", "1230A", 2).with_description("FROZEN peas 24x500g"),
            record("P-2", "1231A", 2).with_description("Canned beans"),
            record("P-3", "1232A", 0).with_description("Chilled yoghurt"),
        ]);
        let rule = rule(TemperatureZoneEvaluator, "TEMPERATURE_ZONE_MISMATCH", Value::Null);
        let anomalies = TemperatureZoneEvaluator.evaluate(&rule, &input).unwrap();

        // P-3 was created at the reference time and is still within grace
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].unit_id, "P-1");
        assert_eq!(anomalies[0].attributes["zone"], "GENERAL");
        assert_eq!(anomalies[0].attributes["minutes_in_zone"], "120");
    }

    #[test]
    fn test_allowed_zone_is_quiet() {
        let config = WarehouseConfig::new("WH01").with_named_area(
            NamedArea::new("FRZ-01", LocationCategory::Storage, 10).with_zone("FREEZER"),
        );
        let input = input_with(
            config,
            vec![record("P-1", "FRZ-01", 10).with_description("Frozen fish")],
        );
        let rule = rule(TemperatureZoneEvaluator, "TEMPERATURE_ZONE_MISMATCH", Value::Null);
        assert!(TemperatureZoneEvaluator.evaluate(&rule, &input).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_age_is_flagged() {
        let mut unit = record("P-1", "AISLE-2", 0).with_description("refrigerated milk");
        unit.created_at = None;
        let input = input(vec![unit]);
        let rule = rule(
            TemperatureZoneEvaluator,
            "TEMPERATURE_ZONE_MISMATCH",
            json!({"prohibited_zones": ["ambient"]}),
        );
        let anomalies = TemperatureZoneEvaluator.evaluate(&rule, &input).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert!(!anomalies[0].attributes.contains_key("minutes_in_zone"));
    }
}
