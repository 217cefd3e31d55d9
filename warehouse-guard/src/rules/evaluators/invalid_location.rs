use serde_json::Value;

use crate::core::{Anomaly, AnomalyType};
use crate::location::ParseFailure;
use crate::prelude::*;
use crate::rules::conditions::parse_bag;
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags every record whose location code does not resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidLocationEvaluator;

impl Evaluator for InvalidLocationEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::InvalidLocation)
    }

    fn name(&self) -> &str {
        "invalid_location"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_bag(rule_id, conditions).map(RuleConditions::InvalidLocation)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::InvalidLocation(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "invalid_location"));
        };

        let anomalies = input
            .located()
            .filter(|(_, d)| d.is_invalid())
            .filter_map(|(record, descriptor)| {
                let failure = descriptor
                    .failure
                    .clone()
                    .unwrap_or(ParseFailure::Unrecognized);
                if failure == ParseFailure::Blank && !conditions.include_blank_codes {
                    return None;
                }
                let shown = if descriptor.code.is_empty() {
                    "(blank)"
                } else {
                    descriptor.code.as_str()
                };
                Some(
                    rule.anomaly(AnomalyType::InvalidLocation, &record.unit_id, descriptor)
                        .details(format!(
                            "Pallet {} is at unresolvable location {shown}: {failure}",
                            record.unit_id
                        ))
                        .attribute("reason", &failure)
                        .attribute("raw_code", &record.location)
                        .build(),
                )
            })
            .collect();
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::evaluators::testing::{input, record, rule};
    use serde_json::json;

    #[test]
    fn test_one_anomaly_per_invalid_record() {
        let input = input(vec![
            record("P-1", "1230A", 1),
            record("P-2", "??", 1),
            record("P-3", "??", 1),
            record("P-4", "15Z", 1),
            record("P-5", "  ", 1),
        ]);
        let rule = rule(InvalidLocationEvaluator, "INVALID_LOCATION", Value::Null);
        let anomalies = InvalidLocationEvaluator.evaluate(&rule, &input).unwrap();

        let units: Vec<_> = anomalies.iter().map(|a| a.unit_id.as_str()).collect();
        assert_eq!(units, vec!["P-2", "P-3", "P-4", "P-5"]);
        assert!(anomalies[2].details.contains("level 'Z'"));
        assert!(anomalies[3].details.contains("(blank)"));
    }

    #[test]
    fn test_blank_codes_can_be_excluded() {
        let input = input(vec![record("P-1", "", 1), record("P-2", "XYZ", 1)]);
        let rule = rule(
            InvalidLocationEvaluator,
            "INVALID_LOCATION",
            json!({"include_blank_codes": false}),
        );
        let anomalies = InvalidLocationEvaluator.evaluate(&rule, &input).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].unit_id, "P-2");
    }
}
