use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::core::{Anomaly, AnomalyType, NormalizedRecord};
use crate::location::{LocationCategory, LocationDescriptor};
use crate::prelude::*;
use crate::rules::conditions::parse_uncoordinated_lots;
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags units left in intake after most of their lot has moved on.
///
/// A unit has moved once any of its records sits outside the intake
/// categories. Records at unresolved codes are neither moved nor in intake,
/// but the unit still counts toward the lot size.
#[derive(Debug, Clone, Copy, Default)]
pub struct UncoordinatedLotsEvaluator;

#[derive(Default)]
struct UnitState<'a> {
    moved: bool,
    intake: Option<(&'a NormalizedRecord, &'a LocationDescriptor)>,
}

impl Evaluator for UncoordinatedLotsEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::UncoordinatedLots)
    }

    fn name(&self) -> &str {
        "uncoordinated_lots"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_uncoordinated_lots(rule_id, conditions).map(RuleConditions::UncoordinatedLots)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::UncoordinatedLots(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "uncoordinated_lots"));
        };

        // lot -> unit -> state, units kept in first-seen order
        let mut lots: BTreeMap<&str, (Vec<&str>, HashMap<&str, UnitState<'_>>)> = BTreeMap::new();
        for (record, descriptor) in input.located() {
            let Some(lot) = record.lot_id.as_deref() else {
                continue;
            };
            let (order, units) = lots.entry(lot).or_default();
            let state = units.entry(record.unit_id.as_str()).or_insert_with(|| {
                order.push(record.unit_id.as_str());
                UnitState::default()
            });
            if descriptor.category == LocationCategory::Invalid {
                continue;
            }
            if !conditions.intake_location_types.contains(&descriptor.category) {
                state.moved = true;
            } else if state.intake.is_none() {
                state.intake = Some((record, descriptor));
            }
        }

        let mut anomalies = Vec::new();
        for (lot, (order, units)) in &lots {
            let total = order.len();
            let moved = units.values().filter(|u| u.moved).count();
            let completion = moved as f64 / total as f64;
            // a lot exactly at the threshold is complete enough to flag
            if completion < conditions.completion_threshold {
                continue;
            }

            for unit in order {
                let Some(state) = units.get(unit) else {
                    continue;
                };
                if state.moved {
                    continue;
                }
                let Some((record, descriptor)) = state.intake else {
                    continue;
                };
                anomalies.push(
                    rule.anomaly(AnomalyType::UncoordinatedLots, &record.unit_id, descriptor)
                        .details(format!(
                            "Pallet {} is still in {} while {moved} of {total} pallets of lot {lot} have moved on",
                            record.unit_id, descriptor.code
                        ))
                        .attribute("lot_id", lot)
                        .attribute("completion", format!("{completion:.2}"))
                        .attribute("lot_size", total)
                        .build(),
                );
            }
        }
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::evaluators::testing::{input, record, rule};
    use serde_json::json;

    fn lot(prefix: &str, lot_id: &str, stored: usize, receiving: usize) -> Vec<NormalizedRecord> {
        (0..stored)
            .map(|i| record(&format!("{prefix}-{i}"), &format!("{}A", i + 1), 2))
            .chain((0..receiving).map(|i| record(&format!("{prefix}-R{i}"), "RECV-01", 2)))
            .map(|r| r.with_lot(lot_id))
            .collect()
    }

    #[test]
    fn test_stragglers_at_threshold() {
        let input = input(lot("P", "L-1", 8, 2));
        let rule = rule(UncoordinatedLotsEvaluator, "UNCOORDINATED_LOTS", Value::Null);
        let anomalies = UncoordinatedLotsEvaluator.evaluate(&rule, &input).unwrap();

        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].unit_id, "P-R0");
        assert_eq!(anomalies[1].unit_id, "P-R1");
        assert_eq!(anomalies[0].attributes["completion"], "0.80");
    }

    #[test]
    fn test_below_threshold_is_quiet() {
        let input = input(lot("P", "L-1", 7, 3));
        let rule = rule(UncoordinatedLotsEvaluator, "UNCOORDINATED_LOTS", Value::Null);
        assert!(UncoordinatedLotsEvaluator.evaluate(&rule, &input).unwrap().is_empty());

        let lenient = rule_with_threshold(0.7);
        assert_eq!(UncoordinatedLotsEvaluator.evaluate(&lenient, &input).unwrap().len(), 3);
    }

    #[test]
    fn test_units_without_lot_are_ignored() {
        let mut records = lot("P", "L-1", 9, 0);
        records.push(record("LOOSE", "RECV-01", 2));
        let input = input(records);
        let rule = rule(UncoordinatedLotsEvaluator, "UNCOORDINATED_LOTS", Value::Null);
        assert!(UncoordinatedLotsEvaluator.evaluate(&rule, &input).unwrap().is_empty());
    }

    #[test]
    fn test_units_stored_elsewhere_are_not_stragglers() {
        let mut records = lot("P", "L-1", 8, 2);
        // P-R0 was also scanned into storage
        records.push(record("P-R0", "99A", 1).with_lot("L-1"));
        let input = input(records);
        let rule = rule(UncoordinatedLotsEvaluator, "UNCOORDINATED_LOTS", Value::Null);
        let anomalies = UncoordinatedLotsEvaluator.evaluate(&rule, &input).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].unit_id, "P-R1");
    }

    fn rule_with_threshold(threshold: f64) -> CompiledRule {
        rule(
            UncoordinatedLotsEvaluator,
            "UNCOORDINATED_LOTS",
            json!({"completion_threshold": threshold}),
        )
    }

    #[test]
    fn test_staged_units_count_as_moved() {
        let records: Vec<NormalizedRecord> = (0..8)
            .map(|i| record(&format!("P-{i}"), &format!("STAGE-{i}"), 2))
            .chain((0..2).map(|i| record(&format!("P-R{i}"), "RECV-01", 2)))
            .map(|r| r.with_lot("L-1"))
            .collect();
        let input = input(records);
        let rule = rule(UncoordinatedLotsEvaluator, "UNCOORDINATED_LOTS", Value::Null);
        let anomalies = UncoordinatedLotsEvaluator.evaluate(&rule, &input).unwrap();

        let units: Vec<_> = anomalies.iter().map(|a| a.unit_id.as_str()).collect();
        assert_eq!(units, vec!["P-R0", "P-R1"]);
        assert!(anomalies.iter().all(|a| a.location == "RECV-01"));
    }

    #[test]
    fn test_invalid_codes_stay_in_lot_size() {
        let mut records = lot("P", "L-1", 7, 2);
        records.push(record("P-LOST", "??", 2).with_lot("L-1"));
        let input = input(records);
        // 7 of 10 moved; 7 of 9 would pass
        let strict = rule_with_threshold(0.75);
        assert!(UncoordinatedLotsEvaluator.evaluate(&strict, &input).unwrap().is_empty());

        let lenient = rule_with_threshold(0.7);
        let anomalies = UncoordinatedLotsEvaluator.evaluate(&lenient, &input).unwrap();
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies.iter().all(|a| a.unit_id != "P-LOST"));
    }

    #[test]
    fn test_completion_exactly_at_threshold_flags() {
        let input = input(lot("P", "L-1", 4, 1));
        let rule = rule(UncoordinatedLotsEvaluator, "UNCOORDINATED_LOTS", Value::Null);
        let anomalies = UncoordinatedLotsEvaluator.evaluate(&rule, &input).unwrap();

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].unit_id, "P-R0");
        assert_eq!(anomalies[0].attributes["completion"], "0.80");
        assert_eq!(anomalies[0].attributes["lot_size"], "5");
    }
}
