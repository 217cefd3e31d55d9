use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::core::{Anomaly, AnomalyType, NormalizedRecord};
use crate::location::LocationDescriptor;
use crate::prelude::*;
use crate::rules::conditions::{parse_data_integrity, DataIntegrityConditions};
use crate::rules::evaluator::conditions_mismatch;
use crate::rules::{CompiledRule, EvaluationInput, Evaluator, RuleConditions};

/// Flags scanner and data-entry errors.
///
/// - duplicate scans: one unit id recorded at more than one location
/// - impossible codes: placeholders, over-length codes, illegal characters
#[derive(Debug, Clone, Copy, Default)]
pub struct DataIntegrityEvaluator;

fn is_legal_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ' ')
}

/// Reason a non-blank code cannot physically exist.
fn impossible_reason(code: &str, conditions: &DataIntegrityConditions) -> Option<String> {
    if code.is_empty() {
        return None;
    }
    if conditions.is_placeholder(code) {
        return Some(format!("placeholder code '{code}'"));
    }
    let length = code.chars().count();
    if length > conditions.max_code_length {
        return Some(format!(
            "code is {length} characters long, maximum is {}",
            conditions.max_code_length
        ));
    }
    code.chars()
        .find(|c| !is_legal_code_char(*c))
        .map(|c| format!("illegal character '{c}'"))
}

impl DataIntegrityEvaluator {
    fn duplicate_scans(rule: &CompiledRule, input: &EvaluationInput) -> Vec<Anomaly> {
        let mut by_unit: BTreeMap<&str, Vec<(&NormalizedRecord, &LocationDescriptor)>> =
            BTreeMap::new();
        for (record, descriptor) in input.located() {
            by_unit.entry(record.unit_id.as_str()).or_default().push((record, descriptor));
        }

        let mut anomalies = Vec::new();
        for (unit, scans) in by_unit {
            let mut locations: Vec<&str> = Vec::new();
            for (_, descriptor) in &scans {
                if !locations.contains(&descriptor.code.as_str()) {
                    locations.push(descriptor.code.as_str());
                }
            }
            if locations.len() < 2 {
                continue;
            }
            let Some((_, first)) = scans.first() else {
                continue;
            };
            let rows: Vec<String> = scans.iter().map(|(r, _)| r.row_index.to_string()).collect();
            anomalies.push(
                rule.anomaly(AnomalyType::DataIntegrity, unit, first)
                    .details(format!(
                        "Pallet {unit} was scanned at {} different locations: {}",
                        locations.len(),
                        locations.join(", ")
                    ))
                    .attribute("issue", "duplicate_scan")
                    .attribute("locations", locations.join(","))
                    .attribute("rows", rows.join(","))
                    .build(),
            );
        }
        anomalies
    }

    fn impossible_codes(
        rule: &CompiledRule,
        input: &EvaluationInput,
        conditions: &DataIntegrityConditions,
    ) -> Vec<Anomaly> {
        // the same code always gets the same verdict
        let mut verdicts: HashMap<&str, Option<String>> = HashMap::new();
        let mut anomalies = Vec::new();
        for (record, descriptor) in input.located() {
            let verdict = verdicts
                .entry(descriptor.code.as_str())
                .or_insert_with(|| impossible_reason(&descriptor.code, conditions));
            let Some(reason) = verdict else {
                continue;
            };
            anomalies.push(
                rule.anomaly(AnomalyType::DataIntegrity, &record.unit_id, descriptor)
                    .details(format!(
                        "Pallet {} has an impossible location code: {reason}",
                        record.unit_id
                    ))
                    .attribute("issue", "impossible_location")
                    .attribute("reason", reason.as_str())
                    .build(),
            );
        }
        anomalies
    }
}

impl Evaluator for DataIntegrityEvaluator {
    fn anomaly_type(&self) -> Option<AnomalyType> {
        Some(AnomalyType::DataIntegrity)
    }

    fn name(&self) -> &str {
        "data_integrity"
    }

    fn parse_conditions(&self, rule_id: &str, conditions: &Value) -> Result<RuleConditions> {
        parse_data_integrity(rule_id, conditions).map(RuleConditions::DataIntegrity)
    }

    fn evaluate(&self, rule: &CompiledRule, input: &EvaluationInput) -> Result<Vec<Anomaly>> {
        let RuleConditions::DataIntegrity(conditions) = &rule.conditions else {
            return Err(conditions_mismatch(rule, "data_integrity"));
        };

        let mut anomalies = Vec::new();
        if conditions.check_duplicate_scans {
            anomalies.extend(Self::duplicate_scans(rule, input));
        }
        if conditions.check_impossible_locations {
            anomalies.extend(Self::impossible_codes(rule, input, conditions));
        }
        Ok(anomalies)
    }
}
