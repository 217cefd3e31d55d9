//! Typed rule conditions.
//!
//! Condition bags arrive as free-form JSON on a [`RuleDefinition`]. Each rule
//! type parses its bag into a dedicated struct at load time; unknown keys and
//! out-of-range values reject the rule before any evaluation happens.
//!
//! [`RuleDefinition`]: super::RuleDefinition

use std::fmt;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Priority;
use crate::location::LocationCategory;
use crate::prelude::*;

/// A compiled regular expression that (de)serializes as its source string.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CodePattern(Regex);

impl CodePattern {
    /// Compiles a pattern.
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    /// Returns true if the pattern matches anywhere in the text.
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    /// Source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for CodePattern {
    type Error = regex::Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CodePattern> for String {
    fn from(pattern: CodePattern) -> Self {
        pattern.0.as_str().to_string()
    }
}

impl PartialEq for CodePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for CodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CodePattern").field(&self.as_str()).finish()
    }
}

fn check_positive(value: f64, name: &str) -> std::result::Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a positive number, got {value}"))
    }
}

fn check_non_empty<T>(values: &[T], name: &str) -> std::result::Result<(), String> {
    if values.is_empty() {
        Err(format!("{name} must not be empty"))
    } else {
        Ok(())
    }
}

/// Conditions for `STAGNANT_PALLETS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagnantConditions {
    pub time_threshold_hours: f64,
    pub location_types: Vec<LocationCategory>,
}

impl Default for StagnantConditions {
    fn default() -> Self {
        Self {
            time_threshold_hours: 6.0,
            location_types: vec![LocationCategory::Receiving],
        }
    }
}

impl StagnantConditions {
    fn validate(&self) -> std::result::Result<(), String> {
        check_positive(self.time_threshold_hours, "time_threshold_hours")?;
        check_non_empty(&self.location_types, "location_types")
    }
}

/// Conditions for `UNCOORDINATED_LOTS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UncoordinatedLotsConditions {
    /// Fraction of a lot's units in storage at which stragglers are flagged
    pub completion_threshold: f64,
    pub intake_location_types: Vec<LocationCategory>,
}

impl Default for UncoordinatedLotsConditions {
    fn default() -> Self {
        Self {
            completion_threshold: 0.8,
            intake_location_types: vec![LocationCategory::Receiving],
        }
    }
}

impl UncoordinatedLotsConditions {
    fn validate(&self) -> std::result::Result<(), String> {
        if !(self.completion_threshold > 0.0 && self.completion_threshold <= 1.0) {
            return Err(format!(
                "completion_threshold must be in (0, 1], got {}",
                self.completion_threshold
            ));
        }
        if self.intake_location_types.contains(&LocationCategory::Storage) {
            return Err("intake_location_types must not include STORAGE".to_string());
        }
        check_non_empty(&self.intake_location_types, "intake_location_types")
    }
}

/// Conditions for `OVERCAPACITY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OvercapacityConditions {
    pub check_special_areas: bool,
    /// Codes matching any of these are excluded before counting
    pub invalid_code_patterns: Vec<CodePattern>,
    /// Priority for special areas; one level below the rule's when unset
    pub special_area_priority: Option<Priority>,
}

impl Default for OvercapacityConditions {
    fn default() -> Self {
        Self {
            check_special_areas: true,
            invalid_code_patterns: Vec::new(),
            special_area_priority: None,
        }
    }
}

/// Conditions for `INVALID_LOCATION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvalidLocationConditions {
    pub include_blank_codes: bool,
}

impl Default for InvalidLocationConditions {
    fn default() -> Self {
        Self {
            include_blank_codes: true,
        }
    }
}

fn default_location_stagnant_hours() -> f64 {
    4.0
}

/// Conditions for `LOCATION_SPECIFIC_STAGNANT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationStagnantConditions {
    /// Matched against normalized location codes
    pub location_pattern: CodePattern,
    #[serde(default = "default_location_stagnant_hours")]
    pub time_threshold_hours: f64,
}

impl LocationStagnantConditions {
    fn validate(&self) -> std::result::Result<(), String> {
        check_positive(self.time_threshold_hours, "time_threshold_hours")
    }
}

/// Conditions for `TEMPERATURE_ZONE_MISMATCH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemperatureConditions {
    /// Matched against product descriptions
    pub product_pattern: CodePattern,
    /// Zones temperature-sensitive products must not sit in
    pub prohibited_zones: Vec<String>,
    pub grace_period_minutes: i64,
}

impl Default for TemperatureConditions {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        let product_pattern = CodePattern::new("(?i)frozen|refrigerated|chilled")
            .expect("Hard-coded regex pattern should be valid");
        Self {
            product_pattern,
            prohibited_zones: vec!["AMBIENT".to_string(), "GENERAL".to_string()],
            grace_period_minutes: 30,
        }
    }
}

impl TemperatureConditions {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.grace_period_minutes < 0 {
            return Err(format!(
                "grace_period_minutes must not be negative, got {}",
                self.grace_period_minutes
            ));
        }
        check_non_empty(&self.prohibited_zones, "prohibited_zones")
    }

    /// Returns true if the zone is prohibited (case-insensitive).
    pub fn is_prohibited(&self, zone: &str) -> bool {
        self.prohibited_zones
            .iter()
            .any(|z| z.trim().eq_ignore_ascii_case(zone.trim()))
    }
}

/// Conditions for `DATA_INTEGRITY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataIntegrityConditions {
    pub check_duplicate_scans: bool,
    pub check_impossible_locations: bool,
    pub max_code_length: usize,
    /// Codes that stand in for "no location" (case-insensitive)
    pub placeholder_codes: Vec<String>,
}

impl Default for DataIntegrityConditions {
    fn default() -> Self {
        Self {
            check_duplicate_scans: true,
            check_impossible_locations: true,
            max_code_length: 20,
            placeholder_codes: ["NULL", "N/A", "NA", "NONE", "UNKNOWN", "TBD", "TEMP", "XXX", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl DataIntegrityConditions {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.max_code_length == 0 {
            return Err("max_code_length must be at least 1".to_string());
        }
        if !self.check_duplicate_scans && !self.check_impossible_locations {
            return Err("at least one check must be enabled".to_string());
        }
        Ok(())
    }

    /// Returns true if the code is a known placeholder.
    pub fn is_placeholder(&self, code: &str) -> bool {
        self.placeholder_codes
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(code.trim()))
    }
}

/// Conditions for `LOCATION_MAPPING_ERROR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingErrorConditions {
    /// Check areas declared in the warehouse configuration
    pub check_configuration: bool,
    /// Check manually registered locations
    pub check_registry: bool,
}

impl Default for MappingErrorConditions {
    fn default() -> Self {
        Self {
            check_configuration: true,
            check_registry: true,
        }
    }
}

/// Parsed conditions of a compiled rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleConditions {
    Stagnant(StagnantConditions),
    UncoordinatedLots(UncoordinatedLotsConditions),
    Overcapacity(OvercapacityConditions),
    InvalidLocation(InvalidLocationConditions),
    LocationStagnant(LocationStagnantConditions),
    Temperature(TemperatureConditions),
    DataIntegrity(DataIntegrityConditions),
    MappingError(MappingErrorConditions),
    /// Conditions of a rule no evaluator understands, kept verbatim
    Unchecked(Value),
}

impl RuleConditions {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stagnant(_) => "stagnant",
            Self::UncoordinatedLots(_) => "uncoordinated_lots",
            Self::Overcapacity(_) => "overcapacity",
            Self::InvalidLocation(_) => "invalid_location",
            Self::LocationStagnant(_) => "location_stagnant",
            Self::Temperature(_) => "temperature",
            Self::DataIntegrity(_) => "data_integrity",
            Self::MappingError(_) => "mapping_error",
            Self::Unchecked(_) => "unchecked",
        }
    }
}

/// Deserializes a condition bag; `null` is treated as an empty object.
pub(crate) fn parse_bag<T: DeserializeOwned>(rule_id: &str, conditions: &Value) -> Result<T> {
    let bag = if conditions.is_null() {
        Value::Object(Default::default())
    } else {
        conditions.clone()
    };
    serde_json::from_value(bag).map_err(|e| WarehouseError::invalid_rule(rule_id, e.to_string()))
}

pub(crate) fn validated<T>(
    rule_id: &str,
    conditions: T,
    validate: impl FnOnce(&T) -> std::result::Result<(), String>,
) -> Result<T> {
    validate(&conditions).map_err(|message| WarehouseError::invalid_rule(rule_id, message))?;
    Ok(conditions)
}

pub(crate) fn parse_stagnant(rule_id: &str, bag: &Value) -> Result<StagnantConditions> {
    validated(rule_id, parse_bag(rule_id, bag)?, StagnantConditions::validate)
}

pub(crate) fn parse_uncoordinated_lots(
    rule_id: &str,
    bag: &Value,
) -> Result<UncoordinatedLotsConditions> {
    validated(rule_id, parse_bag(rule_id, bag)?, UncoordinatedLotsConditions::validate)
}

pub(crate) fn parse_location_stagnant(
    rule_id: &str,
    bag: &Value,
) -> Result<LocationStagnantConditions> {
    validated(rule_id, parse_bag(rule_id, bag)?, LocationStagnantConditions::validate)
}

pub(crate) fn parse_temperature(rule_id: &str, bag: &Value) -> Result<TemperatureConditions> {
    validated(rule_id, parse_bag(rule_id, bag)?, TemperatureConditions::validate)
}

pub(crate) fn parse_data_integrity(rule_id: &str, bag: &Value) -> Result<DataIntegrityConditions> {
    validated(rule_id, parse_bag(rule_id, bag)?, DataIntegrityConditions::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_null_and_empty() {
        let from_null = parse_stagnant("R", &Value::Null).unwrap();
        let from_empty = parse_stagnant("R", &json!({})).unwrap();
        assert_eq!(from_null, StagnantConditions::default());
        assert_eq!(from_empty.time_threshold_hours, 6.0);
        assert_eq!(from_empty.location_types, vec![LocationCategory::Receiving]);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = parse_stagnant("R-1", &json!({"time_threshold_hour": 3})).unwrap_err();
        assert!(matches!(err, WarehouseError::InvalidRule { ref rule_id, .. } if rule_id == "R-1"));
        assert!(err.to_string().contains("time_threshold_hour"));
    }

    #[test]
    fn test_range_validation() {
        assert!(parse_stagnant("R", &json!({"time_threshold_hours": -1})).is_err());
        assert!(parse_uncoordinated_lots("R", &json!({"completion_threshold": 1.5})).is_err());
        assert!(
            parse_uncoordinated_lots("R", &json!({"intake_location_types": ["STORAGE"]})).is_err()
        );
        assert!(parse_temperature("R", &json!({"grace_period_minutes": -5})).is_err());
        assert!(parse_data_integrity(
            "R",
            &json!({"check_duplicate_scans": false, "check_impossible_locations": false})
        )
        .is_err());
    }

    #[test]
    fn test_location_pattern_required_and_compiled() {
        assert!(parse_location_stagnant("R", &json!({})).is_err());
        assert!(parse_location_stagnant("R", &json!({"location_pattern": "(["})).is_err());

        let conditions = parse_location_stagnant("R", &json!({"location_pattern": "^AISLE"})).unwrap();
        assert!(conditions.location_pattern.is_match("AISLE-04"));
        assert_eq!(conditions.time_threshold_hours, 4.0);
    }

    #[test]
    fn test_overcapacity_conditions() {
        let conditions: OvercapacityConditions = parse_bag(
            "R",
            &json!({"invalid_code_patterns": ["^TMP"], "special_area_priority": "LOW"}),
        )
        .unwrap();
        assert!(conditions.invalid_code_patterns[0].is_match("TMP-1"));
        assert_eq!(conditions.special_area_priority, Some(Priority::Low));
        assert!(conditions.check_special_areas);
    }

    #[test]
    fn test_temperature_defaults() {
        let conditions = TemperatureConditions::default();
        assert!(conditions.product_pattern.is_match("Frozen peas"));
        assert!(conditions.product_pattern.is_match("CHILLED dairy"));
        assert!(!conditions.product_pattern.is_match("Canned beans"));
        assert!(conditions.is_prohibited("ambient"));
        assert!(!conditions.is_prohibited("FREEZER"));
    }

    #[test]
    fn test_placeholders() {
        let conditions = DataIntegrityConditions::default();
        assert!(conditions.is_placeholder("n/a"));
        assert!(conditions.is_placeholder(" NULL "));
        assert!(!conditions.is_placeholder("1230A"));
    }
}
