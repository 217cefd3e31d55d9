use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::LocationCategory;

/// Kind of anomaly, one per evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    /// Unit sitting in an intake area for too long
    StagnantPallets,
    /// Lot mostly put away with stragglers left in intake
    UncoordinatedLots,
    /// More units in a location than it holds
    Overcapacity,
    /// Location code that does not resolve
    InvalidLocation,
    /// Stagnation scoped to a location pattern
    LocationSpecificStagnant,
    /// Temperature-sensitive product in a prohibited zone
    TemperatureZoneMismatch,
    /// Duplicate scans or physically impossible codes
    DataIntegrity,
    /// Declared location category disagrees with the code pattern
    LocationMappingError,
}

impl AnomalyType {
    /// All anomaly types in tag order.
    pub const ALL: [AnomalyType; 8] = [
        Self::StagnantPallets,
        Self::UncoordinatedLots,
        Self::Overcapacity,
        Self::InvalidLocation,
        Self::LocationSpecificStagnant,
        Self::TemperatureZoneMismatch,
        Self::DataIntegrity,
        Self::LocationMappingError,
    ];

    /// Rule-definition tag for this type.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::StagnantPallets => "STAGNANT_PALLETS",
            Self::UncoordinatedLots => "UNCOORDINATED_LOTS",
            Self::Overcapacity => "OVERCAPACITY",
            Self::InvalidLocation => "INVALID_LOCATION",
            Self::LocationSpecificStagnant => "LOCATION_SPECIFIC_STAGNANT",
            Self::TemperatureZoneMismatch => "TEMPERATURE_ZONE_MISMATCH",
            Self::DataIntegrity => "DATA_INTEGRITY",
            Self::LocationMappingError => "LOCATION_MAPPING_ERROR",
        }
    }

    /// Parses a rule-definition tag, ignoring case and surrounding whitespace.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Priority label of a rule and its anomalies. Ordered most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl Priority {
    /// One level less urgent, saturating at `Low`.
    pub fn lowered(self) -> Self {
        match self {
            Self::VeryHigh => Self::High,
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }

    /// Wire name of the priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "VERY_HIGH",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCategory {
    /// Flow and time rules (stagnation, lot coordination)
    FlowTime,
    /// Space rules (capacity, location validity)
    Space,
    /// Product rules (temperature compatibility)
    Product,
}

/// A detected anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Kind of anomaly
    pub anomaly_type: AnomalyType,
    /// Priority
    pub priority: Priority,
    /// Primary unit; the representative unit for location-level anomalies
    pub unit_id: String,
    /// Every unit involved
    pub affected_units: Vec<String>,
    /// Number of units involved
    pub affected_count: usize,
    /// Units above capacity (overcapacity only)
    pub excess_count: Option<usize>,
    /// Rule that produced the anomaly
    pub rule_id: String,
    /// Precedence level of that rule; lower wins deduplication
    pub precedence: u32,
    /// Human-readable explanation
    pub details: String,
    /// Normalized location code
    pub location: String,
    /// Resolved location category
    pub location_category: LocationCategory,
    /// Evaluator-specific evidence
    pub attributes: BTreeMap<String, String>,
}

impl Anomaly {
    /// Starts building an anomaly for a single unit.
    pub fn builder(
        anomaly_type: AnomalyType,
        unit_id: impl Into<String>,
        location: impl Into<String>,
        location_category: LocationCategory,
    ) -> AnomalyBuilder {
        let unit_id = unit_id.into();
        AnomalyBuilder {
            anomaly: Anomaly {
                anomaly_type,
                priority: Priority::Medium,
                affected_units: vec![unit_id.clone()],
                affected_count: 1,
                unit_id,
                excess_count: None,
                rule_id: String::new(),
                precedence: 0,
                details: String::new(),
                location: location.into(),
                location_category,
                attributes: BTreeMap::new(),
            },
        }
    }

    /// Every unit this anomaly reports on: the primary unit first, then the
    /// affected units in order, without repeats.
    pub fn claimed_units(&self) -> Vec<&str> {
        let mut units: Vec<&str> = Vec::with_capacity(self.affected_units.len() + 1);
        for unit in std::iter::once(&self.unit_id).chain(self.affected_units.iter()) {
            if !units.contains(&unit.as_str()) {
                units.push(unit);
            }
        }
        units
    }

    /// Restricts the anomaly to `remaining`, which must be a non-empty subset
    /// of its claimed units. The primary unit moves to the first remaining
    /// unit when it was removed.
    pub(crate) fn narrow(&mut self, remaining: Vec<String>) {
        let removed = self.claimed_units().len().saturating_sub(remaining.len());
        if !remaining.contains(&self.unit_id) {
            if let Some(first) = remaining.first() {
                self.unit_id = first.clone();
            }
        }
        self.affected_count = remaining.len();
        self.affected_units = remaining;
        self.attributes
            .insert("units_reported_elsewhere".to_string(), removed.to_string());
    }
}

/// Builder for [`Anomaly`].
#[derive(Debug, Clone)]
pub struct AnomalyBuilder {
    anomaly: Anomaly,
}

impl AnomalyBuilder {
    /// Sets the producing rule, its priority and precedence.
    pub fn rule(mut self, rule_id: impl Into<String>, priority: Priority, precedence: u32) -> Self {
        self.anomaly.rule_id = rule_id.into();
        self.anomaly.priority = priority;
        self.anomaly.precedence = precedence;
        self
    }

    /// Overrides the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.anomaly.priority = priority;
        self
    }

    /// Sets all affected units; the count follows the list.
    pub fn affected_units(mut self, units: Vec<String>) -> Self {
        self.anomaly.affected_count = units.len();
        self.anomaly.affected_units = units;
        self
    }

    /// Sets the excess count.
    pub fn excess(mut self, excess: usize) -> Self {
        self.anomaly.excess_count = Some(excess);
        self
    }

    /// Sets the details text.
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.anomaly.details = details.into();
        self
    }

    /// Adds an evidence attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.anomaly.attributes.insert(key.into(), value.to_string());
        self
    }

    /// Finishes the anomaly.
    pub fn build(self) -> Anomaly {
        self.anomaly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for anomaly_type in AnomalyType::ALL {
            assert_eq!(AnomalyType::from_tag(anomaly_type.tag()), Some(anomaly_type));
            let json = serde_json::to_string(&anomaly_type).unwrap();
            assert_eq!(json, format!("\"{}\"", anomaly_type.tag()));
        }
        assert_eq!(
            AnomalyType::from_tag(" overcapacity "),
            Some(AnomalyType::Overcapacity)
        );
        assert_eq!(AnomalyType::from_tag("MYSTERY"), None);
    }

    #[test]
    fn test_priority_order_and_lowering() {
        assert!(Priority::VeryHigh < Priority::High);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!(Priority::VeryHigh.lowered(), Priority::High);
        assert_eq!(Priority::Low.lowered(), Priority::Low);
        let parsed: Priority = serde_json::from_str("\"VERY_HIGH\"").unwrap();
        assert_eq!(parsed, Priority::VeryHigh);
    }

    #[test]
    fn test_builder() {
        let anomaly = Anomaly::builder(
            AnomalyType::Overcapacity,
            "P-1",
            "1A",
            LocationCategory::Storage,
        )
        .rule("R-3", Priority::High, 2)
        .affected_units(vec!["P-1".into(), "P-2".into(), "P-3".into()])
        .excess(2)
        .attribute("capacity", 1)
        .details("3 units in a location that holds 1")
        .build();

        assert_eq!(anomaly.affected_count, 3);
        assert_eq!(anomaly.excess_count, Some(2));
        assert_eq!(anomaly.attributes["capacity"], "1");
        assert_eq!(anomaly.precedence, 2);
    }

    #[test]
    fn test_narrow_moves_primary_unit() {
        let mut anomaly = Anomaly::builder(
            AnomalyType::Overcapacity,
            "P-1",
            "1A",
            LocationCategory::Storage,
        )
        .affected_units(vec!["P-1".into(), "P-2".into(), "P-3".into()])
        .excess(2)
        .build();
        assert_eq!(anomaly.claimed_units(), vec!["P-1", "P-2", "P-3"]);

        anomaly.narrow(vec!["P-2".into(), "P-3".into()]);
        assert_eq!(anomaly.unit_id, "P-2");
        assert_eq!(anomaly.affected_count, 2);
        assert_eq!(anomaly.excess_count, Some(2));
        assert_eq!(anomaly.attributes["units_reported_elsewhere"], "1");
    }
}
