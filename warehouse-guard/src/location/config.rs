//! Warehouse configuration snapshot consumed by the resolver.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::LocationCategory;
use crate::prelude::*;

/// Upper bound for `max_position_digits` (999,999 positions).
pub const MAX_POSITION_DIGITS_LIMIT: u8 = 6;

/// Read-only warehouse layout owned by an external collaborator.
///
/// # Examples
///
/// ```rust
/// use warehouse_guard::location::WarehouseConfig;
///
/// let config = WarehouseConfig::from_json_str(r#"{
///     "warehouse_id": "WH01",
///     "code_prefixes": ["WH01_"],
///     "named_areas": [
///         {"code": "RECV-01", "category": "RECEIVING", "capacity": 20, "zone": "DOCK"}
///     ],
///     "structure": {"max_position_digits": 4, "valid_levels": ["A", "B", "C"]}
/// }"#).unwrap();
///
/// assert_eq!(config.structure.max_position_digits, 4);
/// assert_eq!(config.normalize_code("  wh01_recv-01 "), "RECV-01");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Identifier of the warehouse this configuration describes
    pub warehouse_id: String,
    /// Prefixes stripped from codes before matching (e.g. `WH01_`)
    pub code_prefixes: Vec<String>,
    /// Explicitly declared operational areas
    pub named_areas: Vec<NamedArea>,
    /// Structural slot parsing parameters
    pub structure: StructureConfig,
    /// Naming conventions for undeclared operational areas
    pub named_patterns: Vec<NamedPattern>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            warehouse_id: "default".to_string(),
            code_prefixes: Vec::new(),
            named_areas: Vec::new(),
            structure: StructureConfig::default(),
            named_patterns: NamedPattern::defaults(),
        }
    }
}

/// An operational area declared in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArea {
    /// Location code of the area
    pub code: String,
    /// Declared category
    pub category: LocationCategory,
    /// Declared capacity in units
    pub capacity: u32,
    /// Zone of the area
    #[serde(default)]
    pub zone: Option<String>,
}

impl NamedArea {
    /// Creates a new named area declaration.
    pub fn new(code: impl Into<String>, category: LocationCategory, capacity: u32) -> Self {
        Self {
            code: code.into(),
            category,
            capacity,
            zone: None,
        }
    }

    /// Sets the zone.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }
}

/// Parameters for parsing `{digits}{level}` and `{aisle}-{rack}-{digits}{level}` codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Maximum digits in the position part (1-6)
    pub max_position_digits: u8,
    /// Valid level letters
    pub valid_levels: Vec<char>,
    /// Capacity of a single storage slot
    pub slot_capacity: u32,
    /// Zone assigned to structurally parsed slots
    pub default_zone: String,
    /// Whether the dashed aisle-rack-position form is accepted
    pub allow_dashed: bool,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            max_position_digits: MAX_POSITION_DIGITS_LIMIT,
            valid_levels: vec!['A', 'B', 'C', 'D', 'E'],
            slot_capacity: 1,
            default_zone: "GENERAL".to_string(),
            allow_dashed: true,
        }
    }
}

impl StructureConfig {
    /// Sets the maximum number of position digits.
    pub fn with_max_position_digits(mut self, digits: u8) -> Self {
        self.max_position_digits = digits;
        self
    }

    /// Sets the valid level letters.
    pub fn with_valid_levels<I: IntoIterator<Item = char>>(mut self, levels: I) -> Self {
        self.valid_levels = levels.into_iter().collect();
        self
    }

    /// Sets the per-slot capacity.
    pub fn with_slot_capacity(mut self, capacity: u32) -> Self {
        self.slot_capacity = capacity;
        self
    }
}

/// Naming convention that identifies an undeclared operational area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPattern {
    /// Code prefix, matched after normalization
    pub prefix: String,
    /// Category assigned to matching codes
    pub category: LocationCategory,
    /// Conservative capacity assumed for matching codes
    pub default_capacity: u32,
    /// Zone assigned to matching codes
    #[serde(default)]
    pub zone: Option<String>,
}

impl NamedPattern {
    /// Creates a new naming convention.
    pub fn new(prefix: impl Into<String>, category: LocationCategory, default_capacity: u32) -> Self {
        Self {
            prefix: prefix.into(),
            category,
            default_capacity,
            zone: None,
        }
    }

    /// Sets the zone.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// The built-in receiving, staging, dock and aisle conventions.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("RECEIVING", LocationCategory::Receiving, 10).with_zone("RECEIVING"),
            Self::new("RECV", LocationCategory::Receiving, 10).with_zone("RECEIVING"),
            Self::new("STAGING", LocationCategory::Staging, 5).with_zone("STAGING"),
            Self::new("STAGE", LocationCategory::Staging, 5).with_zone("STAGING"),
            Self::new("DOCK", LocationCategory::Dock, 2).with_zone("DOCK"),
            Self::new("AISLE", LocationCategory::Transitional, 10).with_zone("AMBIENT"),
        ]
    }
}

impl WarehouseConfig {
    /// Creates a configuration with defaults for the given warehouse.
    pub fn new(warehouse_id: impl Into<String>) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            ..Self::default()
        }
    }

    /// Adds a named area declaration.
    pub fn with_named_area(mut self, area: NamedArea) -> Self {
        self.named_areas.push(area);
        self
    }

    /// Adds a code prefix to strip during normalization.
    pub fn with_code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_prefixes.push(prefix.into());
        self
    }

    /// Replaces the structural parsing parameters.
    pub fn with_structure(mut self, structure: StructureConfig) -> Self {
        self.structure = structure;
        self
    }

    /// Replaces the named pattern conventions.
    pub fn with_named_patterns(mut self, patterns: Vec<NamedPattern>) -> Self {
        self.named_patterns = patterns;
        self
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
            .with_context(|| format!("Failed to load warehouse configuration from {}", path.display()))
    }

    /// Checks the configuration for values the resolver cannot work with.
    pub fn validate(&self) -> Result<()> {
        let structure = &self.structure;
        if structure.max_position_digits == 0
            || structure.max_position_digits > MAX_POSITION_DIGITS_LIMIT
        {
            return Err(WarehouseError::Configuration(format!(
                "max_position_digits must be between 1 and {MAX_POSITION_DIGITS_LIMIT}, got {}",
                structure.max_position_digits
            )));
        }
        if structure.valid_levels.is_empty() {
            return Err(WarehouseError::Configuration(
                "valid_levels must not be empty".to_string(),
            ));
        }
        let mut seen_levels = HashSet::new();
        for level in &structure.valid_levels {
            if !level.is_ascii_uppercase() {
                return Err(WarehouseError::Configuration(format!(
                    "level '{level}' must be an uppercase ASCII letter"
                )));
            }
            if !seen_levels.insert(*level) {
                return Err(WarehouseError::Configuration(format!(
                    "level '{level}' is declared twice"
                )));
            }
        }
        if structure.slot_capacity == 0 {
            return Err(WarehouseError::Configuration(
                "slot_capacity must be at least 1".to_string(),
            ));
        }

        if self.code_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(WarehouseError::Configuration(
                "code_prefixes must not contain blank entries".to_string(),
            ));
        }

        let mut seen_areas = HashSet::new();
        for area in &self.named_areas {
            let code = self.normalize_code(&area.code);
            if code.is_empty() {
                return Err(WarehouseError::Configuration(
                    "named area with a blank code".to_string(),
                ));
            }
            if area.category == LocationCategory::Invalid {
                return Err(WarehouseError::Configuration(format!(
                    "named area '{code}' cannot be declared INVALID"
                )));
            }
            if !seen_areas.insert(code.clone()) {
                return Err(WarehouseError::Configuration(format!(
                    "named area '{code}' is declared twice"
                )));
            }
        }

        for pattern in &self.named_patterns {
            if pattern.prefix.trim().is_empty() {
                return Err(WarehouseError::Configuration(
                    "named pattern with a blank prefix".to_string(),
                ));
            }
            if pattern.category == LocationCategory::Invalid {
                return Err(WarehouseError::Configuration(format!(
                    "named pattern '{}' cannot map to INVALID",
                    pattern.prefix
                )));
            }
        }

        debug!(
            warehouse.id = %self.warehouse_id,
            named_areas = self.named_areas.len(),
            named_patterns = self.named_patterns.len(),
            "Warehouse configuration validated"
        );
        Ok(())
    }

    /// Normalizes a raw location code for matching.
    ///
    /// Trims, upper-cases, collapses internal whitespace and strips the first
    /// matching warehouse prefix as long as something remains after it.
    pub fn normalize_code(&self, raw: &str) -> String {
        let upper = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        for prefix in &self.code_prefixes {
            let prefix = prefix.trim().to_uppercase();
            if let Some(rest) = upper.strip_prefix(&prefix) {
                let rest = rest.trim();
                if !rest.is_empty() {
                    return rest.to_string();
                }
            }
        }
        upper
    }

    /// Stable SHA-256 fingerprint of this configuration.
    ///
    /// Two runs with equal fingerprints resolve every code identically.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
