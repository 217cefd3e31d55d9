use std::collections::HashMap;
use std::sync::Arc;

use super::parser::{parse_slot, StructuralParse};
use super::{
    LocationCategory, LocationDescriptor, NamedArea, NamedPattern, ParseFailure, RegistrySnapshot,
    ResolutionSource, SlotAddress, WarehouseConfig,
};
use crate::prelude::*;

/// Resolves location codes against an immutable warehouse snapshot.
///
/// Resolution is pure: the same code always yields the same descriptor for a
/// given resolver.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    config: Arc<WarehouseConfig>,
    areas: HashMap<String, NamedArea>,
    registry: Arc<RegistrySnapshot>,
    fingerprint: String,
}

/// What the code's own shape says about it, ignoring declarations.
struct PatternReading<'a> {
    slot: Option<SlotAddress>,
    pattern: Option<&'a NamedPattern>,
    failure: Option<ParseFailure>,
}

impl PatternReading<'_> {
    fn implied_category(&self) -> Option<LocationCategory> {
        if self.slot.is_some() {
            Some(LocationCategory::Storage)
        } else {
            self.pattern.map(|p| p.category)
        }
    }
}

impl LocationResolver {
    /// Creates a resolver, validating the configuration first.
    pub fn new(config: Arc<WarehouseConfig>, registry: Arc<RegistrySnapshot>) -> Result<Self> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        let areas = config
            .named_areas
            .iter()
            .map(|area| (config.normalize_code(&area.code), area.clone()))
            .collect();

        Ok(Self {
            config,
            areas,
            registry,
            fingerprint,
        })
    }

    /// Fingerprint of the configuration this resolver was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The configuration snapshot.
    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Normalizes a raw code with the warehouse rules.
    pub fn normalize(&self, raw: &str) -> String {
        self.config.normalize_code(raw)
    }

    /// Resolves a raw location code.
    pub fn resolve(&self, raw: &str) -> LocationDescriptor {
        let code = self.normalize(raw);
        self.resolve_normalized(code)
    }

    pub(crate) fn resolve_normalized(&self, code: String) -> LocationDescriptor {
        if code.is_empty() {
            return LocationDescriptor::invalid(code, ParseFailure::Blank);
        }

        let reading = self.read_pattern(&code);
        let implied_category = reading.implied_category();

        if let Some(area) = self.areas.get(&code) {
            return LocationDescriptor {
                category: area.category,
                implied_category,
                zone: area.zone.clone(),
                slot: reading.slot,
                area_key: Some(code.clone()),
                capacity: area.capacity,
                source: ResolutionSource::Configuration,
                failure: None,
                code,
            };
        }

        if let Some(entry) = self.registry.get(&code) {
            return LocationDescriptor {
                category: entry.category,
                implied_category,
                zone: entry.zone.clone(),
                slot: reading.slot,
                area_key: Some(code.clone()),
                capacity: entry.capacity,
                source: ResolutionSource::Registry,
                failure: None,
                code,
            };
        }

        if let Some(slot) = reading.slot {
            let structure = &self.config.structure;
            return LocationDescriptor {
                category: LocationCategory::Storage,
                implied_category,
                zone: Some(structure.default_zone.clone()),
                slot: Some(slot),
                area_key: None,
                capacity: structure.slot_capacity,
                source: ResolutionSource::StructuralPattern,
                failure: None,
                code,
            };
        }

        if let Some(pattern) = reading.pattern {
            return LocationDescriptor {
                category: pattern.category,
                implied_category,
                zone: pattern.zone.clone(),
                slot: None,
                area_key: Some(pattern.prefix.to_uppercase()),
                capacity: pattern.default_capacity,
                source: ResolutionSource::NamedPattern,
                failure: None,
                code,
            };
        }

        let failure = reading.failure.unwrap_or(ParseFailure::Unrecognized);
        LocationDescriptor::invalid(code, failure)
    }

    fn read_pattern(&self, code: &str) -> PatternReading<'_> {
        let (slot, failure) = match parse_slot(code, &self.config.structure) {
            StructuralParse::Slot(slot) => (Some(slot), None),
            StructuralParse::Failed(failure) => (None, Some(failure)),
            StructuralParse::NotStructural => (None, None),
        };

        let pattern = if slot.is_some() {
            None
        } else {
            self.config
                .named_patterns
                .iter()
                .find(|p| code.starts_with(&p.prefix.trim().to_uppercase()))
        };

        PatternReading {
            slot,
            pattern,
            failure,
        }
    }
}
