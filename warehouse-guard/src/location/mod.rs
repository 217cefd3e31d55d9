//! Location resolution: from a raw location code to a typed descriptor.
//!
//! Every location code in an export is resolved exactly once per analysis run
//! into a [`LocationDescriptor`]. Resolution walks a fixed hierarchy and stops
//! at the first layer that recognizes the code:
//!
//! ```text
//! raw code ─► normalize ─► configuration ─► registry ─► structural ─► named pattern ─► fallback
//!                          (named areas)    (manual)    (1230A,        (RECV-*, ...)     (INVALID,
//!                                                        02-01-015B)                      capacity 0)
//! ```
//!
//! The resolver is a pure function of the code and an immutable snapshot of the
//! warehouse configuration plus the registry entries loaded at the start of the
//! run. [`LocationIndex`] memoizes the results for the lifetime of a run.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warehouse_guard::location::{
//!     LocationCategory, LocationResolver, RegistrySnapshot, ResolutionSource, WarehouseConfig,
//! };
//!
//! let config = Arc::new(WarehouseConfig::default());
//! let resolver = LocationResolver::new(config, Arc::new(RegistrySnapshot::empty())).unwrap();
//!
//! let slot = resolver.resolve("1230A");
//! assert_eq!(slot.category, LocationCategory::Storage);
//! assert_eq!(slot.source, ResolutionSource::StructuralPattern);
//!
//! let junk = resolver.resolve("??");
//! assert!(junk.is_invalid());
//! assert_eq!(junk.capacity, 0);
//! ```

mod cache;
mod config;
mod parser;
mod registry;
mod resolver;

pub use cache::LocationIndex;
pub use config::{NamedArea, NamedPattern, StructureConfig, WarehouseConfig};
pub use parser::{parse_slot, StructuralParse};
pub use registry::{
    EmptyLocationRegistry, InMemoryLocationRegistry, LocationRegistry, RegistryEntry,
    RegistrySnapshot,
};
pub use resolver::LocationResolver;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Functional category of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationCategory {
    /// Ordinary storage slot (rack position)
    Storage,
    /// Inbound receiving area
    Receiving,
    /// Outbound staging area
    Staging,
    /// Dock door
    Dock,
    /// Transitional area such as an aisle or a cross-dock lane
    Transitional,
    /// Code could not be resolved
    Invalid,
}

impl LocationCategory {
    /// Returns true for special operational areas (everything that is neither
    /// a storage slot nor invalid).
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            Self::Receiving | Self::Staging | Self::Dock | Self::Transitional
        )
    }

    /// Returns the wire name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "STORAGE",
            Self::Receiving => "RECEIVING",
            Self::Staging => "STAGING",
            Self::Dock => "DOCK",
            Self::Transitional => "TRANSITIONAL",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for LocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which layer of the resolution hierarchy produced a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionSource {
    /// Named area declared in the warehouse configuration
    Configuration,
    /// Manually created location from the persisted registry
    Registry,
    /// Parsed from the structural slot pattern
    StructuralPattern,
    /// Conservative default for a recognized area naming convention
    NamedPattern,
    /// Nothing matched
    Fallback,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Registry => "registry",
            Self::StructuralPattern => "structural pattern",
            Self::NamedPattern => "named pattern",
            Self::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Why a code failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseFailure {
    /// The code was empty after trimming.
    Blank,
    /// The position part has more digits than the configured maximum.
    DigitOverflow { digits: usize, max: u8 },
    /// The level letter is not one of the configured levels.
    InvalidLevel { level: char },
    /// The code matches no known form.
    Unrecognized,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "location code is blank"),
            Self::DigitOverflow { digits, max } => {
                write!(f, "position has {digits} digits, maximum is {max}")
            }
            Self::InvalidLevel { level } => write!(f, "level '{level}' is not a valid level"),
            Self::Unrecognized => write!(f, "code does not match any known location format"),
        }
    }
}

/// Structural address of a storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotAddress {
    /// Aisle number (dashed form only)
    pub aisle: Option<u32>,
    /// Rack number (dashed form only)
    pub rack: Option<u32>,
    /// Position within the rack
    pub position: u32,
    /// Number of digits the position was written with
    pub position_digits: usize,
    /// Level letter
    pub level: char,
}

/// Resolved interpretation of a location code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    /// Normalized code (trimmed, upper-cased, warehouse prefix removed)
    pub code: String,
    /// Resolved category
    pub category: LocationCategory,
    /// Category implied by the code's own pattern, ignoring declarations
    pub implied_category: Option<LocationCategory>,
    /// Zone the location belongs to
    pub zone: Option<String>,
    /// Structural address when the code parses as a slot
    pub slot: Option<SlotAddress>,
    /// Named-area key for declared and pattern-matched areas
    pub area_key: Option<String>,
    /// Declared capacity in units; 0 excludes the location from capacity rules
    pub capacity: u32,
    /// Layer that produced this descriptor
    pub source: ResolutionSource,
    /// Reason for an invalid resolution
    pub failure: Option<ParseFailure>,
}

impl LocationDescriptor {
    /// Creates the fallback descriptor for an unresolvable code.
    pub fn invalid(code: impl Into<String>, failure: ParseFailure) -> Self {
        Self {
            code: code.into(),
            category: LocationCategory::Invalid,
            implied_category: None,
            zone: None,
            slot: None,
            area_key: None,
            capacity: 0,
            source: ResolutionSource::Fallback,
            failure: Some(failure),
        }
    }

    /// Returns true if the code could not be resolved.
    pub fn is_invalid(&self) -> bool {
        self.category == LocationCategory::Invalid
    }

    /// Returns true for special operational areas.
    pub fn is_special(&self) -> bool {
        self.category.is_special()
    }

    /// Returns true for ordinary storage slots.
    pub fn is_storage(&self) -> bool {
        self.category == LocationCategory::Storage
    }

    /// Returns true if the location takes part in capacity analysis.
    pub fn has_capacity(&self) -> bool {
        !self.is_invalid() && self.capacity > 0
    }
}
