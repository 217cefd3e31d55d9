//! Structural slot code parsing.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ParseFailure, SlotAddress, StructureConfig};

// Position digits are captured unbounded so overflow can be reported instead
// of silently failing to match.
static COMPACT_SLOT: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^([0-9]+)([A-Z])$").expect("Hard-coded regex pattern should be valid")
});

static DASHED_SLOT: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^([0-9]{1,3})-([0-9]{1,3})-([0-9]+)([A-Z])$")
        .expect("Hard-coded regex pattern should be valid")
});

/// Outcome of structural parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralParse {
    /// The code is a well-formed slot.
    Slot(SlotAddress),
    /// The code has slot shape but violates the configured bounds.
    Failed(ParseFailure),
    /// The code does not have slot shape at all.
    NotStructural,
}

/// Parses a normalized code as a storage slot.
///
/// Accepts `{digits}{level}` (e.g. `1230A`) and, when enabled,
/// `{aisle}-{rack}-{digits}{level}` (e.g. `02-01-015B`).
///
/// # Examples
///
/// ```rust
/// use warehouse_guard::location::{parse_slot, StructuralParse, StructureConfig};
///
/// let structure = StructureConfig::default().with_max_position_digits(4);
/// assert!(matches!(parse_slot("1230A", &structure), StructuralParse::Slot(_)));
///
/// let narrow = StructureConfig::default().with_max_position_digits(3);
/// assert!(matches!(parse_slot("1230A", &narrow), StructuralParse::Failed(_)));
/// ```
pub fn parse_slot(code: &str, structure: &StructureConfig) -> StructuralParse {
    if let Some(caps) = COMPACT_SLOT.captures(code) {
        return build_slot(None, None, &caps[1], &caps[2], structure);
    }

    if structure.allow_dashed {
        if let Some(caps) = DASHED_SLOT.captures(code) {
            let aisle = caps[1].parse().ok();
            let rack = caps[2].parse().ok();
            return build_slot(aisle, rack, &caps[3], &caps[4], structure);
        }
    }

    StructuralParse::NotStructural
}

fn build_slot(
    aisle: Option<u32>,
    rack: Option<u32>,
    digits: &str,
    level: &str,
    structure: &StructureConfig,
) -> StructuralParse {
    let position_digits = digits.len();
    if position_digits > usize::from(structure.max_position_digits) {
        return StructuralParse::Failed(ParseFailure::DigitOverflow {
            digits: position_digits,
            max: structure.max_position_digits,
        });
    }

    let Some(level) = level.chars().next() else {
        return StructuralParse::NotStructural;
    };
    if !structure.valid_levels.contains(&level) {
        return StructuralParse::Failed(ParseFailure::InvalidLevel { level });
    }

    // Bounded by max_position_digits <= 6, so this always fits.
    let Ok(position) = digits.parse::<u32>() else {
        return StructuralParse::Failed(ParseFailure::Unrecognized);
    };

    StructuralParse::Slot(SlotAddress {
        aisle,
        rack,
        position,
        position_digits,
        level,
    })
}
