//! Inventory fixtures for tests, benchmarks and the fixture generator.
//!
//! Every fixture is deterministic: the hand-built scenarios are fixed and the
//! random inventory is driven by a seeded RNG.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::core::{NormalizedRecord, RawRow};
use crate::location::{LocationCategory, NamedArea, WarehouseConfig};

/// Headers of the fixture exports; each maps exactly onto a schema field.
pub const EXPORT_HEADERS: [&str; 5] = [
    "Pallet ID",
    "Location",
    "Creation Date",
    "Receipt Number",
    "Description",
];

/// Reference time all fixture ages are measured against.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Fixture headers as owned strings.
pub fn export_headers() -> Vec<String> {
    EXPORT_HEADERS.iter().map(|h| h.to_string()).collect()
}

/// Builds one export row using [`EXPORT_HEADERS`].
pub fn export_row(
    pallet: &str,
    location: &str,
    created: DateTime<Utc>,
    receipt: Option<&str>,
    description: Option<&str>,
) -> RawRow {
    let mut row = RawRow::new();
    row.insert("Pallet ID".to_string(), json!(pallet));
    row.insert("Location".to_string(), json!(location));
    row.insert(
        "Creation Date".to_string(),
        json!(created.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    row.insert(
        "Receipt Number".to_string(),
        receipt.map_or(Value::Null, |r| json!(r)),
    );
    row.insert(
        "Description".to_string(),
        description.map_or(Value::Null, |d| json!(d)),
    );
    row
}

/// The `n`-th compact slot code: positions 1.. over levels A to E.
pub fn slot_code(n: usize) -> String {
    let levels = ['A', 'B', 'C', 'D', 'E'];
    format!("{:03}{}", n / levels.len() + 1, levels[n % levels.len()])
}

/// A warehouse with a freezer, a declared dock and a mis-declared area.
pub fn sample_warehouse() -> WarehouseConfig {
    WarehouseConfig::new("WH01")
        .with_code_prefix("WH01-")
        .with_named_area(NamedArea::new("FRZ-01", LocationCategory::Storage, 20).with_zone("FREEZER"))
        .with_named_area(NamedArea::new("DOCK-1", LocationCategory::Dock, 4).with_zone("DOCK"))
        .with_named_area(NamedArea::new("RECV-05", LocationCategory::Storage, 4))
}

/// 700 rows in unique slots, all fresh, with one 10-pallet receipt left
/// incomplete: 8 pallets stored and 2 still in receiving.
pub fn lot_straggler_rows() -> Vec<RawRow> {
    let created = reference_time() - Duration::hours(2);
    let mut rows = Vec::with_capacity(700);

    for n in 0..690 {
        let receipt = format!("RCPT-{:03}", n / 10);
        rows.push(export_row(
            &format!("PLT-{n:05}"),
            &slot_code(n),
            created,
            Some(&receipt),
            Some("Canned tomatoes 12x400g"),
        ));
    }
    for n in 0..10 {
        let location = if n < 8 {
            slot_code(690 + n)
        } else {
            "RECV-01".to_string()
        };
        rows.push(export_row(
            &format!("PLT-LOT-{n:02}"),
            &location,
            created,
            Some("RCPT-LATE"),
            Some("Dry pasta 20x500g"),
        ));
    }
    rows
}

/// A small export that triggers every rule type once against
/// [`sample_warehouse`].
pub fn anomaly_showcase_rows() -> Vec<RawRow> {
    let at = |hours: i64| reference_time() - Duration::hours(hours);
    vec![
        // stagnant in receiving
        export_row("PLT-STAGNANT", "RECV-02", at(30), None, Some("Paper towels")),
        // lot straggler: 4 of 5 stored
        export_row("PLT-L1", "010A", at(2), Some("RCPT-9"), None),
        export_row("PLT-L2", "010B", at(2), Some("RCPT-9"), None),
        export_row("PLT-L3", "010C", at(2), Some("RCPT-9"), None),
        export_row("PLT-L4", "010D", at(2), Some("RCPT-9"), None),
        export_row("PLT-L5", "RECV-03", at(2), Some("RCPT-9"), None),
        // overcapacity: two pallets in a single slot
        export_row("PLT-OC1", "WH01-020A", at(1), None, None),
        export_row("PLT-OC2", "020A", at(1), None, None),
        // unresolvable code
        export_row("PLT-LOST", "SHELF-Q", at(1), None, None),
        // stuck in an aisle
        export_row("PLT-AISLE", "AISLE-07", at(9), None, None),
        // frozen goods in general storage
        export_row("PLT-FROZEN", "030A", at(3), None, Some("Frozen peas 24x500g")),
        // frozen goods where they belong
        export_row("PLT-FREEZER", "FRZ-01", at(3), None, Some("Frozen fish")),
        // scanned twice
        export_row("PLT-DUP", "040A", at(1), None, None),
        export_row("PLT-DUP", "040B", at(1), None, None),
        // receiving-looking code declared as storage
        export_row("PLT-MISDECL", "RECV-05", at(1), None, None),
    ]
}

/// Random inventory with a realistic mix of locations and ages.
///
/// Roughly 85% of pallets sit in storage slots, the rest in receiving,
/// staging, aisles or at invalid codes. Receipts group 12 consecutive pallets.
pub fn random_inventory(count: usize, seed: u64) -> Vec<NormalizedRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let reference = reference_time();
    let descriptions = [
        "Canned tomatoes 12x400g",
        "Frozen peas 24x500g",
        "Chilled yoghurt 6x150g",
        "Dry pasta 20x500g",
        "Paper towels 8 rolls",
    ];
    let slots = (count * 9 / 10).max(1);

    (0..count)
        .map(|i| {
            let location = match rng.random_range(0..100) {
                0..=84 => slot_code(rng.random_range(0..slots)),
                85..=91 => format!("RECV-{:02}", rng.random_range(1..=4)),
                92..=95 => format!("STAGE-{}", rng.random_range(1..=3)),
                96..=97 => format!("AISLE-{:02}", rng.random_range(1..=12)),
                _ => "UNKNOWN".to_string(),
            };
            let hours = rng.random_range(0..96);
            let description = descriptions[rng.random_range(0..descriptions.len())];
            NormalizedRecord::new(i, format!("PLT-{i:06}"), location)
                .with_created_at(reference - Duration::hours(hours))
                .with_lot(format!("RCPT-{:05}", i / 12))
                .with_description(description)
        })
        .collect()
}

/// Converts records back into export rows.
pub fn to_rows(records: &[NormalizedRecord]) -> Vec<RawRow> {
    records
        .iter()
        .map(|r| {
            export_row(
                &r.unit_id,
                &r.location,
                r.created_at.unwrap_or_else(reference_time),
                r.lot_id.as_deref(),
                r.description.as_deref(),
            )
        })
        .collect()
}
