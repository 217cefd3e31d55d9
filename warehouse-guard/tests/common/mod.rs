//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use warehouse_guard::core::RawRow;

pub const HEADERS: [&str; 5] = [
    "Pallet ID",
    "Location",
    "Creation Date",
    "Receipt Number",
    "Description",
];

pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn headers() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

/// One export row created `hours_old` hours before the reference time.
pub fn row(pallet: &str, location: &str, hours_old: i64, receipt: Option<&str>) -> RawRow {
    let created = reference_time() - Duration::hours(hours_old);
    let mut row = RawRow::new();
    row.insert("Pallet ID".into(), json!(pallet));
    row.insert("Location".into(), json!(location));
    row.insert(
        "Creation Date".into(),
        json!(created.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    row.insert(
        "Receipt Number".into(),
        receipt.map_or(Value::Null, |r| json!(r)),
    );
    row.insert("Description".into(), Value::Null);
    row
}

/// `n`-th unique compact slot code.
pub fn slot(n: usize) -> String {
    let levels = ['A', 'B', 'C', 'D', 'E'];
    format!("{:03}{}", n / 5 + 1, levels[n % 5])
}
