use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::mapping::{ResolvedMapping, SemanticField};

/// A decoded export row: header to cell value.
pub type RawRow = HashMap<String, Value>;

/// One inventory unit after projection through the column mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Index of the source row in the export
    pub row_index: usize,
    /// Unit (pallet) identifier
    pub unit_id: String,
    /// Raw location code, empty when the cell was blank
    pub location: String,
    /// Creation timestamp; `None` when missing or unparseable
    pub created_at: Option<DateTime<Utc>>,
    /// Lot or receipt identifier
    pub lot_id: Option<String>,
    /// Product description
    pub description: Option<String>,
}

impl NormalizedRecord {
    /// Creates a record with only the identifying fields set.
    pub fn new(row_index: usize, unit_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            row_index,
            unit_id: unit_id.into(),
            location: location.into(),
            created_at: None,
            lot_id: None,
            description: None,
        }
    }

    /// Sets the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the lot identifier.
    pub fn with_lot(mut self, lot_id: impl Into<String>) -> Self {
        self.lot_id = Some(lot_id.into());
        self
    }

    /// Sets the product description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Age of the unit at the reference time, if the timestamp is known.
    pub fn age_at(&self, reference: DateTime<Utc>) -> Option<chrono::Duration> {
        self.created_at.map(|created| reference - created)
    }
}

/// Counters collected while projecting rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub total_rows: usize,
    pub projected: usize,
    pub missing_unit_id: usize,
    pub missing_location: usize,
    pub unparseable_timestamps: usize,
}

/// Projects raw rows into [`NormalizedRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordProjector {
    mapping: ResolvedMapping,
}

impl RecordProjector {
    /// Creates a projector for a resolved mapping.
    pub fn new(mapping: ResolvedMapping) -> Self {
        Self { mapping }
    }

    /// Projects every row. Rows without a unit id are skipped and counted.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub fn project(&self, rows: &[RawRow]) -> (Vec<NormalizedRecord>, ProjectionStats) {
        let mut stats = ProjectionStats {
            total_rows: rows.len(),
            ..ProjectionStats::default()
        };
        let mut records = Vec::with_capacity(rows.len());

        for (row_index, row) in rows.iter().enumerate() {
            let Some(unit_id) = self.cell(row, SemanticField::PalletId) else {
                stats.missing_unit_id += 1;
                continue;
            };
            let location = self.cell(row, SemanticField::Location).unwrap_or_else(|| {
                stats.missing_location += 1;
                String::new()
            });
            let created_at = match self.cell(row, SemanticField::CreationDate) {
                Some(raw) => {
                    let parsed = parse_timestamp(&raw);
                    if parsed.is_none() {
                        stats.unparseable_timestamps += 1;
                    }
                    parsed
                }
                None => None,
            };

            records.push(NormalizedRecord {
                row_index,
                unit_id,
                location,
                created_at,
                lot_id: self.cell(row, SemanticField::ReceiptNumber),
                description: self.cell(row, SemanticField::Description),
            });
        }

        stats.projected = records.len();
        debug!(
            projected = stats.projected,
            missing_unit_id = stats.missing_unit_id,
            unparseable_timestamps = stats.unparseable_timestamps,
            "Rows projected"
        );
        (records, stats)
    }

    fn cell(&self, row: &RawRow, field: SemanticField) -> Option<String> {
        let column = self.mapping.column_for(field)?;
        row.get(column).and_then(render_value)
    }
}

/// Renders a cell as a trimmed string; null and blank cells are missing.
pub fn render_value(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    (!rendered.is_empty()).then_some(rendered)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parses a timestamp in one of the accepted export formats.
///
/// Values without an offset are taken as UTC; bare dates as midnight UTC.
///
/// ```rust
/// use warehouse_guard::core::parse_timestamp;
///
/// assert!(parse_timestamp("2024-03-01T08:30:00Z").is_some());
/// assert!(parse_timestamp("03/01/2024 08:30").is_some());
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}
