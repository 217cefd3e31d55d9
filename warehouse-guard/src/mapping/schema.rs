//! Target schema the column mapper maps onto.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A semantic field of the inventory schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticField {
    /// Unit (pallet) identifier
    PalletId,
    /// Location code
    Location,
    /// Creation timestamp
    CreationDate,
    /// Lot or receipt identifier
    ReceiptNumber,
    /// Product description
    Description,
}

impl SemanticField {
    /// All fields in schema order.
    pub const ALL: [SemanticField; 5] = [
        Self::PalletId,
        Self::Location,
        Self::CreationDate,
        Self::ReceiptNumber,
        Self::Description,
    ];

    /// Canonical column name of the field.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::PalletId => "pallet_id",
            Self::Location => "location",
            Self::CreationDate => "creation_date",
            Self::ReceiptNumber => "receipt_number",
            Self::Description => "description",
        }
    }
}

impl fmt::Display for SemanticField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Matching vocabulary for one semantic field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// The field being described
    pub field: SemanticField,
    /// Whether analysis is blocked without a column for this field
    pub required: bool,
    /// Alternative column names, matched by the fuzzy layer
    pub synonyms: Vec<String>,
    /// Words that hint at the field, matched by the semantic layer
    pub keywords: Vec<String>,
}

impl FieldSpec {
    /// Creates a field spec without synonyms or keywords.
    pub fn new(field: SemanticField, required: bool) -> Self {
        Self {
            field,
            required,
            synonyms: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// Sets the synonyms.
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the semantic keywords.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Canonical name of the field.
    pub fn canonical_name(&self) -> &'static str {
        self.field.canonical_name()
    }
}

/// Ordered set of fields to map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSchema {
    fields: Vec<FieldSpec>,
}

impl TargetSchema {
    /// Creates a schema from field specs; order is the tie-break order.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The default inventory schema.
    pub fn inventory() -> Self {
        Self::new(vec![
            FieldSpec::new(SemanticField::PalletId, true)
                .with_synonyms([
                    "pallet number",
                    "pallet no",
                    "pallet",
                    "lpn",
                    "license plate",
                    "unit id",
                    "sscc",
                    "pallet code",
                ])
                .with_keywords(["pallet", "lpn", "plate", "unit", "sscc", "container"]),
            FieldSpec::new(SemanticField::Location, true)
                .with_synonyms([
                    "loc",
                    "location code",
                    "current location",
                    "storage location",
                    "bin",
                    "slot",
                    "position",
                ])
                .with_keywords(["loc", "bin", "slot", "position", "storage", "place"]),
            FieldSpec::new(SemanticField::CreationDate, true)
                .with_synonyms([
                    "created",
                    "created at",
                    "creation time",
                    "received date",
                    "date received",
                    "inbound date",
                    "timestamp",
                ])
                .with_keywords(["date", "time", "created", "creation", "timestamp", "arrival"]),
            FieldSpec::new(SemanticField::ReceiptNumber, false)
                .with_synonyms([
                    "receipt",
                    "receipt no",
                    "lot",
                    "lot number",
                    "batch",
                    "batch number",
                    "asn",
                ])
                .with_keywords(["receipt", "lot", "batch", "asn", "shipment", "po"]),
            FieldSpec::new(SemanticField::Description, false)
                .with_synonyms([
                    "product description",
                    "product",
                    "item description",
                    "item",
                    "product name",
                ])
                .with_keywords(["desc", "product", "item", "sku", "article", "name"]),
        ])
    }

    /// Field specs in schema order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up the spec for a field.
    pub fn get(&self, field: SemanticField) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.field == field)
    }

    /// Required fields in schema order.
    pub fn required_fields(&self) -> impl Iterator<Item = SemanticField> + '_ {
        self.fields.iter().filter(|s| s.required).map(|s| s.field)
    }
}

impl Default for TargetSchema {
    fn default() -> Self {
        Self::inventory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_schema_required_fields() {
        let schema = TargetSchema::inventory();
        let required: Vec<_> = schema.required_fields().collect();
        assert_eq!(
            required,
            vec![
                SemanticField::PalletId,
                SemanticField::Location,
                SemanticField::CreationDate
            ]
        );
        assert!(!schema.get(SemanticField::Description).unwrap().required);
    }

    #[test]
    fn test_field_serde_uses_canonical_names() {
        for field in SemanticField::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.canonical_name()));
        }
    }
}
