//! Column mapping: arbitrary export headers onto the semantic schema.
//!
//! Each `(field, header)` pair is scored by the first layer that recognizes it:
//!
//! | Layer    | Confidence  | Match                                               |
//! |----------|-------------|-----------------------------------------------------|
//! | Exact    | 0.99 – 1.0  | compact header equals the canonical name            |
//! | Fuzzy    | 0.70 – 0.98 | edit distance against canonical name and synonyms  |
//! | Semantic | 0.50 – 0.70 | header tokens hit the field's keywords              |
//!
//! Assignment is greedy, highest score first, and a header serves at most one
//! field. Confidence decides how a mapping may be used:
//!
//! - `>= 0.85` is applied automatically
//! - `0.65 - 0.85` needs operator confirmation
//! - `0.50 - 0.65` is only a weak suggestion
//! - below `0.50` nothing is suggested
//!
//! ## Example
//!
//! ```rust
//! use warehouse_guard::mapping::{ColumnMapper, MappingDecisions, MappingStatus, SemanticField};
//!
//! let headers = ["Pallet number", "Location", "Creation Date", "Product Desc"];
//! let report = ColumnMapper::default().map_headers(&headers);
//!
//! let pallet = report.mapping(SemanticField::PalletId).unwrap();
//! assert_eq!(pallet.column.as_deref(), Some("Pallet number"));
//! assert_eq!(pallet.status, MappingStatus::AutoApplied);
//!
//! let resolved = report.resolve(&MappingDecisions::default()).unwrap();
//! assert_eq!(resolved.column_for(SemanticField::Location), Some("Location"));
//! // the description mapping was only a suggestion and stays unused until confirmed
//! assert_eq!(resolved.column_for(SemanticField::Description), None);
//! ```

mod schema;
mod similarity;

pub use schema::{FieldSpec, SemanticField, TargetSchema};
pub use similarity::{edit_distance, levenshtein, similarity_from_distance, NormalizedHeader};

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::prelude::*;
use similarity::{keyword_hit, similarity, singular};

/// Confidence at or above which a mapping is applied without confirmation.
pub const AUTO_APPLY_THRESHOLD: f64 = 0.85;
/// Confidence at or above which a mapping is offered for confirmation.
pub const REVIEW_THRESHOLD: f64 = 0.65;
/// Confidence at or above which a mapping is suggested at all.
pub const SUGGESTION_THRESHOLD: f64 = 0.50;

const FUZZY_FLOOR: f64 = 0.70;
const FUZZY_CAP: f64 = 0.98;
const SYNONYM_WEIGHT: f64 = 0.88;
const PLURAL_MATCH: f64 = 0.99;
const SEMANTIC_BASE: f64 = 0.50;
const SEMANTIC_SPAN: f64 = 0.20;
const ALTERNATIVE_WINDOW: f64 = 0.15;
const MAX_ALTERNATIVES: usize = 2;

/// Layer that produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLayer {
    /// Normalized equality with the canonical name
    Exact,
    /// Edit-distance similarity
    Fuzzy,
    /// Keyword overlap
    Semantic,
}

impl fmt::Display for MatchLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// How a mapping may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    /// Confident enough to apply automatically
    AutoApplied,
    /// Applied only after operator confirmation
    NeedsReview,
    /// Low-confidence suggestion; applied only after confirmation
    WeakSuggestion,
    /// No usable candidate
    Unmapped,
}

impl MappingStatus {
    /// Status for a confidence value.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= AUTO_APPLY_THRESHOLD {
            Self::AutoApplied
        } else if confidence >= REVIEW_THRESHOLD {
            Self::NeedsReview
        } else if confidence >= SUGGESTION_THRESHOLD {
            Self::WeakSuggestion
        } else {
            Self::Unmapped
        }
    }
}

/// A scored header for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCandidate {
    /// Source header
    pub column: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Layer that produced the score
    pub layer: MatchLayer,
}

/// The mapping chosen for one semantic field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Target field
    pub field: SemanticField,
    /// Whether the field is required
    pub required: bool,
    /// Chosen source header
    pub column: Option<String>,
    /// Confidence of the chosen header, 0 when unmapped
    pub confidence: f64,
    /// Layer that produced the chosen score
    pub layer: Option<MatchLayer>,
    /// Usage status
    pub status: MappingStatus,
    /// Runner-up headers within reach of the chosen score
    pub alternatives: Vec<ColumnCandidate>,
}

/// Counts of mappings per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSummary {
    pub auto_applied: usize,
    pub needs_review: usize,
    pub weak_suggestions: usize,
    pub unmapped: usize,
}

/// Result of mapping a header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingReport {
    /// One mapping per schema field, in schema order
    pub mappings: Vec<FieldMapping>,
    /// Headers not assigned to any field, in input order
    pub unmatched_headers: Vec<String>,
    /// Input headers, in input order
    pub headers: Vec<String>,
    /// Per-status counts
    pub summary: MappingSummary,
}

/// Operator input applied on top of the suggested mappings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingDecisions {
    /// Fields mapped by hand to a specific header
    pub manual: HashMap<SemanticField, String>,
    /// Fields whose review-band or weak suggestion the operator accepted
    pub confirmed: HashSet<SemanticField>,
}

impl MappingDecisions {
    /// Maps a field to a header by hand.
    pub fn with_manual(mut self, field: SemanticField, column: impl Into<String>) -> Self {
        self.manual.insert(field, column.into());
        self
    }

    /// Confirms the suggested mapping for a field.
    pub fn with_confirmed(mut self, field: SemanticField) -> Self {
        self.confirmed.insert(field);
        self
    }
}

/// Final field-to-column assignment used for projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMapping {
    columns: HashMap<SemanticField, String>,
}

impl ResolvedMapping {
    /// Builds a resolved mapping directly, e.g. for pre-normalized exports.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (SemanticField, S)>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(|(f, c)| (f, c.into())).collect(),
        }
    }

    /// Source header for a field.
    pub fn column_for(&self, field: SemanticField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    /// Number of mapped fields.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if no field is mapped.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl MappingReport {
    /// Mapping for a field.
    pub fn mapping(&self, field: SemanticField) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.field == field)
    }

    /// Applies operator decisions.
    ///
    /// Auto-applied mappings are used as-is, review and weak mappings only when
    /// confirmed, and manual overrides always. Fails with
    /// [`WarehouseError::IncompleteMapping`] when a required field is left
    /// without a column.
    pub fn resolve(&self, decisions: &MappingDecisions) -> Result<ResolvedMapping> {
        let mut columns = HashMap::new();
        let mut missing = Vec::new();

        for mapping in &self.mappings {
            let field = mapping.field;
            let column = if let Some(manual) = decisions.manual.get(&field) {
                if !self.headers.iter().any(|h| h == manual) {
                    return Err(WarehouseError::Configuration(format!(
                        "manual mapping for '{field}' names unknown column '{manual}'"
                    )));
                }
                Some(manual.clone())
            } else {
                match mapping.status {
                    MappingStatus::AutoApplied => mapping.column.clone(),
                    MappingStatus::NeedsReview | MappingStatus::WeakSuggestion
                        if decisions.confirmed.contains(&field) =>
                    {
                        mapping.column.clone()
                    }
                    _ => None,
                }
            };

            match column {
                Some(column) => {
                    columns.insert(field, column);
                }
                None if mapping.required => missing.push(field.canonical_name()),
                None => {}
            }
        }

        if !missing.is_empty() {
            warn!(fields = ?missing, "Column mapping is incomplete");
            return Err(WarehouseError::incomplete_mapping(missing));
        }
        Ok(ResolvedMapping { columns })
    }
}

/// Maps export headers onto a [`TargetSchema`].
#[derive(Debug, Clone, Default)]
pub struct ColumnMapper {
    schema: TargetSchema,
}

struct PreparedField<'a> {
    spec: &'a FieldSpec,
    canonical: NormalizedHeader,
    synonyms: Vec<NormalizedHeader>,
    keywords: Vec<String>,
}

struct Scored {
    field: usize,
    header: usize,
    confidence: f64,
    layer: MatchLayer,
}

impl ColumnMapper {
    /// Creates a mapper for a custom schema.
    pub fn new(schema: TargetSchema) -> Self {
        Self { schema }
    }

    /// The target schema.
    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    /// Scores a single header against a field, consulting the layers in order.
    pub fn score(&self, field: SemanticField, header: &str) -> Option<ColumnCandidate> {
        let spec = self.schema.get(field)?;
        let prepared = prepare(spec);
        let normalized = NormalizedHeader::new(header);
        score_pair(&prepared, &normalized).map(|(confidence, layer)| ColumnCandidate {
            column: header.to_string(),
            confidence,
            layer,
        })
    }

    /// Maps a header row. Pure: equal inputs give equal reports.
    #[instrument(skip_all, fields(headers = headers.len(), fields = self.schema.fields().len()))]
    pub fn map_headers<S: AsRef<str>>(&self, headers: &[S]) -> MappingReport {
        let headers: Vec<String> = headers.iter().map(|h| h.as_ref().to_string()).collect();
        let normalized: Vec<NormalizedHeader> =
            headers.iter().map(|h| NormalizedHeader::new(h)).collect();
        let fields: Vec<PreparedField<'_>> = self.schema.fields().iter().map(prepare).collect();

        let mut scored = Vec::new();
        for (fi, field) in fields.iter().enumerate() {
            for (hi, header) in normalized.iter().enumerate() {
                if let Some((confidence, layer)) = score_pair(field, header) {
                    if confidence >= SUGGESTION_THRESHOLD {
                        scored.push(Scored {
                            field: fi,
                            header: hi,
                            confidence,
                            layer,
                        });
                    }
                }
            }
        }
        scored.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.field.cmp(&b.field))
                .then(a.header.cmp(&b.header))
        });

        let mut chosen: Vec<Option<usize>> = vec![None; fields.len()];
        let mut header_taken = vec![false; headers.len()];
        for (idx, candidate) in scored.iter().enumerate() {
            if chosen[candidate.field].is_none() && !header_taken[candidate.header] {
                chosen[candidate.field] = Some(idx);
                header_taken[candidate.header] = true;
            }
        }

        let mut summary = MappingSummary::default();
        let mappings: Vec<FieldMapping> = fields
            .iter()
            .enumerate()
            .map(|(fi, field)| {
                let mapping = match chosen[fi].map(|idx| &scored[idx]) {
                    Some(best) => {
                        let alternatives = scored
                            .iter()
                            .filter(|s| {
                                s.field == fi
                                    && s.header != best.header
                                    && best.confidence - s.confidence <= ALTERNATIVE_WINDOW
                            })
                            .take(MAX_ALTERNATIVES)
                            .map(|s| ColumnCandidate {
                                column: headers[s.header].clone(),
                                confidence: s.confidence,
                                layer: s.layer,
                            })
                            .collect();
                        FieldMapping {
                            field: field.spec.field,
                            required: field.spec.required,
                            column: Some(headers[best.header].clone()),
                            confidence: best.confidence,
                            layer: Some(best.layer),
                            status: MappingStatus::from_confidence(best.confidence),
                            alternatives,
                        }
                    }
                    None => FieldMapping {
                        field: field.spec.field,
                        required: field.spec.required,
                        column: None,
                        confidence: 0.0,
                        layer: None,
                        status: MappingStatus::Unmapped,
                        alternatives: Vec::new(),
                    },
                };
                match mapping.status {
                    MappingStatus::AutoApplied => summary.auto_applied += 1,
                    MappingStatus::NeedsReview => summary.needs_review += 1,
                    MappingStatus::WeakSuggestion => summary.weak_suggestions += 1,
                    MappingStatus::Unmapped => summary.unmapped += 1,
                }
                debug!(
                    field = %mapping.field,
                    column = ?mapping.column,
                    confidence = mapping.confidence,
                    "Field mapped"
                );
                mapping
            })
            .collect();

        let unmatched_headers = headers
            .iter()
            .zip(&header_taken)
            .filter(|(_, taken)| !**taken)
            .map(|(h, _)| h.clone())
            .collect();

        info!(
            auto_applied = summary.auto_applied,
            needs_review = summary.needs_review,
            weak = summary.weak_suggestions,
            unmapped = summary.unmapped,
            "Column mapping complete"
        );

        MappingReport {
            mappings,
            unmatched_headers,
            headers,
            summary,
        }
    }
}

fn prepare(spec: &FieldSpec) -> PreparedField<'_> {
    PreparedField {
        spec,
        canonical: NormalizedHeader::new(spec.canonical_name()),
        synonyms: spec.synonyms.iter().map(|s| NormalizedHeader::new(s)).collect(),
        keywords: spec.keywords.iter().map(|k| k.to_lowercase()).collect(),
    }
}

fn score_pair(field: &PreparedField<'_>, header: &NormalizedHeader) -> Option<(f64, MatchLayer)> {
    if header.is_empty() {
        return None;
    }

    let canonical = &field.canonical.compact;
    if header.compact == *canonical {
        return Some((1.0, MatchLayer::Exact));
    }
    if singular(&header.compact) == singular(canonical) {
        return Some((PLURAL_MATCH, MatchLayer::Exact));
    }

    let canonical_sim = similarity(header, &field.canonical);
    let synonym_sim = field
        .synonyms
        .iter()
        .map(|s| similarity(header, s))
        .fold(0.0_f64, f64::max);
    let fuzzy = canonical_sim.max(SYNONYM_WEIGHT * synonym_sim);
    if fuzzy >= FUZZY_FLOOR {
        return Some((fuzzy.min(FUZZY_CAP), MatchLayer::Fuzzy));
    }

    let hits = header
        .tokens
        .iter()
        .filter(|token| field.keywords.iter().any(|k| keyword_hit(token, k)))
        .count();
    if hits > 0 {
        let confidence = SEMANTIC_BASE + SEMANTIC_SPAN * hits as f64 / header.tokens.len() as f64;
        return Some((confidence, MatchLayer::Semantic));
    }
    None
}
