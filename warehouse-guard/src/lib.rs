//! # warehouse-guard - Inventory Anomaly Detection
//!
//! warehouse-guard inspects inventory snapshots exported from a warehouse
//! management system and reports operational anomalies: pallets stuck in
//! receiving, lots left half put-away, overfilled locations, unresolvable or
//! physically impossible location codes, temperature-sensitive goods in the
//! wrong zone and declared locations whose category contradicts their code.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warehouse_guard::prelude::*;
//! use warehouse_guard::formatters::HumanFormatter;
//!
//! # async fn example(headers: Vec<String>, rows: Vec<RawRow>) -> Result<()> {
//! let engine = AnomalyEngine::default();
//! let context = WarehouseContext::new(WarehouseConfig::from_json_file("warehouse.json")?);
//!
//! // Fuzzy-map the export's headers, then run the default rule set
//! let request = AnalysisRequest::new(headers, rows).with_decisions(
//!     MappingDecisions::default().with_manual(SemanticField::Location, "Bin"),
//! );
//! let report = engine.analyze(request, &context).await?;
//!
//! println!("{}", HumanFormatter::new().format(&report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! 1. **Column mapping** ([`mapping`]): export headers are matched to the
//!    semantic fields of the inventory schema through exact, fuzzy and
//!    keyword layers. Only confident matches are applied automatically; a
//!    required field left unmapped blocks the run.
//! 2. **Projection** ([`core::RecordProjector`]): rows become
//!    [`core::NormalizedRecord`]s.
//! 3. **Location resolution** ([`location`]): every distinct location code is
//!    resolved once per run through configuration, registry, structural
//!    pattern, named pattern and fallback.
//! 4. **Rules** ([`rules`]): each active rule is dispatched to the evaluator
//!    for its anomaly type.
//! 5. **Engine** ([`engine`]): evaluators run on the blocking pool; candidates
//!    are deduplicated so each pallet is reported once, by the rule with the
//!    lowest precedence level.
//!
//! Reports render as JSON, terminal text or Markdown through [`formatters`].

pub mod core;
pub mod engine;
pub mod error;
pub mod formatters;
pub mod location;
pub mod logging;
pub mod mapping;
pub mod prelude;
pub mod rules;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
