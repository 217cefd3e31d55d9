//! Prelude for commonly used types and traits in warehouse-guard.

pub use crate::core::{AnalysisReport, Anomaly, AnomalyType, NormalizedRecord, Priority, RawRow};
pub use crate::engine::{AnalysisRequest, AnomalyEngine, EngineConfig, WarehouseContext};
pub use crate::error::{ErrorContext, Result, WarehouseError};
pub use crate::formatters::{FormatterConfig, ReportFormatter};
pub use crate::location::{LocationCategory, LocationRegistry, WarehouseConfig};
pub use crate::logging::LogConfig;
pub use crate::mapping::{MappingDecisions, SemanticField};
pub use crate::rules::{RuleDefinition, RuleSet};
