//! Error types for the warehouse-guard library.
//!
//! All fallible operations return [`WarehouseError`] through the crate-wide
//! [`Result`] alias. Only two conditions are fatal for an analysis run: an
//! incomplete column mapping and unreadable reference data (configuration or
//! registry). Faults inside individual rule evaluators are caught by the engine
//! and surface as run warnings instead.

use thiserror::Error;

/// The main error type for the warehouse-guard library.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// One or more required semantic fields have no usable column mapping.
    ///
    /// This blocks the analysis until the operator supplies a manual mapping
    /// or confirms a suggested one.
    #[error("Incomplete column mapping: no column for required field(s) {}", fields.join(", "))]
    IncompleteMapping {
        /// Canonical names of the required fields left unmapped
        fields: Vec<String>,
    },

    /// A rule definition could not be compiled into a typed rule.
    #[error("Invalid rule '{rule_id}': {message}")]
    InvalidRule {
        /// Identifier of the offending rule
        rule_id: String,
        /// What was wrong with the definition
        message: String,
    },

    /// A rule evaluator failed while producing anomalies.
    #[error("Evaluation failed for rule '{rule_id}': {message}")]
    Evaluation {
        /// Identifier of the rule being evaluated
        rule_id: String,
        /// Detailed error message
        message: String,
    },

    /// Error related to warehouse or engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The persisted location registry could not be read.
    #[error("Location registry error: {message}")]
    Registry {
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, WarehouseError>`.
pub type Result<T> = std::result::Result<T, WarehouseError>;

impl WarehouseError {
    /// Creates an incomplete mapping error for the given field names.
    pub fn incomplete_mapping<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IncompleteMapping {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a new invalid rule error.
    pub fn invalid_rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new evaluation error.
    pub fn evaluation(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new registry error.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new registry error with a source error.
    pub fn registry_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Registry {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true if this error blocks an analysis run until the operator acts.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::IncompleteMapping { .. })
    }
}

impl From<serde_json::Error> for WarehouseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<WarehouseError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            WarehouseError::Internal(inner) => WarehouseError::Internal(format!("{msg}: {inner}")),
            WarehouseError::Configuration(inner) => {
                WarehouseError::Configuration(format!("{msg}: {inner}"))
            }
            other => WarehouseError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                WarehouseError::Internal(inner) => {
                    WarehouseError::Internal(format!("{msg}: {inner}"))
                }
                WarehouseError::Configuration(inner) => {
                    WarehouseError::Configuration(format!("{msg}: {inner}"))
                }
                other => WarehouseError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_incomplete_mapping_message() {
        let err = WarehouseError::incomplete_mapping(["pallet_id", "location"]);
        assert_eq!(
            err.to_string(),
            "Incomplete column mapping: no column for required field(s) pallet_id, location"
        );
        assert!(err.is_blocking());
    }

    #[test]
    fn test_invalid_rule_error() {
        let err = WarehouseError::invalid_rule("R-7", "unknown field `foo`");
        assert_eq!(err.to_string(), "Invalid rule 'R-7': unknown field `foo`");
        assert!(!err.is_blocking());
    }

    #[test]
    fn test_registry_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "table missing");
        let err = WarehouseError::registry_with_source("could not load locations", Box::new(source));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: WarehouseError = parse.unwrap_err().into();
        assert!(matches!(err, WarehouseError::Serialization(_)));
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(WarehouseError::Configuration("max_position_digits out of range".to_string()))
        }

        let err = failing_operation()
            .context("While loading warehouse WH01")
            .unwrap_err();
        assert!(matches!(err, WarehouseError::Configuration(_)));
        assert!(err.to_string().contains("While loading warehouse WH01"));
    }
}
