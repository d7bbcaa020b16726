//! Error types for the span-guard validation library.
//!
//! All fallible operations in the crate return [`Result`], whose error type
//! is the [`SpanError`] enum below. Check *outcomes* (pass/warn/fail/skip)
//! are not errors: they are carried by `ConstraintResult` and the validation
//! report. `SpanError` is reserved for infrastructure problems — a query
//! that cannot execute, a malformed field path, an invalid identifier.

use thiserror::Error;

/// The main error type for the span-guard library.
#[derive(Error, Debug)]
pub enum SpanError {
    /// A check could not be constructed or evaluated.
    #[error("Constraint evaluation failed for '{constraint}': {message}")]
    ConstraintEvaluation {
        /// Name of the constraint that failed
        constraint: String,
        /// Detailed error message
        message: String,
    },

    /// Error from DataFusion query planning or execution.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A dotted field path could not be resolved against a table's
    /// declared column tree.
    #[error("Cannot resolve field path '{path}' on table '{table}': {message}")]
    FieldResolution {
        table: String,
        path: String,
        message: String,
    },

    /// A table configuration is unusable for the requested check
    /// (e.g. window reconstruction on a table with no entity keys).
    #[error("Invalid table configuration for '{table}': {message}")]
    TableConfiguration { table: String, message: String },

    /// Error related to validation configuration values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A generated identifier or literal failed security validation.
    #[error("Security error: {0}")]
    Security(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, SpanError>`.
pub type Result<T> = std::result::Result<T, SpanError>;

impl SpanError {
    /// Creates a new constraint evaluation error.
    pub fn constraint_evaluation(
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConstraintEvaluation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Creates a new field resolution error.
    pub fn field_resolution(
        table: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::FieldResolution {
            table: table.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new table configuration error.
    pub fn table_configuration(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TableConfiguration {
            table: table.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_evaluation_error() {
        let err = SpanError::constraint_evaluation("row_count", "query returned no batches");
        assert_eq!(
            err.to_string(),
            "Constraint evaluation failed for 'row_count': query returned no batches"
        );
    }

    #[test]
    fn test_field_resolution_error() {
        let err = SpanError::field_resolution("party", "nationalities.region_code", "not a record");
        assert!(err.to_string().contains("nationalities.region_code"));
        assert!(err.to_string().contains("party"));
    }

    #[test]
    fn test_table_configuration_error() {
        let err = SpanError::table_configuration("risk_case_event", "no entity key columns");
        assert!(err.to_string().contains("risk_case_event"));
    }
}
