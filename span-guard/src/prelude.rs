//! Prelude for commonly used types in span-guard.

pub use crate::config::GuardConfig;
pub use crate::core::{
    Check, CheckOutcome, ConstraintResult, ConstraintStatus, Level, ValidationResult,
    ValidationSuite,
};
pub use crate::error::{Result, SpanError};
pub use crate::logging::LogConfig;
pub use crate::schema::{ColumnDef, ColumnType, TableConfig, TableKind};
pub use crate::windows::Tolerance;
