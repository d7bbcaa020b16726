//! SQL generation safety utilities.
//!
//! Every identifier and literal interpolated into a generated query passes
//! through this module first.

use crate::error::{Result, SpanError};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a SQL identifier (table or column name) without escaping it.
    ///
    /// Identifiers must start with a letter or underscore and contain only
    /// letters, digits, and underscores. Dots are accepted between segments
    /// so qualified names validate as a whole.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() || identifier.trim().is_empty() {
            return Err(SpanError::Security(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > 128 {
            return Err(SpanError::Security(
                "SQL identifier too long (max 128 characters)".to_string(),
            ));
        }

        if identifier.contains('\0') {
            return Err(SpanError::Security(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            // This regex is compile-time constant and known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(SpanError::Security(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, underscores, and dots"
            )));
        }

        Ok(())
    }

    /// Validates and escapes a SQL identifier for direct interpolation.
    ///
    /// The identifier is wrapped in double quotes with any internal double
    /// quotes doubled.
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Escapes a string value as a SQL literal (single quotes doubled).
    ///
    /// Null bytes are rejected outright rather than escaped.
    pub fn escape_literal(value: &str) -> Result<String> {
        if value.contains('\0') {
            return Err(SpanError::Security(
                "SQL literal cannot contain null bytes".to_string(),
            ));
        }
        let escaped = value.replace('\'', "''");
        Ok(format!("'{escaped}'"))
    }
}
