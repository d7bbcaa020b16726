//! Check severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity level of a validation check.
///
/// The level decides how the dispatcher presents a failed constraint:
///
/// - **Error**: the failure fails the run. Use for structural problems —
///   broken referential integrity, duplicate entity keys, schema drift.
/// - **Warning**: the failure is reported but does not fail the run. Use for
///   data-quality findings worth investigating — skewed value frequencies,
///   cardinality drifting toward a bound.
/// - **Info**: the failure is suppressed into a skip-equivalent signal with
///   the message preserved. Use for observational checks.
///
/// Levels are ordered by severity: `Error > Warning > Info`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Informational level
    Info = 0,
    /// Warning level
    Warning = 1,
    /// Error level
    #[default]
    Error = 2,
}

impl Level {
    /// Returns the string representation of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    /// Checks if this level is at least as severe as another level.
    pub fn is_at_least(&self, other: Level) -> bool {
        *self >= other
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error > Level::Warning);
        assert!(Level::Warning > Level::Info);
    }

    #[test]
    fn test_level_default_is_error() {
        assert_eq!(Level::default(), Level::Error);
    }

    #[test]
    fn test_level_display_and_serde() {
        assert_eq!(Level::Warning.to_string(), "warning");
        let json = serde_json::to_string(&Level::Error).unwrap();
        assert_eq!(json, "\"error\"");
        let level: Level = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(level, Level::Info);
    }
}
