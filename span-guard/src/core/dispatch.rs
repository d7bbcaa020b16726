//! Severity dispatch: mapping constraint results to terminal check outcomes.

use super::{ConstraintResult, ConstraintStatus, Level};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of one constraint within a check run.
///
/// Outcomes extend the raw [`ConstraintStatus`] with the two gate states
/// (missing table, missing optional column) and fold in the check's severity
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The condition held
    Passed,
    /// A violation or soft finding surfaced as a non-fatal warning
    Warned,
    /// A violation that fails the run
    Failed,
    /// The table is declared required but absent; always fatal, regardless
    /// of the check's severity level
    FailedRequired,
    /// The table is declared optional and absent
    SkippedOptional,
    /// The constraint did not apply (optional column absent, no data) or
    /// its finding was suppressed to informational; the message survives
    /// in the report either way
    SkippedColumn,
}

impl CheckOutcome {
    /// Returns true for the two outcomes that fail a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CheckOutcome::Failed | CheckOutcome::FailedRequired)
    }

    /// Returns true for the skip outcomes.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            CheckOutcome::SkippedOptional | CheckOutcome::SkippedColumn
        )
    }

    /// Returns the string representation of the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Passed => "passed",
            CheckOutcome::Warned => "warned",
            CheckOutcome::Failed => "failed",
            CheckOutcome::FailedRequired => "failed_required",
            CheckOutcome::SkippedOptional => "skipped_optional",
            CheckOutcome::SkippedColumn => "skipped_column",
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a constraint result to its terminal outcome under a severity level.
///
/// - `Failure` under `Error` stays fatal; under `Warning` it is demoted to a
///   warning; under `Info` it is suppressed into a skip-equivalent signal
///   (the message is preserved on the result itself).
/// - `Warning` is always surfaced as [`CheckOutcome::Warned`], regardless of
///   the configured level.
/// - `Success` and `Skipped` are level-independent.
pub fn dispatch(level: Level, result: &ConstraintResult) -> CheckOutcome {
    match result.status {
        ConstraintStatus::Success => CheckOutcome::Passed,
        ConstraintStatus::Warning => CheckOutcome::Warned,
        ConstraintStatus::Skipped => CheckOutcome::SkippedColumn,
        ConstraintStatus::Failure => match level {
            Level::Error => CheckOutcome::Failed,
            Level::Warning => CheckOutcome::Warned,
            Level::Info => CheckOutcome::SkippedColumn,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_dispatch_by_level() {
        let failure = ConstraintResult::failure("violated");
        assert_eq!(dispatch(Level::Error, &failure), CheckOutcome::Failed);
        assert_eq!(dispatch(Level::Warning, &failure), CheckOutcome::Warned);
        assert_eq!(dispatch(Level::Info, &failure), CheckOutcome::SkippedColumn);
    }

    #[test]
    fn test_warning_ignores_level() {
        let warning = ConstraintResult::warning("soft finding");
        assert_eq!(dispatch(Level::Error, &warning), CheckOutcome::Warned);
        assert_eq!(dispatch(Level::Info, &warning), CheckOutcome::Warned);
    }

    #[test]
    fn test_success_and_skip() {
        assert_eq!(
            dispatch(Level::Error, &ConstraintResult::success()),
            CheckOutcome::Passed
        );
        assert_eq!(
            dispatch(Level::Error, &ConstraintResult::skipped("absent")),
            CheckOutcome::SkippedColumn
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(CheckOutcome::Failed.is_fatal());
        assert!(CheckOutcome::FailedRequired.is_fatal());
        assert!(!CheckOutcome::Warned.is_fatal());
        assert!(CheckOutcome::SkippedOptional.is_skip());
    }
}
