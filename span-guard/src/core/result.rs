//! Validation result types.

use super::{CheckOutcome, Level};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counters collected during a suite run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Total number of constraints evaluated (or gated)
    pub total_checks: usize,
    /// Number that passed
    pub passed_checks: usize,
    /// Number surfaced as warnings
    pub warned_checks: usize,
    /// Number that failed (including required-table failures)
    pub failed_checks: usize,
    /// Number skipped (optional table or column absent, or suppressed)
    pub skipped_checks: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// Named metric values collected from individual constraints
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_metrics: HashMap<String, f64>,
}

impl ValidationMetrics {
    /// Creates new validation metrics with all counts set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outcome in the counters.
    pub fn record(&mut self, outcome: CheckOutcome) {
        self.total_checks += 1;
        match outcome {
            CheckOutcome::Passed => self.passed_checks += 1,
            CheckOutcome::Warned => self.warned_checks += 1,
            CheckOutcome::Failed | CheckOutcome::FailedRequired => self.failed_checks += 1,
            CheckOutcome::SkippedOptional | CheckOutcome::SkippedColumn => {
                self.skipped_checks += 1
            }
        }
    }

    /// Returns the success rate as a percentage (0.0 to 100.0).
    ///
    /// Warned and skipped constraints count as non-failures but not passes.
    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            100.0
        } else {
            (self.passed_checks as f64 / self.total_checks as f64) * 100.0
        }
    }
}

/// A single non-pass finding from a suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The name of the check that produced the finding
    pub check_name: String,
    /// The table the check is bound to
    pub table_name: String,
    /// The name of the constraint
    pub constraint_name: String,
    /// The severity level of the owning check
    pub level: Level,
    /// The terminal outcome
    pub outcome: CheckOutcome,
    /// A description of the finding
    pub message: String,
    /// Optional metric value associated with the finding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
}

/// A validation report: metrics plus every non-pass finding.
///
/// Skips and suppressed failures appear here too — no outcome is silently
/// swallowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// The name of the validation suite that was run
    pub suite_name: String,
    /// Timestamp when the validation was run (ISO 8601 format)
    pub timestamp: String,
    /// Overall validation metrics
    pub metrics: ValidationMetrics,
    /// Findings collected during validation
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Creates a new validation report.
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            metrics: ValidationMetrics::new(),
            issues: Vec::new(),
        }
    }

    /// Adds a finding to the report.
    pub fn add_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns true if any finding is fatal.
    pub fn has_failures(&self) -> bool {
        self.issues.iter().any(|issue| issue.outcome.is_fatal())
    }

    /// Returns true if any finding is a warning.
    pub fn has_warnings(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.outcome == CheckOutcome::Warned)
    }

    /// Gets all findings with a specific outcome.
    pub fn issues_with_outcome(&self, outcome: CheckOutcome) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.outcome == outcome)
            .collect()
    }
}

/// The result of running a validation suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationResult {
    /// No fatal finding; the report may still contain warnings and skips
    Success {
        /// Validation metrics
        metrics: ValidationMetrics,
        /// Detailed report
        report: ValidationReport,
    },
    /// At least one fatal finding
    Failure {
        /// Detailed report containing the findings
        report: ValidationReport,
    },
}

impl ValidationResult {
    /// Creates a successful validation result.
    pub fn success(metrics: ValidationMetrics, report: ValidationReport) -> Self {
        ValidationResult::Success { metrics, report }
    }

    /// Creates a failed validation result.
    pub fn failure(report: ValidationReport) -> Self {
        ValidationResult::Failure { report }
    }

    /// Returns true if the validation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success { .. })
    }

    /// Returns true if the validation failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, ValidationResult::Failure { .. })
    }

    /// Returns the validation report.
    pub fn report(&self) -> &ValidationReport {
        match self {
            ValidationResult::Success { report, .. } => report,
            ValidationResult::Failure { report } => report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record_outcomes() {
        let mut metrics = ValidationMetrics::new();
        metrics.record(CheckOutcome::Passed);
        metrics.record(CheckOutcome::Warned);
        metrics.record(CheckOutcome::Failed);
        metrics.record(CheckOutcome::FailedRequired);
        metrics.record(CheckOutcome::SkippedOptional);

        assert_eq!(metrics.total_checks, 5);
        assert_eq!(metrics.passed_checks, 1);
        assert_eq!(metrics.warned_checks, 1);
        assert_eq!(metrics.failed_checks, 2);
        assert_eq!(metrics.skipped_checks, 1);
        assert_eq!(metrics.success_rate(), 20.0);
    }

    #[test]
    fn test_report_failure_detection() {
        let mut report = ValidationReport::new("nightly");
        assert!(!report.has_failures());

        report.add_issue(ValidationIssue {
            check_name: "party_integrity".to_string(),
            table_name: "party".to_string(),
            constraint_name: "unique_key".to_string(),
            level: Level::Error,
            outcome: CheckOutcome::Failed,
            message: "2 duplicate keys".to_string(),
            metric: Some(2.0),
        });

        assert!(report.has_failures());
        assert_eq!(report.issues_with_outcome(CheckOutcome::Failed).len(), 1);
    }

    #[test]
    fn test_validation_result() {
        let report = ValidationReport::new("nightly");
        let success = ValidationResult::success(ValidationMetrics::new(), report.clone());
        assert!(success.is_success());
        assert!(!success.is_failure());

        let failure = ValidationResult::failure(report);
        assert!(failure.is_failure());
        assert_eq!(failure.report().suite_name, "nightly");
    }
}
