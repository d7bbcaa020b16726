//! Validation suite: sequential execution with severity dispatch.

use super::dispatch::{dispatch, CheckOutcome};
use super::result::{ValidationIssue, ValidationMetrics, ValidationReport, ValidationResult};
use super::{Check, ConstraintResult};
use crate::config::GuardConfig;
use crate::error::Result;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Constraint name recorded for the table-existence gate.
const TABLE_PRESENCE: &str = "table_presence";

/// A collection of checks run together against one session.
///
/// Checks run sequentially; each check is first gated on its table's
/// existence, then its constraints are evaluated one by one and their
/// results dispatched under the check's severity level. Every non-pass
/// outcome lands in the report.
///
/// # Examples
///
/// ```rust
/// use span_guard::core::{Check, Level, ValidationSuite};
/// use span_guard::schema::catalog;
/// use std::sync::Arc;
///
/// # fn example() -> span_guard::error::Result<ValidationSuite> {
/// let party = Arc::new(catalog::party()?);
/// let suite = ValidationSuite::builder("nightly")
///     .description("Pre-consumption gate for the analytical schema")
///     .check(
///         Check::builder("party_integrity", party)
///             .level(Level::Error)
///             .schema_conformance()
///             .unique_change_rows()
///             .build()?,
///     )
///     .build();
/// # Ok(suite)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ValidationSuite {
    name: String,
    description: Option<String>,
    guard: GuardConfig,
    checks: Vec<Arc<Check>>,
}

impl ValidationSuite {
    /// Creates a new builder for a validation suite.
    pub fn builder(name: impl Into<String>) -> ValidationSuiteBuilder {
        ValidationSuiteBuilder::new(name)
    }

    /// Returns the name of the suite.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description of the suite if available.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the checks in this suite.
    pub fn checks(&self) -> &[Arc<Check>] {
        &self.checks
    }

    /// Returns the suite's validation configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.guard
    }

    /// Runs the suite against the provided session.
    #[instrument(skip(self, ctx), fields(
        suite.name = %self.name,
        suite.checks = self.checks.len()
    ))]
    pub async fn run(&self, ctx: &SessionContext) -> Result<ValidationResult> {
        info!(
            suite.name = %self.name,
            suite.checks = self.checks.len(),
            suite.description = ?self.description,
            "Starting validation suite"
        );
        let start_time = Instant::now();

        let mut report = ValidationReport::new(&self.name);
        let mut metrics = ValidationMetrics::new();
        let mut has_errors = false;

        for check in &self.checks {
            debug!(
                check.name = %check.name(),
                check.level = ?check.level(),
                check.table = %check.table().name(),
                check.constraints = check.constraints().len(),
                "Running validation check"
            );

            if !ctx.table_exist(check.table().name())? {
                self.record_missing_table(check, &mut report, &mut metrics, &mut has_errors);
                continue;
            }

            for constraint in check.constraints() {
                let result = match constraint.evaluate(ctx).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(
                            constraint.name = %constraint.name(),
                            check.name = %check.name(),
                            error = %e,
                            "Error evaluating constraint"
                        );
                        ConstraintResult::failure(format!("Error evaluating constraint: {e}"))
                    }
                };

                let outcome = dispatch(check.level(), &result);
                metrics.record(outcome);
                if outcome == CheckOutcome::Failed {
                    has_errors = true;
                }

                if let Some(metric) = result.metric {
                    metrics
                        .custom_metrics
                        .insert(format!("{}.{}", check.name(), constraint.name()), metric);
                }

                match outcome {
                    CheckOutcome::Passed => {
                        debug!(
                            constraint.name = %constraint.name(),
                            check.name = %check.name(),
                            constraint.metric = ?result.metric,
                            "Constraint passed"
                        );
                    }
                    outcome => {
                        let message = result.message.clone().unwrap_or_else(|| {
                            format!("Constraint {} did not pass", constraint.name())
                        });
                        warn!(
                            constraint.name = %constraint.name(),
                            check.name = %check.name(),
                            check.level = ?check.level(),
                            outcome = %outcome,
                            message = %message,
                            "Constraint did not pass"
                        );
                        report.add_issue(ValidationIssue {
                            check_name: check.name().to_string(),
                            table_name: check.table().name().to_string(),
                            constraint_name: constraint.name().to_string(),
                            level: check.level(),
                            outcome,
                            message,
                            metric: result.metric,
                        });
                    }
                }
            }
        }

        metrics.execution_time_ms = start_time.elapsed().as_millis() as u64;
        report.metrics = metrics.clone();

        info!(
            suite.name = %self.name,
            metrics.passed = metrics.passed_checks,
            metrics.warned = metrics.warned_checks,
            metrics.failed = metrics.failed_checks,
            metrics.skipped = metrics.skipped_checks,
            metrics.duration_ms = metrics.execution_time_ms,
            suite.result = %if has_errors { "failed" } else { "passed" },
            "Validation suite completed"
        );

        if has_errors {
            Ok(ValidationResult::failure(report))
        } else {
            Ok(ValidationResult::success(metrics, report))
        }
    }

    /// Records the gate outcome for a check whose table is absent.
    ///
    /// An optional table skips the whole check; a required table's absence
    /// is a structurally broken environment and fails the run regardless
    /// of the check's severity level.
    fn record_missing_table(
        &self,
        check: &Check,
        report: &mut ValidationReport,
        metrics: &mut ValidationMetrics,
        has_errors: &mut bool,
    ) {
        let (outcome, message) = if check.table().is_optional() {
            (
                CheckOutcome::SkippedOptional,
                format!(
                    "Optional table '{}' does not exist; {} constraints skipped",
                    check.table().name(),
                    check.constraints().len()
                ),
            )
        } else {
            *has_errors = true;
            (
                CheckOutcome::FailedRequired,
                format!("Required table '{}' does not exist", check.table().name()),
            )
        };

        metrics.record(outcome);
        warn!(
            check.name = %check.name(),
            check.table = %check.table().name(),
            outcome = %outcome,
            "{message}"
        );
        report.add_issue(ValidationIssue {
            check_name: check.name().to_string(),
            table_name: check.table().name().to_string(),
            constraint_name: TABLE_PRESENCE.to_string(),
            level: check.level(),
            outcome,
            message,
            metric: None,
        });
    }
}

/// Builder for [`ValidationSuite`] instances.
#[derive(Debug)]
pub struct ValidationSuiteBuilder {
    name: String,
    description: Option<String>,
    guard: GuardConfig,
    checks: Vec<Arc<Check>>,
}

impl ValidationSuiteBuilder {
    /// Creates a new suite builder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            guard: GuardConfig::default(),
            checks: Vec::new(),
        }
    }

    /// Sets the description for the suite.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the validation configuration for the suite.
    pub fn config(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    /// Adds a check to the suite.
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Adds multiple checks to the suite.
    pub fn checks<I>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = Check>,
    {
        self.checks.extend(checks.into_iter().map(Arc::new));
        self
    }

    /// Builds the suite.
    pub fn build(self) -> ValidationSuite {
        ValidationSuite {
            name: self.name,
            description: self.description,
            guard: self.guard,
            checks: self.checks,
        }
    }
}
