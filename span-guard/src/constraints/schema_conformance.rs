//! Column-by-column schema conformance.

use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::Result;
use crate::schema::{compare, TableConfig, TypeComparison};
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Validates that a table's actual schema conforms to its declaration.
///
/// Every declared column is compared structurally against the backend's
/// reported type. A missing required column or a structural mismatch
/// fails; a missing nullable column, extra columns or struct fields, and a
/// stricter-than-declared type warn.
#[derive(Debug, Clone)]
pub struct SchemaConformanceConstraint {
    table: Arc<TableConfig>,
}

impl SchemaConformanceConstraint {
    /// Creates a schema-conformance constraint for the table.
    pub fn new(table: Arc<TableConfig>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Constraint for SchemaConformanceConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name()
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let Some(actual) = self.table.actual_schema(ctx).await? else {
            return Ok(if self.table.is_optional() {
                ConstraintResult::skipped(format!(
                    "Optional table '{}' does not exist",
                    self.table.name()
                ))
            } else {
                ConstraintResult::failure(format!(
                    "Required table '{}' does not exist",
                    self.table.name()
                ))
            });
        };

        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        let mut notes = Vec::new();

        for declared in self.table.columns() {
            let expected = declared.to_arrow_field();
            match actual.field_with_name(&declared.name) {
                Err(_) => {
                    if declared.nullable {
                        warnings.push(format!("nullable column '{}' is absent", declared.name));
                    } else {
                        failures.push(format!("required column '{}' is absent", declared.name));
                    }
                }
                Ok(actual_field) => {
                    let outcome = compare(&expected, actual_field);
                    notes.extend(outcome.notes);
                    match outcome.comparison {
                        TypeComparison::Match => {}
                        TypeComparison::Warn { reasons } => {
                            warnings.extend(
                                reasons
                                    .into_iter()
                                    .map(|r| format!("column '{}': {r}", declared.name)),
                            );
                        }
                        TypeComparison::Fail { reason } => {
                            failures.push(format!("column '{}': {reason}", declared.name));
                        }
                    }
                }
            }
        }

        for actual_field in actual.fields() {
            if self.table.column(actual_field.name()).is_none() {
                warnings.push(format!("undeclared column '{}'", actual_field.name()));
            }
        }

        for note in &notes {
            debug!(table = self.table.name(), note, "Schema comparison note");
        }

        if !failures.is_empty() {
            let message = format!(
                "Schema of '{}' does not conform: {}",
                self.table.name(),
                failures.join("; ")
            );
            warn!("{}", message);
            return Ok(ConstraintResult::failure_with_metric(
                failures.len() as f64,
                message,
            ));
        }
        if !warnings.is_empty() {
            return Ok(ConstraintResult::warning_with_metric(
                warnings.len() as f64,
                format!(
                    "Schema of '{}' deviates benignly: {}",
                    self.table.name(),
                    warnings.join("; ")
                ),
            ));
        }
        Ok(ConstraintResult::success())
    }

    fn name(&self) -> &str {
        "schema_conformance"
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::new()
            .with_description(format!(
                "Checks that '{}' matches its {} declared columns",
                self.table.name(),
                self.table.columns().len()
            ))
            .with_custom("constraint_type", "schema")
    }
}
