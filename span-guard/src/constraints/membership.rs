//! Value-set membership.

use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::resolve::{column_gate, resolve, ColumnGate, FieldPath};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Flags rows whose field value is not in an allowed set.
///
/// Null values are not membership violations; pair this with a
/// completeness check when the field is also required.
#[derive(Debug, Clone)]
pub struct ValueSetConstraint {
    table: Arc<TableConfig>,
    path: FieldPath,
    allowed: Vec<String>,
    max_examples: usize,
}

impl ValueSetConstraint {
    /// Creates a membership constraint over the given allowed values.
    pub fn new<I, S>(
        table: Arc<TableConfig>,
        path: impl AsRef<str>,
        allowed: I,
        max_examples: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
        if allowed.is_empty() {
            return Err(SpanError::constraint_evaluation(
                "value_set",
                "the allowed set cannot be empty",
            ));
        }
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            allowed,
            max_examples,
        })
    }

    fn allowed_list(&self) -> Result<String> {
        let literals: Result<Vec<String>> = self
            .allowed
            .iter()
            .map(|v| SqlSecurity::escape_literal(v))
            .collect();
        Ok(literals?.join(", "))
    }
}

#[async_trait]
impl Constraint for ValueSetConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name(),
        column = %self.path
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        if let Some(actual) = self.table.actual_schema(ctx).await? {
            if let ColumnGate::SkipOptional(reason) = column_gate(&self.table, &actual, &self.path)
            {
                return Ok(ConstraintResult::skipped(reason));
            }
        }
        let resolved = resolve(&self.table, &self.path)?;
        let allowed = self.allowed_list()?;

        let predicate = format!(
            "{expr} IS NOT NULL AND {expr} NOT IN ({allowed})",
            expr = resolved.expr
        );
        let sql = format!(
            "SELECT COUNT(*) AS violation_count FROM {from} WHERE {predicate}",
            from = resolved.from_clause
        );
        let violations = scalar_i64(ctx, &sql, self.name()).await?.unwrap_or(0);

        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let examples_sql = format!(
            "SELECT DISTINCT {expr} FROM {from} WHERE {predicate} LIMIT {max}",
            expr = resolved.expr,
            from = resolved.from_clause,
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let message = format!(
            "Found {violations} rows of '{}' in '{}' outside the allowed set{}",
            self.path,
            self.table.name(),
            format_examples(&examples, violations)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            violations as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        "value_set"
    }

    fn column(&self) -> Option<&str> {
        self.path.is_top_level().then(|| self.path.root())
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_column(self.path.to_string())
            .with_description(format!(
                "Checks that '{}' in '{}' only takes {} allowed values",
                self.path,
                self.table.name(),
                self.allowed.len()
            ))
            .with_custom("constraint_type", "membership")
    }
}
