//! Numeric value-range checks.

use super::bounds::Bounds;
use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::resolve::{column_gate, resolve, ColumnGate, FieldPath};
use crate::schema::TableConfig;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Flags rows whose field value falls outside an inclusive range.
///
/// Null values are not range violations; pair with a completeness check
/// when the field is also required.
#[derive(Debug, Clone)]
pub struct ValueRangeConstraint {
    table: Arc<TableConfig>,
    path: FieldPath,
    bounds: Bounds,
    max_examples: usize,
}

impl ValueRangeConstraint {
    /// Creates a range constraint over the given bounds.
    pub fn new(
        table: Arc<TableConfig>,
        path: impl AsRef<str>,
        bounds: Bounds,
        max_examples: usize,
    ) -> Result<Self> {
        if bounds.min.is_none() && bounds.max.is_none() {
            return Err(SpanError::constraint_evaluation(
                "value_range",
                "at least one bound is required",
            ));
        }
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            bounds,
            max_examples,
        })
    }
}

#[async_trait]
impl Constraint for ValueRangeConstraint {
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

        let Some(out_of_range) = self.bounds.sql_violation(&resolved.expr) else {
            return Ok(ConstraintResult::success());
        };
        let predicate = format!(
            "{expr} IS NOT NULL AND ({out_of_range})",
            expr = resolved.expr
        );

        let count_sql = format!(
            "SELECT COUNT(*) AS violation_count FROM {from} WHERE {predicate}",
            from = resolved.from_clause
        );
        let violations = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
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
            "Found {violations} rows of '{}' in '{}' outside {}{}",
            self.path,
            self.table.name(),
            self.bounds,
            format_examples(&examples, violations)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            violations as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        "value_range"
    }

    fn column(&self) -> Option<&str> {
        self.path.is_top_level().then(|| self.path.root())
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_column(self.path.to_string())
            .with_description(format!(
                "Checks that '{}' in '{}' stays within {}",
                self.path,
                self.table.name(),
                self.bounds
            ))
            .with_custom("constraint_type", "range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::{ColumnDef, ColumnType};
    use crate::test_utils::{event_config, exec};

    async fn amounts_context() -> (SessionContext, Arc<TableConfig>) {
        let ctx = SessionContext::new();
        exec(&ctx, "CREATE TABLE txn (amount DOUBLE)").await.unwrap();
        exec(
            &ctx,
            "INSERT INTO txn VALUES (10.0), (250.5), (-3.0), (NULL)",
        )
        .await
        .unwrap();
        let config = event_config(
            "txn",
            vec![ColumnDef::nullable("amount", ColumnType::Float64)],
        );
        (ctx, Arc::new(config))
    }

    #[tokio::test]
    async fn test_out_of_range_values_fail_with_examples() {
        let (ctx, config) = amounts_context().await;
        let constraint =
            ValueRangeConstraint::new(config, "amount", Bounds::between(0.0, 100.0), 5).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(2.0));
    }

    #[tokio::test]
    async fn test_nulls_are_not_range_violations() {
        let (ctx, config) = amounts_context().await;
        let constraint =
            ValueRangeConstraint::new(config, "amount", Bounds::between(-10.0, 300.0), 5).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
    }

    #[tokio::test]
    async fn test_single_ended_bound() {
        let (ctx, config) = amounts_context().await;
        let constraint =
            ValueRangeConstraint::new(config, "amount", Bounds::at_least(0.0), 5).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(1.0));
    }

    #[test]
    fn test_unbounded_is_rejected() {
        let config = Arc::new(event_config(
            "txn",
            vec![ColumnDef::nullable("amount", ColumnType::Float64)],
        ));
        assert!(ValueRangeConstraint::new(config, "amount", Bounds::unbounded(), 5).is_err());
    }
}
