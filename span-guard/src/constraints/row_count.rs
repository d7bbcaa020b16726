//! Row-count bounds.

use super::util::scalar_i64;
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::Result;
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fraction of the maximum at which the check starts warning.
const WARN_BAND: f64 = 0.9;

/// Validates that a table's row count is positive and within budget.
///
/// The budget is `base_max * scale`: the base factor describes the expected
/// ceiling at scale 1.0, and the configured scale adapts it to the dataset
/// under validation. An empty table fails; a count inside the top 10% of
/// the budget warns.
#[derive(Debug, Clone)]
pub struct RowCountConstraint {
    table: Arc<TableConfig>,
    base_max: f64,
    scale: f64,
}

impl RowCountConstraint {
    /// Creates a row-count constraint with the given base ceiling and scale.
    pub fn new(table: Arc<TableConfig>, base_max: f64, scale: f64) -> Self {
        Self {
            table,
            base_max,
            scale,
        }
    }

    fn max_rows(&self) -> f64 {
        self.base_max * self.scale
    }
}

#[async_trait]
impl Constraint for RowCountConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name()
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let table = SqlSecurity::escape_identifier(self.table.name())?;
        let sql = format!("SELECT COUNT(*) AS row_count FROM {table}");

        let count = scalar_i64(ctx, &sql, self.name()).await?.unwrap_or(0) as f64;
        let max = self.max_rows();

        debug!(
            table = self.table.name(),
            row_count = count,
            max_rows = max,
            "Evaluated row count"
        );

        if count == 0.0 {
            return Ok(ConstraintResult::failure_with_metric(
                0.0,
                format!("Table '{}' is empty", self.table.name()),
            ));
        }
        if count > max {
            return Ok(ConstraintResult::failure_with_metric(
                count,
                format!(
                    "Table '{}' has {count} rows, above the budget of {max} (base {} x scale {})",
                    self.table.name(),
                    self.base_max,
                    self.scale
                ),
            ));
        }
        if count >= WARN_BAND * max {
            return Ok(ConstraintResult::warning_with_metric(
                count,
                format!(
                    "Table '{}' has {count} rows, within 10% of the budget of {max}",
                    self.table.name()
                ),
            ));
        }
        Ok(ConstraintResult::success_with_metric(count))
    }

    fn name(&self) -> &str {
        "row_count"
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::new()
            .with_description(format!(
                "Checks that '{}' is non-empty and holds at most {} rows",
                self.table.name(),
                self.max_rows()
            ))
            .with_custom("constraint_type", "row_count")
            .with_custom("base_max", self.base_max.to_string())
            .with_custom("scale", self.scale.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::{ColumnDef, ColumnType};
    use crate::test_utils::{event_config, register_int64_table};

    async fn context_with_rows(rows: usize) -> (SessionContext, Arc<TableConfig>) {
        let ctx = SessionContext::new();
        register_int64_table(&ctx, "events", "value", (0..rows as i64).collect());
        let config = event_config(
            "events",
            vec![ColumnDef::nullable("value", ColumnType::Int64)],
        );
        (ctx, Arc::new(config))
    }

    #[tokio::test]
    async fn test_within_budget_passes() {
        let (ctx, config) = context_with_rows(50).await;
        let constraint = RowCountConstraint::new(config, 100.0, 1.0);
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
        assert_eq!(result.metric, Some(50.0));
    }

    #[tokio::test]
    async fn test_empty_table_fails() {
        let (ctx, config) = context_with_rows(0).await;
        let constraint = RowCountConstraint::new(config, 100.0, 1.0);
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert!(result.message.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_over_budget_fails() {
        let (ctx, config) = context_with_rows(120).await;
        let constraint = RowCountConstraint::new(config, 100.0, 1.0);
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
    }

    #[tokio::test]
    async fn test_near_budget_warns() {
        let (ctx, config) = context_with_rows(95).await;
        let constraint = RowCountConstraint::new(config, 100.0, 1.0);
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Warning);
    }

    #[tokio::test]
    async fn test_scale_expands_budget() {
        let (ctx, config) = context_with_rows(120).await;
        let constraint = RowCountConstraint::new(config, 100.0, 2.0);
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
    }
}
