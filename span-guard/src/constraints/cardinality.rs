//! Distinct-value cardinality bounds.

use super::bounds::Bounds;
use super::util::scalar_i64;
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::resolve::{column_gate, resolve, ColumnGate, FieldPath};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use arrow::array::Array;
use arrow::array::Int64Array;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Validates that the number of distinct values of a field stays within
/// bounds, either globally or within every group.
///
/// In grouped mode the bounds apply to each group's own distinct count: the
/// check fails when the smallest group count is below the minimum or the
/// largest is above the maximum.
#[derive(Debug, Clone)]
pub struct CardinalityConstraint {
    table: Arc<TableConfig>,
    path: FieldPath,
    group_by: Vec<String>,
    bounds: Bounds,
}

impl CardinalityConstraint {
    /// Creates a global cardinality constraint.
    pub fn global(table: Arc<TableConfig>, path: impl AsRef<str>, bounds: Bounds) -> Result<Self> {
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            group_by: Vec::new(),
            bounds,
        })
    }

    /// Creates a per-group cardinality constraint.
    pub fn per_group<I, S>(
        table: Arc<TableConfig>,
        path: impl AsRef<str>,
        group_by: I,
        bounds: Bounds,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group_by: Vec<String> = group_by.into_iter().map(Into::into).collect();
        if group_by.is_empty() {
            return Err(SpanError::constraint_evaluation(
                "cardinality",
                "per-group cardinality requires at least one group column",
            ));
        }
        for column in &group_by {
            SqlSecurity::validate_identifier(column)?;
        }
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            group_by,
            bounds,
        })
    }
}

#[async_trait]
impl Constraint for CardinalityConstraint {
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

        if self.group_by.is_empty() {
            let sql = format!(
                "SELECT COUNT(DISTINCT {expr}) AS distinct_count FROM {from}",
                expr = resolved.expr,
                from = resolved.from_clause
            );
            let distinct = scalar_i64(ctx, &sql, self.name()).await?.unwrap_or(0) as f64;
            debug!(distinct_count = distinct, "Evaluated global cardinality");
            return Ok(match self.bounds.violation(distinct) {
                None => ConstraintResult::success_with_metric(distinct),
                Some(violation) => ConstraintResult::failure_with_metric(
                    distinct,
                    format!(
                        "Distinct count of '{}' in '{}': {violation}",
                        self.path,
                        self.table.name()
                    ),
                ),
            });
        }

        let group_list = self
            .group_by
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "SELECT MIN(distinct_count) AS min_count, MAX(distinct_count) AS max_count FROM ( \
                 SELECT {group_list}, COUNT(DISTINCT {expr}) AS distinct_count \
                 FROM {from} GROUP BY {group_list} \
             ) AS grouped",
            expr = resolved.expr,
            from = resolved.from_clause
        );

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;
        let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
            return Ok(ConstraintResult::skipped("No data to validate"));
        };
        let extract = |index: usize| -> Result<Option<i64>> {
            let array = batch
                .column(index)
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| {
                    SpanError::constraint_evaluation(self.name(), "aggregate column is not Int64")
                })?;
            Ok(if array.is_null(0) {
                None
            } else {
                Some(array.value(0))
            })
        };
        let (Some(min_count), Some(max_count)) = (extract(0)?, extract(1)?) else {
            return Ok(ConstraintResult::skipped("No data to validate"));
        };

        debug!(min_count, max_count, "Evaluated per-group cardinality");

        let violation = self
            .bounds
            .violation(min_count as f64)
            .or_else(|| self.bounds.violation(max_count as f64));
        Ok(match violation {
            None => ConstraintResult::success_with_metric(max_count as f64),
            Some(violation) => ConstraintResult::failure_with_metric(
                max_count as f64,
                format!(
                    "Per-group distinct count of '{}' in '{}' (grouped by {}): {violation}",
                    self.path,
                    self.table.name(),
                    self.group_by.join(", ")
                ),
            ),
        })
    }

    fn name(&self) -> &str {
        "cardinality"
    }

    fn column(&self) -> Option<&str> {
        None
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_column(self.path.to_string())
            .with_description(format!(
                "Checks that distinct counts of '{}' stay within {}",
                self.path, self.bounds
            ))
            .with_custom("constraint_type", "cardinality")
            .with_custom("grouped", (!self.group_by.is_empty()).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::{ColumnDef, ColumnType};
    use crate::test_utils::{event_config, exec};

    async fn accounts_context() -> (SessionContext, Arc<TableConfig>) {
        let ctx = SessionContext::new();
        exec(&ctx, "CREATE TABLE accounts (account_id VARCHAR, party_id VARCHAR)")
            .await
            .unwrap();
        exec(
            &ctx,
            "INSERT INTO accounts VALUES \
             ('a1', 'p1'), ('a1', 'p2'), ('a2', 'p1'), ('a2', 'p2'), ('a2', 'p3')",
        )
        .await
        .unwrap();
        let config = event_config(
            "accounts",
            vec![
                ColumnDef::nullable("account_id", ColumnType::String),
                ColumnDef::nullable("party_id", ColumnType::String),
            ],
        );
        (ctx, Arc::new(config))
    }

    #[tokio::test]
    async fn test_global_within_bounds() {
        let (ctx, config) = accounts_context().await;
        let constraint =
            CardinalityConstraint::global(config, "party_id", Bounds::between(1.0, 5.0)).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
        assert_eq!(result.metric, Some(3.0));
    }

    #[tokio::test]
    async fn test_global_above_max_fails() {
        let (ctx, config) = accounts_context().await;
        let constraint =
            CardinalityConstraint::global(config, "party_id", Bounds::at_most(2.0)).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert!(result.message.unwrap().contains("above the maximum"));
    }

    #[tokio::test]
    async fn test_per_group_bounds() {
        let (ctx, config) = accounts_context().await;
        // a1 links 2 parties, a2 links 3.
        let within = CardinalityConstraint::per_group(
            config.clone(),
            "party_id",
            ["account_id"],
            Bounds::between(2.0, 3.0),
        )
        .unwrap();
        assert_eq!(
            within.evaluate(&ctx).await.unwrap().status,
            ConstraintStatus::Success
        );

        let too_tight = CardinalityConstraint::per_group(
            config,
            "party_id",
            ["account_id"],
            Bounds::at_most(2.0),
        )
        .unwrap();
        let result = too_tight.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
    }

    #[test]
    fn test_per_group_requires_columns() {
        let config = Arc::new(event_config(
            "accounts",
            vec![ColumnDef::nullable("party_id", ColumnType::String)],
        ));
        assert!(CardinalityConstraint::per_group(
            config,
            "party_id",
            Vec::<String>::new(),
            Bounds::unbounded()
        )
        .is_err());
    }
}
