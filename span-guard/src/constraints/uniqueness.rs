//! Duplicate-key detection.

use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Validates that a column projection contains no duplicate rows.
///
/// The table is grouped by the projection; the check fails when the
/// distinct-row count differs from the total row count, reporting the
/// difference and the most-duplicated key values.
#[derive(Debug, Clone)]
pub struct DuplicateKeyConstraint {
    table: Arc<TableConfig>,
    columns: Vec<String>,
    max_examples: usize,
}

impl DuplicateKeyConstraint {
    /// Creates a duplicate-key constraint over the given columns.
    pub fn new<I, S>(table: Arc<TableConfig>, columns: I, max_examples: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(SpanError::constraint_evaluation(
                "duplicate_keys",
                "at least one column must be specified",
            ));
        }
        for column in &columns {
            SqlSecurity::validate_identifier(column)?;
        }
        Ok(Self {
            table,
            columns,
            max_examples,
        })
    }

    /// The projection expression used for the distinct count. Multi-column
    /// projections are concatenated with a null marker so NULLs compare
    /// consistently.
    fn projection(&self) -> Result<String> {
        let escaped: Result<Vec<String>> = self
            .columns
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect();
        let escaped = escaped?;
        if escaped.len() == 1 {
            Ok(escaped[0].clone())
        } else {
            Ok(escaped
                .iter()
                .map(|c| format!("COALESCE(CAST({c} AS VARCHAR), '<NULL>')"))
                .collect::<Vec<_>>()
                .join(" || '|' || "))
        }
    }
}

#[async_trait]
impl Constraint for DuplicateKeyConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name(),
        columns = ?self.columns
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let table = SqlSecurity::escape_identifier(self.table.name())?;
        let projection = self.projection()?;

        let sql = format!(
            "SELECT COUNT(*) - COUNT(DISTINCT {projection}) AS duplicate_count FROM {table}"
        );
        let Some(duplicates) = scalar_i64(ctx, &sql, self.name()).await? else {
            return Ok(ConstraintResult::skipped("No data to validate"));
        };

        if duplicates == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let key_list = self
            .columns
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let examples_sql = format!(
            "SELECT {key_list} FROM {table} \
             GROUP BY {key_list} HAVING COUNT(*) > 1 \
             ORDER BY COUNT(*) DESC LIMIT {max}",
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let message = format!(
            "Found {duplicates} duplicate rows in '{}' over columns ({}){}",
            self.table.name(),
            self.columns.join(", "),
            format_examples(&examples, duplicates)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            duplicates as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        "duplicate_keys"
    }

    fn column(&self) -> Option<&str> {
        if self.columns.len() == 1 {
            Some(&self.columns[0])
        } else {
            None
        }
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_columns(&self.columns)
            .with_description(format!(
                "Checks that ({}) is duplicate-free in '{}'",
                self.columns.join(", "),
                self.table.name()
            ))
            .with_custom("constraint_type", "uniqueness")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::{ColumnDef, ColumnType};
    use crate::test_utils::{event_config, exec};

    fn ledger_config() -> Arc<TableConfig> {
        Arc::new(event_config(
            "ledger",
            vec![
                ColumnDef::nullable("entity_key", ColumnType::String),
                ColumnDef::nullable("seq", ColumnType::Int64),
            ],
        ))
    }

    async fn ledger_context(rows: &str) -> SessionContext {
        let ctx = SessionContext::new();
        exec(&ctx, "CREATE TABLE ledger (entity_key VARCHAR, seq BIGINT)")
            .await
            .unwrap();
        exec(&ctx, &format!("INSERT INTO ledger VALUES {rows}"))
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_exact_duplicate_count() {
        // [(a,1),(a,1),(b,2)] grouped by both columns: exactly 1 duplicate.
        let ctx = ledger_context("('a', 1), ('a', 1), ('b', 2)").await;
        let constraint = DuplicateKeyConstraint::new(ledger_config(), ["entity_key", "seq"], 10).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(1.0));
        assert!(result.message.unwrap().contains("1 duplicate"));
    }

    #[tokio::test]
    async fn test_unique_rows_pass() {
        let ctx = ledger_context("('a', 1), ('b', 2)").await;
        let constraint = DuplicateKeyConstraint::new(ledger_config(), ["entity_key", "seq"], 10).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
    }

    #[tokio::test]
    async fn test_single_column_duplicates() {
        let ctx = ledger_context("('a', 1), ('a', 2), ('a', 3)").await;
        let constraint = DuplicateKeyConstraint::new(ledger_config(), ["entity_key"], 10).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(2.0));
    }

    #[test]
    fn test_requires_columns() {
        assert!(DuplicateKeyConstraint::new(ledger_config(), Vec::<String>::new(), 10).is_err());
    }
}
