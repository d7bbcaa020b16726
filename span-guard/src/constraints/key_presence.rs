//! Subset/superset key presence.

use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Validates that one value's presence implies another's for the same
/// composite key.
///
/// Example: an exit event implies a start event existed for the same
/// (risk case, party) key. The check fails for every composite key that
/// carries the subset value without the superset value.
#[derive(Debug, Clone)]
pub struct ImpliedPresenceConstraint {
    table: Arc<TableConfig>,
    key_columns: Vec<String>,
    value_column: String,
    subset_value: String,
    superset_value: String,
    max_examples: usize,
}

impl ImpliedPresenceConstraint {
    /// Creates an implied-presence constraint.
    pub fn new<I, S>(
        table: Arc<TableConfig>,
        key_columns: I,
        value_column: impl Into<String>,
        subset_value: impl Into<String>,
        superset_value: impl Into<String>,
        max_examples: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_columns: Vec<String> = key_columns.into_iter().map(Into::into).collect();
        if key_columns.is_empty() {
            return Err(SpanError::constraint_evaluation(
                "implied_presence",
                "at least one key column is required",
            ));
        }
        let value_column = value_column.into();
        for column in key_columns.iter().chain([&value_column]) {
            SqlSecurity::validate_identifier(column)?;
        }
        Ok(Self {
            table,
            key_columns,
            value_column,
            subset_value: subset_value.into(),
            superset_value: superset_value.into(),
            max_examples,
        })
    }

    fn keyed_subquery(&self, value: &str) -> Result<String> {
        let table = SqlSecurity::escape_identifier(self.table.name())?;
        let column = SqlSecurity::escape_identifier(&self.value_column)?;
        let keys = self
            .key_columns
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        Ok(format!(
            "SELECT DISTINCT {keys} FROM {table} WHERE {column} = {literal}",
            literal = SqlSecurity::escape_literal(value)?
        ))
    }

    fn join_condition(&self) -> Result<String> {
        self.key_columns
            .iter()
            .map(|c| {
                let escaped = SqlSecurity::escape_identifier(c)?;
                Ok(format!("sub.{escaped} = sup.{escaped}"))
            })
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(" AND "))
    }
}

#[async_trait]
impl Constraint for ImpliedPresenceConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name(),
        column = %self.value_column
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let sub = self.keyed_subquery(&self.subset_value)?;
        let sup = self.keyed_subquery(&self.superset_value)?;
        let join = self.join_condition()?;
        let first_key = SqlSecurity::escape_identifier(&self.key_columns[0])?;

        let count_sql = format!(
            "SELECT COUNT(*) AS violation_count \
             FROM ({sub}) AS sub LEFT JOIN ({sup}) AS sup ON {join} \
             WHERE sup.{first_key} IS NULL"
        );
        let violations = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let sub_keys = self
            .key_columns
            .iter()
            .map(|c| {
                let escaped = SqlSecurity::escape_identifier(c)?;
                Ok(format!("sub.{escaped}"))
            })
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let examples_sql = format!(
            "SELECT {sub_keys} \
             FROM ({sub}) AS sub LEFT JOIN ({sup}) AS sup ON {join} \
             WHERE sup.{first_key} IS NULL LIMIT {max}",
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let message = format!(
            "Found {violations} keys in '{}' with '{}' but no '{}'{}",
            self.table.name(),
            self.subset_value,
            self.superset_value,
            format_examples(&examples, violations)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            violations as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        "implied_presence"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.value_column)
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_column(&self.value_column)
            .with_description(format!(
                "Checks that '{}' implies '{}' per ({}) in '{}'",
                self.subset_value,
                self.superset_value,
                self.key_columns.join(", "),
                self.table.name()
            ))
            .with_custom("constraint_type", "key_presence")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::{ColumnDef, ColumnType};
    use crate::test_utils::{event_config, exec};

    async fn events_context(rows: &str) -> (SessionContext, Arc<TableConfig>) {
        let ctx = SessionContext::new();
        exec(
            &ctx,
            "CREATE TABLE risk_case_event \
             (risk_case_id VARCHAR, party_id VARCHAR, event_type VARCHAR)",
        )
        .await
        .unwrap();
        exec(&ctx, &format!("INSERT INTO risk_case_event VALUES {rows}"))
            .await
            .unwrap();
        let config = event_config(
            "risk_case_event",
            vec![
                ColumnDef::nullable("risk_case_id", ColumnType::String),
                ColumnDef::nullable("party_id", ColumnType::String),
                ColumnDef::nullable("event_type", ColumnType::String),
            ],
        );
        (ctx, Arc::new(config))
    }

    fn exit_implies_start(config: Arc<TableConfig>) -> ImpliedPresenceConstraint {
        ImpliedPresenceConstraint::new(
            config,
            ["risk_case_id", "party_id"],
            "event_type",
            "AML_EXIT",
            "AML_PROCESS_START",
            5,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_implied_value_present_passes() {
        let (ctx, config) = events_context(
            "('c1', 'p1', 'AML_PROCESS_START'), ('c1', 'p1', 'AML_EXIT')",
        )
        .await;
        let result = exit_implies_start(config).evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
    }

    #[tokio::test]
    async fn test_missing_superset_value_fails() {
        // c2/p2 exits without ever starting.
        let (ctx, config) = events_context(
            "('c1', 'p1', 'AML_PROCESS_START'), ('c1', 'p1', 'AML_EXIT'), \
             ('c2', 'p2', 'AML_EXIT')",
        )
        .await;
        let result = exit_implies_start(config).evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(1.0));
        assert!(result.message.unwrap().contains("c2"));
    }

    #[tokio::test]
    async fn test_partial_key_match_is_not_enough() {
        // Start exists for c1/p1 but the exit belongs to c1/p2.
        let (ctx, config) = events_context(
            "('c1', 'p1', 'AML_PROCESS_START'), ('c1', 'p2', 'AML_EXIT')",
        )
        .await;
        let result = exit_implies_start(config).evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
    }
}
