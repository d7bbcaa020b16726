//! Deletion-pattern checks over entity change logs.

use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::schema::catalog::{IS_ENTITY_DELETED, VALIDITY_START_TIME};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use crate::windows::escaped_keys;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// The deletion pattern being hunted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPattern {
    /// An entity deleted while already deleted: the previous change row
    /// for the same entity also carried the deletion flag.
    Consecutive,
    /// An entity whose first-ever change row is a deletion: there is no
    /// prior existing row to delete.
    Orphan,
}

impl DeletionPattern {
    fn as_str(&self) -> &'static str {
        match self {
            DeletionPattern::Consecutive => "consecutive_deletion",
            DeletionPattern::Orphan => "orphan_deletion",
        }
    }
}

/// Flags malformed deletion sequences in an entity change log.
///
/// Uses the same lag-over-ordered-partition technique as window
/// reconstruction: each row sees the deletion flag of the previous row for
/// the same entity, with a null deletion flag read as "not deleted".
#[derive(Debug, Clone)]
pub struct DeletionPatternConstraint {
    table: Arc<TableConfig>,
    pattern: DeletionPattern,
    max_examples: usize,
}

impl DeletionPatternConstraint {
    /// Creates a deletion-pattern constraint for an entity table.
    pub fn new(
        table: Arc<TableConfig>,
        pattern: DeletionPattern,
        max_examples: usize,
    ) -> Result<Self> {
        if !table.kind().is_entity() {
            return Err(SpanError::table_configuration(
                table.name(),
                "deletion patterns only apply to entity tables",
            ));
        }
        Ok(Self {
            table,
            pattern,
            max_examples,
        })
    }

    fn ordered_subquery(&self) -> Result<String> {
        let keys = escaped_keys(&self.table)?.join(", ");
        let table = SqlSecurity::escape_identifier(self.table.name())?;
        let ts = SqlSecurity::escape_identifier(VALIDITY_START_TIME)?;
        let deleted = SqlSecurity::escape_identifier(IS_ENTITY_DELETED)?;
        Ok(format!(
            "SELECT {keys}, {ts}, \
                    COALESCE({deleted}, FALSE) AS is_deleted, \
                    LAG(COALESCE({deleted}, FALSE)) OVER (PARTITION BY {keys} ORDER BY {ts}) AS prev_deleted \
             FROM {table}"
        ))
    }

    fn violation_predicate(&self) -> &'static str {
        match self.pattern {
            DeletionPattern::Consecutive => "is_deleted AND prev_deleted",
            DeletionPattern::Orphan => "is_deleted AND prev_deleted IS NULL",
        }
    }
}

#[async_trait]
impl Constraint for DeletionPatternConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name()
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let subquery = self.ordered_subquery()?;
        let predicate = self.violation_predicate();

        let count_sql = format!(
            "SELECT COUNT(*) AS violation_count FROM ({subquery}) AS ordered WHERE {predicate}"
        );
        let violations = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let keys = escaped_keys(&self.table)?.join(", ");
        let examples_sql = format!(
            "SELECT {keys} FROM ({subquery}) AS ordered WHERE {predicate} LIMIT {max}",
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let what = match self.pattern {
            DeletionPattern::Consecutive => "deletions of already-deleted entities",
            DeletionPattern::Orphan => "deletions with no prior existing row",
        };
        let message = format!(
            "Found {violations} {what} in '{}'{}",
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
        self.pattern.as_str()
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_columns(self.table.entity_keys().to_vec())
            .with_description(format!(
                "Checks '{}' for {} rows",
                self.table.name(),
                self.pattern.as_str()
            ))
            .with_custom("constraint_type", "lifecycle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::TableKind;
    use crate::test_utils::{change_log_config, change_log_ddl, exec};

    async fn change_log_context(rows: &str) -> (SessionContext, Arc<TableConfig>) {
        let ctx = SessionContext::new();
        exec(&ctx, &change_log_ddl("party")).await.unwrap();
        exec(&ctx, &format!("INSERT INTO party VALUES {rows}")).await.unwrap();
        (
            ctx,
            Arc::new(change_log_config("party", TableKind::OpenEndedEntity)),
        )
    }

    #[tokio::test]
    async fn test_orphan_deletion_flagged_once() {
        // First-ever row for p1 is already deleted.
        let (ctx, config) = change_log_context(
            "('p1', TIMESTAMP '2020-01-01T00:00:00', TRUE), \
             ('p2', TIMESTAMP '2020-01-01T00:00:00', FALSE)",
        )
        .await;
        let constraint =
            DeletionPatternConstraint::new(config, DeletionPattern::Orphan, 5).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(1.0));
        assert!(result.message.unwrap().contains("p1"));
    }

    #[tokio::test]
    async fn test_consecutive_deletion_flagged() {
        let (ctx, config) = change_log_context(
            "('p1', TIMESTAMP '2020-01-01T00:00:00', FALSE), \
             ('p1', TIMESTAMP '2020-02-01T00:00:00', TRUE), \
             ('p1', TIMESTAMP '2020-03-01T00:00:00', TRUE)",
        )
        .await;
        let constraint =
            DeletionPatternConstraint::new(config, DeletionPattern::Consecutive, 5).unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(1.0));
    }

    #[tokio::test]
    async fn test_wellformed_log_passes_both() {
        let (ctx, config) = change_log_context(
            "('p1', TIMESTAMP '2020-01-01T00:00:00', FALSE), \
             ('p1', TIMESTAMP '2020-02-01T00:00:00', NULL), \
             ('p1', TIMESTAMP '2020-03-01T00:00:00', TRUE)",
        )
        .await;
        for pattern in [DeletionPattern::Orphan, DeletionPattern::Consecutive] {
            let constraint =
                DeletionPatternConstraint::new(config.clone(), pattern, 5).unwrap();
            let result = constraint.evaluate(&ctx).await.unwrap();
            assert_eq!(result.status, ConstraintStatus::Success);
        }
    }

    #[test]
    fn test_event_table_rejected() {
        let config = Arc::new(crate::test_utils::event_config("events", vec![]));
        assert!(
            DeletionPatternConstraint::new(config, DeletionPattern::Orphan, 5).is_err()
        );
    }
}
