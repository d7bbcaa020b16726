//! Null and blank-value detection for possibly nested fields.

use super::util::scalar_i64;
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::Result;
use crate::resolve::{column_gate, resolve, ColumnGate, FieldPath};
use crate::schema::TableConfig;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// What counts as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletenessMode {
    /// Only SQL NULL
    Null,
    /// NULL, or a string that is empty after trimming
    NullOrBlank,
}

/// Flags rows where a field is null (or blank) while its immediate parent
/// container is non-null.
///
/// Rows whose parent container is itself null are excluded: a missing
/// ancestor is one finding, not one per descendant field. List-typed
/// ancestors are flattened, so each list element is inspected separately.
#[derive(Debug, Clone)]
pub struct CompletenessConstraint {
    table: Arc<TableConfig>,
    path: FieldPath,
    mode: CompletenessMode,
}

impl CompletenessConstraint {
    /// Creates a null check on the given path.
    pub fn nulls(table: Arc<TableConfig>, path: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            mode: CompletenessMode::Null,
        })
    }

    /// Creates a null-or-blank check on the given path. Meaningful for
    /// string fields; non-strings fall back to the plain null check.
    pub fn nulls_or_blank(table: Arc<TableConfig>, path: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            mode: CompletenessMode::NullOrBlank,
        })
    }
}

#[async_trait]
impl Constraint for CompletenessConstraint {
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

        let missing = match self.mode {
            CompletenessMode::NullOrBlank if resolved.is_string => format!(
                "({expr} IS NULL OR TRIM({expr}) = '')",
                expr = resolved.expr
            ),
            _ => format!("{expr} IS NULL", expr = resolved.expr),
        };
        let predicate = match &resolved.parent_expr {
            Some(parent) => format!("{parent} IS NOT NULL AND {missing}"),
            None => missing,
        };

        let sql = format!(
            "SELECT COUNT(*) AS violation_count FROM {from} WHERE {predicate}",
            from = resolved.from_clause
        );
        let violations = scalar_i64(ctx, &sql, self.name()).await?.unwrap_or(0);

        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let what = match self.mode {
            CompletenessMode::Null => "null",
            CompletenessMode::NullOrBlank => "null or blank",
        };
        let message = format!(
            "Found {violations} rows with {what} '{}' in '{}'",
            self.path,
            self.table.name()
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            violations as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        match self.mode {
            CompletenessMode::Null => "null_values",
            CompletenessMode::NullOrBlank => "blank_values",
        }
    }

    fn column(&self) -> Option<&str> {
        self.path.is_top_level().then(|| self.path.root())
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_column(self.path.to_string())
            .with_description(format!(
                "Checks that '{}' in '{}' carries a value wherever its parent does",
                self.path,
                self.table.name()
            ))
            .with_custom("constraint_type", "completeness")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConstraintStatus;
    use crate::schema::{ColumnDef, ColumnType};
    use crate::test_utils::{event_config, exec, register_parent_table};

    #[tokio::test]
    async fn test_null_parent_rows_are_excluded() {
        // {parent: null} and {parent: {id: "x"}}: zero violations.
        let ctx = SessionContext::new();
        let config = register_parent_table(&ctx, "records", vec![None, Some(Some("x"))]);
        let constraint = CompletenessConstraint::nulls(Arc::new(config), "parent.id").unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Success);
    }

    #[tokio::test]
    async fn test_null_nested_field_is_flagged() {
        // {parent: null} and {parent: {id: null}}: exactly one violation.
        let ctx = SessionContext::new();
        let config = register_parent_table(&ctx, "records", vec![None, Some(None)]);
        let constraint = CompletenessConstraint::nulls(Arc::new(config), "parent.id").unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Failure);
        assert_eq!(result.metric, Some(1.0));
    }

    #[tokio::test]
    async fn test_top_level_null_check() {
        let ctx = SessionContext::new();
        exec(&ctx, "CREATE TABLE party (occupation VARCHAR)").await.unwrap();
        exec(&ctx, "INSERT INTO party VALUES ('analyst'), (NULL), ('   ')")
            .await
            .unwrap();
        let config = Arc::new(event_config(
            "party",
            vec![ColumnDef::nullable("occupation", ColumnType::String)],
        ));

        let nulls = CompletenessConstraint::nulls(config.clone(), "occupation").unwrap();
        let result = nulls.evaluate(&ctx).await.unwrap();
        assert_eq!(result.metric, Some(1.0));

        let blanks = CompletenessConstraint::nulls_or_blank(config, "occupation").unwrap();
        let result = blanks.evaluate(&ctx).await.unwrap();
        assert_eq!(result.metric, Some(2.0));
    }

    #[tokio::test]
    async fn test_absent_optional_column_skips() {
        let ctx = SessionContext::new();
        exec(&ctx, "CREATE TABLE party (party_id VARCHAR)").await.unwrap();
        let config = Arc::new(event_config(
            "party",
            vec![
                ColumnDef::nullable("party_id", ColumnType::String),
                ColumnDef::nullable("occupation", ColumnType::String),
            ],
        ));
        let constraint = CompletenessConstraint::nulls(config, "occupation").unwrap();
        let result = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(result.status, ConstraintStatus::Skipped);
    }
}
