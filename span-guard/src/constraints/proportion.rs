//! Value-frequency proportion checks.

use super::bounds::Bounds;
use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::resolve::{column_gate, resolve, ColumnGate, FieldPath};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use arrow::array::Array;
use arrow::array::Float64Array;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Validates the share a value holds among a field's rows.
///
/// With an explicit value, the check computes that value's share; without
/// one, it computes the share of every value and flags each value out of
/// bounds. Shares are taken over non-null rows unless nulls are included
/// explicitly, in which case null is counted as a value of its own. Both
/// forms support grouping, where shares are computed within each group.
#[derive(Debug, Clone)]
pub struct ProportionConstraint {
    table: Arc<TableConfig>,
    path: FieldPath,
    value: Option<String>,
    group_by: Vec<String>,
    bounds: Bounds,
    include_nulls: bool,
    max_examples: usize,
}

impl ProportionConstraint {
    /// Checks the share held by one explicit value.
    pub fn of_value(
        table: Arc<TableConfig>,
        path: impl AsRef<str>,
        value: impl Into<String>,
        bounds: Bounds,
        max_examples: usize,
    ) -> Result<Self> {
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            value: Some(value.into()),
            group_by: Vec::new(),
            bounds,
            include_nulls: false,
            max_examples,
        })
    }

    /// Checks the share of every value of the field.
    pub fn of_each_value(
        table: Arc<TableConfig>,
        path: impl AsRef<str>,
        bounds: Bounds,
        max_examples: usize,
    ) -> Result<Self> {
        Ok(Self {
            table,
            path: FieldPath::parse(path.as_ref())?,
            value: None,
            group_by: Vec::new(),
            bounds,
            include_nulls: false,
            max_examples,
        })
    }

    /// Computes shares within each group instead of over the whole table.
    pub fn grouped_by<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        for column in &self.group_by {
            SqlSecurity::validate_identifier(column)?;
        }
        Ok(self)
    }

    /// Counts null rows in the denominator and, in each-value mode, as a
    /// value of their own.
    pub fn include_nulls(mut self, include: bool) -> Self {
        self.include_nulls = include;
        self
    }

    fn escaped_groups(&self) -> Result<Vec<String>> {
        self.group_by
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect()
    }

    /// Shares of every (group,) value pair as a derived table with columns
    /// `(group..., val, share)`.
    fn shares_subquery(&self, from: &str, expr: &str) -> Result<String> {
        let groups = self.escaped_groups()?;
        let null_filter = if self.include_nulls {
            String::new()
        } else {
            format!(" WHERE {expr} IS NOT NULL")
        };
        let denominator = if self.include_nulls {
            "COUNT(*)".to_string()
        } else {
            format!("COUNT({expr})")
        };

        if groups.is_empty() {
            Ok(format!(
                "SELECT counts.val, CAST(counts.cnt AS DOUBLE) / CAST(totals.total AS DOUBLE) AS share \
                 FROM (SELECT {expr} AS val, COUNT(*) AS cnt FROM {from}{null_filter} GROUP BY {expr}) AS counts \
                 CROSS JOIN (SELECT {denominator} AS total FROM {from}) AS totals"
            ))
        } else {
            let group_list = groups.join(", ");
            let count_groups = groups
                .iter()
                .map(|g| format!("counts.{g}"))
                .collect::<Vec<_>>()
                .join(", ");
            let join_condition = groups
                .iter()
                .map(|g| format!("counts.{g} = totals.{g}"))
                .collect::<Vec<_>>()
                .join(" AND ");
            Ok(format!(
                "SELECT {count_groups}, counts.val, CAST(counts.cnt AS DOUBLE) / CAST(totals.total AS DOUBLE) AS share \
                 FROM (SELECT {group_list}, {expr} AS val, COUNT(*) AS cnt FROM {from}{null_filter} GROUP BY {group_list}, {expr}) AS counts \
                 JOIN (SELECT {group_list}, {denominator} AS total FROM {from} GROUP BY {group_list}) AS totals \
                 ON {join_condition}"
            ))
        }
    }

    /// Per-group share of the explicit value as a derived table with
    /// columns `(group..., share)`. Groups where the denominator is zero
    /// yield a NULL share, which violates no bound.
    fn value_share_subquery(&self, from: &str, expr: &str, literal: &str) -> Result<String> {
        let groups = self.escaped_groups()?;
        let denominator = if self.include_nulls {
            "COUNT(*)".to_string()
        } else {
            format!("COUNT({expr})")
        };
        let share = format!(
            "CAST(SUM(CASE WHEN {expr} = {literal} THEN 1 ELSE 0 END) AS DOUBLE) \
             / NULLIF(CAST({denominator} AS DOUBLE), 0)"
        );
        if groups.is_empty() {
            Ok(format!("SELECT {share} AS share FROM {from}"))
        } else {
            let group_list = groups.join(", ");
            Ok(format!(
                "SELECT {group_list}, {share} AS share FROM {from} GROUP BY {group_list}"
            ))
        }
    }

    async fn evaluate_global_value(
        &self,
        ctx: &SessionContext,
        subquery: &str,
        value: &str,
    ) -> Result<ConstraintResult> {
        let df = ctx.sql(subquery).await?;
        let batches = df.collect().await?;
        let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
            return Ok(ConstraintResult::skipped("No data to validate"));
        };
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                SpanError::constraint_evaluation(self.name(), "share column is not Float64")
            })?;
        if array.is_null(0) {
            return Ok(ConstraintResult::skipped("No rows in the denominator"));
        }
        let share = array.value(0);

        Ok(match self.bounds.violation(share) {
            None => ConstraintResult::success_with_metric(share),
            Some(violation) => {
                let message = format!(
                    "Share of value '{value}' in '{}' of '{}': {violation}",
                    self.path,
                    self.table.name()
                );
                warn!("{}", message);
                ConstraintResult::failure_with_metric(share, message)
            }
        })
    }

    async fn evaluate_violating_rows(
        &self,
        ctx: &SessionContext,
        subquery: &str,
        condition: &str,
        what: &str,
    ) -> Result<ConstraintResult> {
        let count_sql =
            format!("SELECT COUNT(*) AS violation_count FROM ({subquery}) AS shares WHERE {condition}");
        let violations = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let examples_sql = format!(
            "SELECT * FROM ({subquery}) AS shares WHERE {condition} ORDER BY share DESC LIMIT {max}",
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let message = format!(
            "Found {violations} {what} of '{}' in '{}' with share outside {}{}",
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
}

#[async_trait]
impl Constraint for ProportionConstraint {
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

        let Some(condition) = self.bounds.sql_violation("share") else {
            return Ok(ConstraintResult::success());
        };

        match &self.value {
            Some(value) => {
                let literal = SqlSecurity::escape_literal(value)?;
                let subquery =
                    self.value_share_subquery(&resolved.from_clause, &resolved.expr, &literal)?;
                if self.group_by.is_empty() {
                    self.evaluate_global_value(ctx, &subquery, value).await
                } else {
                    self.evaluate_violating_rows(ctx, &subquery, &condition, "groups")
                        .await
                }
            }
            None => {
                let subquery = self.shares_subquery(&resolved.from_clause, &resolved.expr)?;
                self.evaluate_violating_rows(ctx, &subquery, &condition, "values")
                    .await
            }
        }
    }

    fn name(&self) -> &str {
        "value_proportion"
    }

    fn column(&self) -> Option<&str> {
        self.path.is_top_level().then(|| self.path.root())
    }

    fn metadata(&self) -> ConstraintMetadata {
        let subject = match &self.value {
            Some(value) => format!("value '{value}'"),
            None => "every value".to_string(),
        };
        ConstraintMetadata::for_column(self.path.to_string())
            .with_description(format!(
                "Checks that the share of {subject} of '{}' stays within {}",
                self.path, self.bounds
            ))
            .with_custom("constraint_type", "proportion")
            .with_custom("include_nulls", self.include_nulls.to_string())
    }
}
