//! Ordered-event-sequence validation.

use super::util::{collect_examples, format_examples, scalar_i64};
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Validates that categorical event labels respect a canonical ordering
/// within each group.
///
/// A pair of events violates the ordering when the later-labeled event's
/// timestamp precedes the earlier-labeled event's within the same group.
/// Missing labels are permitted: only the relative order among present
/// events matters, so non-contiguous subsequences are fine. Labels outside
/// the canonical list are ignored.
#[derive(Debug, Clone)]
pub struct EventOrderConstraint {
    table: Arc<TableConfig>,
    group_by: Vec<String>,
    label_column: String,
    timestamp_column: String,
    ordered_labels: Vec<String>,
    max_examples: usize,
}

impl EventOrderConstraint {
    /// Creates an event-order constraint.
    pub fn new<G, S, L, T>(
        table: Arc<TableConfig>,
        group_by: G,
        label_column: impl Into<String>,
        timestamp_column: impl Into<String>,
        ordered_labels: L,
        max_examples: usize,
    ) -> Result<Self>
    where
        G: IntoIterator<Item = S>,
        S: Into<String>,
        L: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let group_by: Vec<String> = group_by.into_iter().map(Into::into).collect();
        let ordered_labels: Vec<String> = ordered_labels.into_iter().map(Into::into).collect();
        if group_by.is_empty() {
            return Err(SpanError::constraint_evaluation(
                "event_order",
                "at least one group column is required",
            ));
        }
        if ordered_labels.len() < 2 {
            return Err(SpanError::constraint_evaluation(
                "event_order",
                "an ordering needs at least two labels",
            ));
        }
        let label_column = label_column.into();
        let timestamp_column = timestamp_column.into();
        for column in group_by.iter().chain([&label_column, &timestamp_column]) {
            SqlSecurity::validate_identifier(column)?;
        }
        Ok(Self {
            table,
            group_by,
            label_column,
            timestamp_column,
            ordered_labels,
            max_examples,
        })
    }

    /// Derived table assigning each canonical label its rank.
    fn ranked_subquery(&self) -> Result<String> {
        let table = SqlSecurity::escape_identifier(self.table.name())?;
        let label = SqlSecurity::escape_identifier(&self.label_column)?;
        let ts = SqlSecurity::escape_identifier(&self.timestamp_column)?;
        let keys = self
            .group_by
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let rank_arms = self
            .ordered_labels
            .iter()
            .enumerate()
            .map(|(rank, value)| {
                Ok(format!("WHEN {} THEN {rank}", SqlSecurity::escape_literal(value)?))
            })
            .collect::<Result<Vec<_>>>()?
            .join(" ");
        let in_list = self
            .ordered_labels
            .iter()
            .map(|value| SqlSecurity::escape_literal(value))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        Ok(format!(
            "SELECT {keys}, {label} AS event_label, {ts} AS event_ts, \
                    CASE {label} {rank_arms} END AS label_rank \
             FROM {table} WHERE {label} IN ({in_list})"
        ))
    }

    fn join_condition(&self) -> Result<String> {
        let mut parts = self
            .group_by
            .iter()
            .map(|c| {
                let escaped = SqlSecurity::escape_identifier(c)?;
                Ok(format!("earlier.{escaped} = later.{escaped}"))
            })
            .collect::<Result<Vec<_>>>()?;
        parts.push("earlier.label_rank < later.label_rank".to_string());
        parts.push("later.event_ts < earlier.event_ts".to_string());
        Ok(parts.join(" AND "))
    }
}

#[async_trait]
impl Constraint for EventOrderConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        table = %self.table.name()
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let ranked = self.ranked_subquery()?;
        let join = self.join_condition()?;

        let count_sql = format!(
            "SELECT COUNT(*) AS violation_count \
             FROM ({ranked}) AS earlier JOIN ({ranked}) AS later ON {join}"
        );
        let violations = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let keys = self
            .group_by
            .iter()
            .map(|c| {
                let escaped = SqlSecurity::escape_identifier(c)?;
                Ok(format!("earlier.{escaped}"))
            })
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let examples_sql = format!(
            "SELECT {keys}, earlier.event_label AS earlier_label, later.event_label AS later_label \
             FROM ({ranked}) AS earlier JOIN ({ranked}) AS later ON {join} \
             LIMIT {max}",
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let message = format!(
            "Found {violations} out-of-order event pairs in '{}' against the ordering [{}]{}",
            self.table.name(),
            self.ordered_labels.join(" -> "),
            format_examples(&examples, violations)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            violations as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        "event_order"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.label_column)
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_columns([&self.label_column, &self.timestamp_column])
            .with_description(format!(
                "Checks that events in '{}' respect the ordering [{}] per ({})",
                self.table.name(),
                self.ordered_labels.join(" -> "),
                self.group_by.join(", ")
            ))
            .with_custom("constraint_type", "sequence")
    }
}
