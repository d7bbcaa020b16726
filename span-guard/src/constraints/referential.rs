//! Referential integrity between related tables, plain and temporal.

use super::util::{collect_examples, format_examples, scalar_i64};
use crate::config::GuardConfig;
use crate::core::{Constraint, ConstraintMetadata, ConstraintResult};
use crate::error::{Result, SpanError};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use crate::windows::{normalized_window_subquery, Tolerance};
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{instrument, warn};

fn validate_keys(keys: &[String]) -> Result<()> {
    if keys.is_empty() {
        return Err(SpanError::constraint_evaluation(
            "referential_integrity",
            "at least one key column is required",
        ));
    }
    for key in keys {
        SqlSecurity::validate_identifier(key)?;
    }
    Ok(())
}

fn join_condition(keys: &[String], left: &str, right: &str) -> Result<String> {
    keys.iter()
        .map(|key| {
            let escaped = SqlSecurity::escape_identifier(key)?;
            Ok(format!("{left}.{escaped} = {right}.{escaped}"))
        })
        .collect::<Result<Vec<_>>>()
        .map(|parts| parts.join(" AND "))
}

/// Validates that every key present in a local table also exists in a
/// remote table.
///
/// Local rows with a null key component are not violations here; null keys
/// are the completeness check's finding. This check is also the companion
/// of [`TemporalIntegrityConstraint`]: it runs first so a missing key is
/// reported as a missing key, not as a temporal misalignment.
#[derive(Debug, Clone)]
pub struct ReferentialIntegrityConstraint {
    local: Arc<TableConfig>,
    remote: Arc<TableConfig>,
    key_columns: Vec<String>,
    max_examples: usize,
}

impl ReferentialIntegrityConstraint {
    /// Creates a plain referential-integrity constraint over shared key
    /// column names.
    pub fn new<I, S>(
        local: Arc<TableConfig>,
        remote: Arc<TableConfig>,
        key_columns: I,
        max_examples: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_columns: Vec<String> = key_columns.into_iter().map(Into::into).collect();
        validate_keys(&key_columns)?;
        Ok(Self {
            local,
            remote,
            key_columns,
            max_examples,
        })
    }

    fn keyed_subquery(&self, config: &TableConfig, require_non_null: bool) -> Result<String> {
        let table = SqlSecurity::escape_identifier(config.name())?;
        let escaped = self
            .key_columns
            .iter()
            .map(|c| SqlSecurity::escape_identifier(c))
            .collect::<Result<Vec<_>>>()?;
        let keys = escaped.join(", ");
        let filter = if require_non_null {
            let non_null = escaped
                .iter()
                .map(|c| format!("{c} IS NOT NULL"))
                .collect::<Vec<_>>()
                .join(" AND ");
            format!(" WHERE {non_null}")
        } else {
            String::new()
        };
        Ok(format!("SELECT DISTINCT {keys} FROM {table}{filter}"))
    }
}

#[async_trait]
impl Constraint for ReferentialIntegrityConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        local = %self.local.name(),
        remote = %self.remote.name()
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let local = self.keyed_subquery(&self.local, true)?;
        let remote = self.keyed_subquery(&self.remote, false)?;
        let join = join_condition(&self.key_columns, "l", "r")?;
        let first_key = SqlSecurity::escape_identifier(&self.key_columns[0])?;

        let count_sql = format!(
            "SELECT COUNT(*) AS missing_count \
             FROM ({local}) AS l LEFT JOIN ({remote}) AS r ON {join} \
             WHERE r.{first_key} IS NULL"
        );
        let missing = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
        if missing == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let local_keys = self
            .key_columns
            .iter()
            .map(|c| Ok(format!("l.{}", SqlSecurity::escape_identifier(c)?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let examples_sql = format!(
            "SELECT {local_keys} \
             FROM ({local}) AS l LEFT JOIN ({remote}) AS r ON {join} \
             WHERE r.{first_key} IS NULL LIMIT {max}",
            max = self.max_examples
        );
        let examples = collect_examples(ctx, &examples_sql, self.name(), self.max_examples).await?;

        let message = format!(
            "Found {missing} keys ({}) in '{}' missing from '{}'{}",
            self.key_columns.join(", "),
            self.local.name(),
            self.remote.name(),
            format_examples(&examples, missing)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(missing as f64, message))
    }

    fn name(&self) -> &str {
        "referential_integrity"
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_columns(self.key_columns.to_vec())
            .with_description(format!(
                "Checks that keys of '{}' exist in '{}'",
                self.local.name(),
                self.remote.name()
            ))
            .with_custom("constraint_type", "referential")
    }
}

/// Validates that entity lifetimes in a local table stay within the
/// lifetimes of the referenced entities in a remote table, under an
/// optional calendar tolerance.
///
/// Both sides' validity windows are reconstructed and joined on the key; a
/// row is a violation when the local window's `first_date` or `last_date`
/// falls outside `[remote.first - tolerance, remote.last + tolerance]`.
/// The far-future sentinel upper bound is normalized to NULL before the
/// comparison, so an open-ended side never exceeds, and is never exceeded
/// by, another open-ended side. Keys that do not join at all are the plain
/// referential-integrity check's finding.
#[derive(Debug, Clone)]
pub struct TemporalIntegrityConstraint {
    local: Arc<TableConfig>,
    remote: Arc<TableConfig>,
    key_columns: Vec<String>,
    tolerance: Tolerance,
    guard: GuardConfig,
}

impl TemporalIntegrityConstraint {
    /// Creates a temporal referential-integrity constraint. The key
    /// columns must be entity keys on both sides so they appear in the
    /// reconstructed windows.
    pub fn new<I, S>(
        local: Arc<TableConfig>,
        remote: Arc<TableConfig>,
        key_columns: I,
        tolerance: Tolerance,
        guard: GuardConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_columns: Vec<String> = key_columns.into_iter().map(Into::into).collect();
        validate_keys(&key_columns)?;
        for (config, side) in [(&local, "local"), (&remote, "remote")] {
            for key in &key_columns {
                if !config.entity_keys().contains(key) {
                    return Err(SpanError::table_configuration(
                        config.name(),
                        format!("'{key}' is not an entity key of the {side} table"),
                    ));
                }
            }
        }
        Ok(Self {
            local,
            remote,
            key_columns,
            tolerance,
            guard,
        })
    }

    fn violation_predicate(&self) -> String {
        let (low, high) = if self.tolerance.is_zero() {
            ("r.first_date".to_string(), "r.last_date".to_string())
        } else {
            let interval = self.tolerance.interval_literal();
            (
                format!("r.first_date - {interval}"),
                format!("r.last_date + {interval}"),
            )
        };
        // NULL bounds drop out under three-valued logic: an unbounded side
        // is never exceeded.
        format!(
            "l.first_date < {low} OR l.first_date > {high} \
             OR l.last_date < {low} OR l.last_date > {high}"
        )
    }
}

#[async_trait]
impl Constraint for TemporalIntegrityConstraint {
    #[instrument(skip(self, ctx), fields(
        constraint.name = %self.name(),
        local = %self.local.name(),
        remote = %self.remote.name(),
        tolerance = %self.tolerance
    ))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult> {
        let local = normalized_window_subquery(&self.local, &self.guard)?;
        let remote = normalized_window_subquery(&self.remote, &self.guard)?;
        let join = join_condition(&self.key_columns, "l", "r")?;
        let predicate = self.violation_predicate();

        let count_sql = format!(
            "SELECT COUNT(*) AS violation_count \
             FROM ({local}) AS l JOIN ({remote}) AS r ON {join} \
             WHERE {predicate}"
        );
        let violations = scalar_i64(ctx, &count_sql, self.name()).await?.unwrap_or(0);
        if violations == 0 {
            return Ok(ConstraintResult::success_with_metric(0.0));
        }

        let local_keys = self
            .key_columns
            .iter()
            .map(|c| Ok(format!("l.{}", SqlSecurity::escape_identifier(c)?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let examples_sql = format!(
            "SELECT {local_keys}, l.first_date, l.last_date, \
                    r.first_date AS remote_first_date, r.last_date AS remote_last_date \
             FROM ({local}) AS l JOIN ({remote}) AS r ON {join} \
             WHERE {predicate} LIMIT {max}",
            max = self.guard.max_examples
        );
        let examples =
            collect_examples(ctx, &examples_sql, self.name(), self.guard.max_examples).await?;

        let message = format!(
            "Found {violations} entities of '{}' whose lifetime leaves the '{}' window \
             (tolerance {}){}",
            self.local.name(),
            self.remote.name(),
            self.tolerance,
            format_examples(&examples, violations)
        );
        warn!("{}", message);
        Ok(ConstraintResult::failure_with_metric(
            violations as f64,
            message,
        ))
    }

    fn name(&self) -> &str {
        "temporal_integrity"
    }

    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::for_columns(self.key_columns.to_vec())
            .with_description(format!(
                "Checks that '{}' lifetimes stay within '{}' lifetimes ({} tolerance)",
                self.local.name(),
                self.remote.name(),
                self.tolerance
            ))
            .with_custom("constraint_type", "referential")
            .with_custom("tolerance", self.tolerance.to_string())
    }
}
