//! Check type and builder for grouping constraints against one table.

use super::{Constraint, Level};
use crate::config::GuardConfig;
use crate::constraints::{
    Bounds, CardinalityConstraint, CompletenessConstraint, DeletionPattern,
    DeletionPatternConstraint, DuplicateKeyConstraint, EventOrderConstraint,
    ImpliedPresenceConstraint, ProportionConstraint, ReferentialIntegrityConstraint,
    RowCountConstraint, SchemaConformanceConstraint, TemporalIntegrityConstraint,
    ValueRangeConstraint, ValueSetConstraint,
};
use crate::error::{Result, SpanError};
use crate::schema::catalog::VALIDITY_START_TIME;
use crate::schema::TableConfig;
use crate::windows::Tolerance;
use std::sync::Arc;

/// A named group of constraints bound to one table, with a severity level.
///
/// A check is table-scoped by composition: it holds the table
/// configuration, and its constraints hold whatever field paths they need
/// on top of that. The suite gates a check on its table's existence before
/// evaluating any constraint.
///
/// # Examples
///
/// ```rust
/// use span_guard::core::{Check, Level};
/// use span_guard::schema::catalog;
/// use std::sync::Arc;
///
/// # fn example() -> span_guard::error::Result<Check> {
/// let party = Arc::new(catalog::party()?);
/// Check::builder("party_integrity", party)
///     .level(Level::Error)
///     .schema_conformance()
///     .row_count(1_000_000.0)
///     .unique_change_rows()
///     .no_orphan_deletions()
///     .build()
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Check {
    name: String,
    level: Level,
    description: Option<String>,
    table: Arc<TableConfig>,
    constraints: Vec<Arc<dyn Constraint>>,
}

impl Check {
    /// Creates a new builder for a check against the given table.
    pub fn builder(name: impl Into<String>, table: Arc<TableConfig>) -> CheckBuilder {
        CheckBuilder::new(name, table)
    }

    /// Returns the name of the check.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the severity level of the check.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the description of the check if available.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the table this check is bound to.
    pub fn table(&self) -> &Arc<TableConfig> {
        &self.table
    }

    /// Returns the constraints in this check.
    pub fn constraints(&self) -> &[Arc<dyn Constraint>] {
        &self.constraints
    }
}

/// Builder for [`Check`] instances.
///
/// Convenience methods construct the crate's constraints pre-bound to the
/// builder's table and configuration. Constraint construction errors are
/// deferred and surfaced by [`CheckBuilder::build`].
#[derive(Debug)]
pub struct CheckBuilder {
    name: String,
    table: Arc<TableConfig>,
    level: Level,
    description: Option<String>,
    guard: GuardConfig,
    constraints: Vec<Arc<dyn Constraint>>,
    error: Option<SpanError>,
}

impl CheckBuilder {
    /// Creates a new check builder.
    pub fn new(name: impl Into<String>, table: Arc<TableConfig>) -> Self {
        Self {
            name: name.into(),
            table,
            level: Level::default(),
            description: None,
            guard: GuardConfig::default(),
            constraints: Vec::new(),
            error: None,
        }
    }

    /// Sets the severity level. Defaults to [`Level::Error`].
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the validation configuration used by the convenience methods.
    pub fn config(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    /// Adds an already-constructed constraint.
    pub fn with_constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    fn push<C: Constraint + 'static>(mut self, constraint: Result<C>) -> Self {
        match constraint {
            Ok(constraint) => self.constraints.push(Arc::new(constraint)),
            Err(error) => self.error = self.error.or(Some(error)),
        }
        self
    }

    /// Adds a schema-conformance constraint for the table.
    pub fn schema_conformance(mut self) -> Self {
        self.constraints
            .push(Arc::new(SchemaConformanceConstraint::new(self.table.clone())));
        self
    }

    /// Adds a row-count constraint with a base ceiling, scaled by the
    /// configured scale factor.
    pub fn row_count(mut self, base_max: f64) -> Self {
        self.constraints.push(Arc::new(RowCountConstraint::new(
            self.table.clone(),
            base_max,
            self.guard.scale,
        )));
        self
    }

    /// Adds a duplicate-key constraint over the given columns.
    pub fn unique_key<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constraint =
            DuplicateKeyConstraint::new(self.table.clone(), columns, self.guard.max_examples);
        self.push(constraint)
    }

    /// Adds a duplicate-key constraint over the entity keys plus the
    /// validity timestamp: well-formed change logs carry one row per
    /// entity per timestamp.
    pub fn unique_change_rows(self) -> Self {
        let mut columns: Vec<String> = self.table.entity_keys().to_vec();
        columns.push(VALIDITY_START_TIME.to_string());
        self.unique_key(columns)
    }

    /// Adds a global cardinality constraint on a field path.
    pub fn cardinality(self, path: impl AsRef<str>, bounds: Bounds) -> Self {
        let constraint = CardinalityConstraint::global(self.table.clone(), path, bounds);
        self.push(constraint)
    }

    /// Adds a per-group cardinality constraint on a field path.
    pub fn cardinality_per_group<I, S>(
        self,
        path: impl AsRef<str>,
        group_by: I,
        bounds: Bounds,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constraint =
            CardinalityConstraint::per_group(self.table.clone(), path, group_by, bounds);
        self.push(constraint)
    }

    /// Adds a null check on a field path.
    pub fn not_null(self, path: impl AsRef<str>) -> Self {
        let constraint = CompletenessConstraint::nulls(self.table.clone(), path);
        self.push(constraint)
    }

    /// Adds a null-or-blank check on a field path.
    pub fn not_blank(self, path: impl AsRef<str>) -> Self {
        let constraint = CompletenessConstraint::nulls_or_blank(self.table.clone(), path);
        self.push(constraint)
    }

    /// Adds a numeric value-range check.
    pub fn values_between(self, path: impl AsRef<str>, bounds: Bounds) -> Self {
        let constraint =
            ValueRangeConstraint::new(self.table.clone(), path, bounds, self.guard.max_examples);
        self.push(constraint)
    }

    /// Adds a value-set membership check.
    pub fn values_in<I, S>(self, path: impl AsRef<str>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constraint =
            ValueSetConstraint::new(self.table.clone(), path, allowed, self.guard.max_examples);
        self.push(constraint)
    }

    /// Adds a share check for one explicit value.
    pub fn value_share(
        self,
        path: impl AsRef<str>,
        value: impl Into<String>,
        bounds: Bounds,
    ) -> Self {
        let constraint = ProportionConstraint::of_value(
            self.table.clone(),
            path,
            value,
            bounds,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds a share check applied to every value of the field.
    pub fn each_value_share(self, path: impl AsRef<str>, bounds: Bounds) -> Self {
        let constraint = ProportionConstraint::of_each_value(
            self.table.clone(),
            path,
            bounds,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds a consecutive-deletion check on the entity change log.
    pub fn no_consecutive_deletions(self) -> Self {
        let constraint = DeletionPatternConstraint::new(
            self.table.clone(),
            DeletionPattern::Consecutive,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds an orphan-deletion check on the entity change log.
    pub fn no_orphan_deletions(self) -> Self {
        let constraint = DeletionPatternConstraint::new(
            self.table.clone(),
            DeletionPattern::Orphan,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds an ordered-event-sequence check.
    pub fn event_order<G, S, L, T>(
        self,
        group_by: G,
        label_column: impl Into<String>,
        timestamp_column: impl Into<String>,
        ordered_labels: L,
    ) -> Self
    where
        G: IntoIterator<Item = S>,
        S: Into<String>,
        L: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let constraint = EventOrderConstraint::new(
            self.table.clone(),
            group_by,
            label_column,
            timestamp_column,
            ordered_labels,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds a subset/superset key-presence check.
    pub fn implies_presence<I, S>(
        self,
        key_columns: I,
        value_column: impl Into<String>,
        subset_value: impl Into<String>,
        superset_value: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constraint = ImpliedPresenceConstraint::new(
            self.table.clone(),
            key_columns,
            value_column,
            subset_value,
            superset_value,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds a plain referential-integrity check against a remote table.
    pub fn references<I, S>(self, remote: Arc<TableConfig>, key_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constraint = ReferentialIntegrityConstraint::new(
            self.table.clone(),
            remote,
            key_columns,
            self.guard.max_examples,
        );
        self.push(constraint)
    }

    /// Adds temporal referential integrity against a remote table: the
    /// plain key check first, then the window-alignment check, so a
    /// missing key is reported as a missing key rather than as a temporal
    /// misalignment.
    pub fn references_in_time<I, S>(
        self,
        remote: Arc<TableConfig>,
        key_columns: I,
        tolerance: Tolerance,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_columns: Vec<String> = key_columns.into_iter().map(Into::into).collect();
        let guard = self.guard.clone();
        let plain = ReferentialIntegrityConstraint::new(
            self.table.clone(),
            remote.clone(),
            key_columns.clone(),
            guard.max_examples,
        );
        let temporal = TemporalIntegrityConstraint::new(
            self.table.clone(),
            remote,
            key_columns,
            tolerance,
            guard,
        );
        self.push(plain).push(temporal)
    }

    /// Builds the check, surfacing the first construction error if any
    /// convenience method failed.
    pub fn build(self) -> Result<Check> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Check {
            name: self.name,
            level: self.level,
            description: self.description,
            table: self.table,
            constraints: self.constraints,
        })
    }
}
