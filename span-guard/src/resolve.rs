//! Field resolution: dotted column paths to query expressions.
//!
//! A path like `nationalities.region_code` may cross repeated-list levels.
//! List levels are flattened, never indexed: each list-typed ancestor
//! injects an `unnest` step into a derived table, and navigation continues
//! on the flattened column. The resolver walks the *declared* column tree;
//! whether the backend actually has the column is a separate gate decided
//! by the level-1 column's declared nullability.

use crate::error::{Result, SpanError};
use crate::schema::{ColumnDef, TableConfig};
use crate::security::SqlSecurity;
use arrow::datatypes::Schema;
use std::fmt;

/// A parsed dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses and validates a dotted path.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(SpanError::Security(
                "field path cannot be empty".to_string(),
            ));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        for segment in &segments {
            SqlSecurity::validate_identifier(segment)?;
        }
        Ok(Self { segments })
    }

    /// The first (level-1) segment: the top-level column the path enters
    /// the table through.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for a plain top-level column reference.
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A resolved field: the FROM clause to query (rewritten with one
/// flattening step per list-typed ancestor) and the terminal expression
/// navigable from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Table name or derived-table expression, ready for `FROM {..}`
    pub from_clause: String,
    /// Terminal field expression
    pub expr: String,
    /// Expression of the field's immediate parent container, valid in the
    /// same FROM clause; `None` for top-level columns
    pub parent_expr: Option<String>,
    /// Whether the terminal expression is declared as a string type
    pub is_string: bool,
}

/// Outcome of the level-1 column gate against the actual schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnGate {
    /// The column exists; proceed.
    Present,
    /// The column is absent and its declaration is nullable: the check
    /// does not apply.
    SkipOptional(String),
    /// The column is absent but required. The check proceeds so the
    /// backend's own resolution error surfaces as a failure.
    MissingRequired,
}

/// Decides whether a check on `path` should run, skip, or fail loudly,
/// based on the level-1 column's presence in the actual schema and its
/// declared nullability.
pub fn column_gate(config: &TableConfig, actual: &Schema, path: &FieldPath) -> ColumnGate {
    if actual.field_with_name(path.root()).is_ok() {
        return ColumnGate::Present;
    }
    match config.column(path.root()) {
        Some(declared) if declared.nullable => ColumnGate::SkipOptional(format!(
            "optional column '{}' absent from table '{}'",
            path.root(),
            config.name()
        )),
        _ => ColumnGate::MissingRequired,
    }
}

/// Resolves a full path against a table configuration.
pub fn resolve(config: &TableConfig, path: &FieldPath) -> Result<ResolvedField> {
    walk(config, path, path.depth())
}

/// Resolves a prefix of the path to the given nesting `level` (number of
/// segments consumed), reusing the same traversal truncated at that depth.
pub fn resolve_prefix(config: &TableConfig, path: &FieldPath, level: usize) -> Result<ResolvedField> {
    if level == 0 || level > path.depth() {
        return Err(SpanError::field_resolution(
            config.name(),
            path.to_string(),
            format!("prefix level {level} out of range"),
        ));
    }
    walk(config, path, level)
}

fn walk(config: &TableConfig, path: &FieldPath, upto: usize) -> Result<ResolvedField> {
    let segments = &path.segments()[..upto];
    let root = &segments[0];

    let mut def: &ColumnDef = config.column(root).ok_or_else(|| {
        SpanError::field_resolution(
            config.name(),
            path.to_string(),
            format!("column '{root}' is not declared"),
        )
    })?;

    let mut from_clause = SqlSecurity::escape_identifier(config.name())?;
    let mut expr = SqlSecurity::escape_identifier(root)?;
    let mut parent_expr = None;
    let mut flatten_level = 0usize;

    for segment in &segments[1..] {
        // Flatten every list level before indexing into the element.
        while def.column_type.is_list() {
            let alias = format!("__flat{flatten_level}");
            from_clause = format!(
                "(SELECT *, unnest({expr}) AS {alias} FROM {from_clause}) AS __lvl{flatten_level}"
            );
            expr = alias;
            def = def.column_type.element().ok_or_else(|| {
                SpanError::field_resolution(config.name(), path.to_string(), "empty list element")
            })?;
            flatten_level += 1;
        }

        let child = def.column_type.child(segment).ok_or_else(|| {
            SpanError::field_resolution(
                config.name(),
                path.to_string(),
                format!(
                    "'{segment}' is not a field of '{}' (type is not a record or lacks the field)",
                    def.name
                ),
            )
        })?;
        parent_expr = Some(expr.clone());
        expr = format!("{expr}['{segment}']");
        def = child;
    }

    Ok(ResolvedField {
        from_clause,
        expr,
        parent_expr,
        is_string: matches!(def.column_type, crate::schema::ColumnType::String),
    })
}
