//! Table configurations and their binding to a live session.

use super::types::ColumnDef;
use crate::error::{Result, SpanError};
use crate::security::SqlSecurity;
use arrow::datatypes::SchemaRef;
use datafusion::prelude::SessionContext;

/// Lifecycle semantics of a table's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Mutable entity whose absence of a terminal deletion implies ongoing
    /// existence (e.g. a party)
    OpenEndedEntity,
    /// Mutable entity whose existence is bounded strictly by observed
    /// timestamps (e.g. a supplementary-data record)
    ClosedEndedEntity,
    /// Immutable point-in-time event rows (e.g. a risk-case event)
    Event,
}

impl TableKind {
    /// Returns true for the two entity kinds that carry validity windows.
    pub fn is_entity(&self) -> bool {
        !matches!(self, TableKind::Event)
    }

    /// Returns true for open-ended entities.
    pub fn is_open_ended(&self) -> bool {
        matches!(self, TableKind::OpenEndedEntity)
    }
}

/// Static description of a table: name, column tree, entity keys, kind,
/// optionality. Created at schema-definition time and immutable afterwards.
#[derive(Debug, Clone)]
pub struct TableConfig {
    name: String,
    columns: Vec<ColumnDef>,
    entity_keys: Vec<String>,
    kind: TableKind,
    optional: bool,
}

impl TableConfig {
    /// Creates a builder for a table configuration.
    pub fn builder(name: impl Into<String>) -> TableConfigBuilder {
        TableConfigBuilder::new(name)
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared columns.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Looks up a declared top-level column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the entity key columns. Empty for event tables.
    pub fn entity_keys(&self) -> &[String] {
        &self.entity_keys
    }

    /// Returns the table kind.
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Returns true if the table may legitimately not exist in a session.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Fetches the actual schema the bound session reports for this table.
    ///
    /// Returns `Ok(None)` when the table is not registered at all; the
    /// caller decides whether that is a skip or a hard failure based on
    /// [`TableConfig::is_optional`].
    pub async fn actual_schema(&self, ctx: &SessionContext) -> Result<Option<SchemaRef>> {
        if !ctx.table_exist(self.name.as_str())? {
            return Ok(None);
        }
        let df = ctx.table(self.name.as_str()).await?;
        Ok(Some(SchemaRef::new(df.schema().as_arrow().clone())))
    }
}

/// Builder for [`TableConfig`].
#[derive(Debug)]
pub struct TableConfigBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    entity_keys: Vec<String>,
    kind: TableKind,
    optional: bool,
}

impl TableConfigBuilder {
    /// Creates a new builder with the given table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            entity_keys: Vec::new(),
            kind: TableKind::Event,
            optional: false,
        }
    }

    /// Adds a column declaration.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds multiple column declarations.
    pub fn columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = ColumnDef>,
    {
        self.columns.extend(columns);
        self
    }

    /// Sets the entity key columns.
    pub fn entity_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the table kind.
    pub fn kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the table as optional.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// Identifier validation happens here once so the SQL builders can
    /// interpolate names from the configuration without re-checking.
    pub fn build(self) -> Result<TableConfig> {
        SqlSecurity::validate_identifier(&self.name)?;
        for column in &self.columns {
            SqlSecurity::validate_identifier(&column.name)?;
        }
        for key in &self.entity_keys {
            SqlSecurity::validate_identifier(key)?;
            if !self.columns.iter().any(|c| &c.name == key) {
                return Err(SpanError::table_configuration(
                    &self.name,
                    format!("entity key column '{key}' is not declared"),
                ));
            }
        }
        if self.kind.is_entity() && self.entity_keys.is_empty() {
            return Err(SpanError::table_configuration(
                &self.name,
                "entity tables require at least one entity key column",
            ));
        }
        Ok(TableConfig {
            name: self.name,
            columns: self.columns,
            entity_keys: self.entity_keys,
            kind: self.kind,
            optional: self.optional,
        })
    }
}
