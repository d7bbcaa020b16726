//! Test fixtures: in-memory tables and table configurations.
//!
//! Small fixtures are created through SQL DDL/DML against the session, the
//! same way operators register data; bulk and nested fixtures go through
//! `MemTable` directly.

use crate::error::Result;
use crate::schema::catalog::{IS_ENTITY_DELETED, VALIDITY_START_TIME};
use crate::schema::{ColumnDef, ColumnType, TableConfig, TableKind};
use arrow::array::{ArrayRef, Int64Array, StringArray, StructArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::sync::Arc;

/// Executes a statement and drains its results.
pub async fn exec(ctx: &SessionContext, sql: &str) -> Result<()> {
    ctx.sql(sql).await?.collect().await?;
    Ok(())
}

/// Builds an event-kind table configuration with all-nullable columns.
pub fn event_config(name: &str, columns: Vec<ColumnDef>) -> TableConfig {
    TableConfig::builder(name)
        .columns(columns)
        .kind(TableKind::Event)
        .build()
        .expect("test table config must build")
}

/// Builds the standard change-log configuration: a string entity key plus
/// the validity columns.
pub fn change_log_config(name: &str, kind: TableKind) -> TableConfig {
    TableConfig::builder(name)
        .column(ColumnDef::required("entity_id", ColumnType::String))
        .column(ColumnDef::required(VALIDITY_START_TIME, ColumnType::Timestamp))
        .column(ColumnDef::nullable(IS_ENTITY_DELETED, ColumnType::Boolean))
        .entity_keys(["entity_id"])
        .kind(kind)
        .build()
        .expect("test table config must build")
}

/// DDL matching [`change_log_config`].
pub fn change_log_ddl(name: &str) -> String {
    format!(
        "CREATE TABLE {name} (entity_id VARCHAR, {VALIDITY_START_TIME} TIMESTAMP, {IS_ENTITY_DELETED} BOOLEAN)"
    )
}

/// Registers a single-column Int64 table backed by a `MemTable`.
pub fn register_int64_table(ctx: &SessionContext, name: &str, column: &str, values: Vec<i64>) {
    let schema = Arc::new(Schema::new(vec![Field::new(column, DataType::Int64, false)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(values))])
        .expect("test batch must build");
    let provider = MemTable::try_new(schema, vec![vec![batch]]).expect("test table must build");
    ctx.register_table(name, Arc::new(provider))
        .expect("test table registration");
}

/// A row of the nested-parent fixture: `None` means the parent record is
/// null; `Some(inner)` is a parent whose `id` field is `inner`.
pub type ParentRow = Option<Option<&'static str>>;

/// Registers a table with one nullable struct column `parent {id: string}`
/// and returns the matching configuration.
pub fn register_parent_table(
    ctx: &SessionContext,
    name: &str,
    rows: Vec<ParentRow>,
) -> TableConfig {
    let id_values: Vec<Option<&str>> = rows.iter().map(|r| r.flatten()).collect();
    let id_array: ArrayRef = Arc::new(StringArray::from(id_values));
    let parent_nulls = NullBuffer::from_iter(rows.iter().map(|r| r.is_some()));

    let id_field = Arc::new(Field::new("id", DataType::Utf8, true));
    let struct_array = StructArray::new(
        Fields::from(vec![id_field.clone()]),
        vec![id_array],
        Some(parent_nulls),
    );

    let parent_field = Field::new(
        "parent",
        DataType::Struct(Fields::from(vec![id_field])),
        true,
    );
    let schema = Arc::new(Schema::new(vec![parent_field]));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(struct_array)])
        .expect("test batch must build");
    let provider = MemTable::try_new(schema, vec![vec![batch]]).expect("test table must build");
    ctx.register_table(name, Arc::new(provider))
        .expect("test table registration");

    TableConfig::builder(name)
        .column(ColumnDef::nullable(
            "parent",
            ColumnType::Record(vec![ColumnDef::nullable("id", ColumnType::String)]),
        ))
        .kind(TableKind::Event)
        .build()
        .expect("test table config must build")
}
