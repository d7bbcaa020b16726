//! Entity existence window reconstruction.
//!
//! A mutable table is an append-only change log: every row is a new version
//! of an entity, carrying the entity key, the timestamp the version became
//! valid, and a soft-deletion flag. Reconstruction turns that log into one
//! `(entity key, first_date, last_date)` row per entity.
//!
//! The subquery builder orders each entity's rows by validity timestamp,
//! keeps only window boundaries (the first row, the last row, and every
//! deletion-state flip), and aggregates. Intermediate rows with no flip do
//! not change the known existence boundary and are discarded. For an
//! open-ended entity whose final retained row is not deleted, the upper
//! bound is the far-future sentinel: the entity is presumed to persist
//! because it was never closed. An entity whose very first row is already
//! deleted gets a zero-duration window at that timestamp; the window never
//! extends back to time zero. The companion orphan-deletion check flags
//! such malformed data separately.

use crate::config::GuardConfig;
use crate::error::{Result, SpanError};
use crate::schema::catalog::{IS_ENTITY_DELETED, VALIDITY_START_TIME};
use crate::schema::TableConfig;
use crate::security::SqlSecurity;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use tracing::debug;

/// Joins escaped entity key columns for SELECT/GROUP BY/PARTITION BY lists.
pub(crate) fn escaped_keys(config: &TableConfig) -> Result<Vec<String>> {
    config
        .entity_keys()
        .iter()
        .map(|key| SqlSecurity::escape_identifier(key))
        .collect()
}

/// Builds the window-reconstruction subquery for an entity table.
///
/// The produced SQL selects the entity key columns plus `first_date` and
/// `last_date`, one row per entity, and can be embedded as a derived table.
pub fn window_subquery(config: &TableConfig, guard: &GuardConfig) -> Result<String> {
    if !config.kind().is_entity() {
        return Err(SpanError::table_configuration(
            config.name(),
            "window reconstruction requires an entity table, not an event table",
        ));
    }
    let keys = escaped_keys(config)?;
    if keys.is_empty() {
        return Err(SpanError::table_configuration(
            config.name(),
            "window reconstruction requires entity key columns",
        ));
    }

    let key_list = keys.join(", ");
    let table = SqlSecurity::escape_identifier(config.name())?;
    let ts = SqlSecurity::escape_identifier(VALIDITY_START_TIME)?;
    let deleted = SqlSecurity::escape_identifier(IS_ENTITY_DELETED)?;
    let partition = format!("PARTITION BY {key_list} ORDER BY {ts}");

    // Windows are date-valued: the change log orders by full timestamps,
    // the aggregated bounds are calendar dates, and the far-future
    // sentinel stays representable as a date.
    let last_expr = if config.kind().is_open_ended() {
        // A final retained row that is not deleted contributes the sentinel
        // instead of its own timestamp.
        format!(
            "MAX(CASE WHEN next_ts IS NULL AND NOT is_deleted THEN {sentinel} ELSE CAST({ts} AS DATE) END)",
            sentinel = guard.sentinel_literal()
        )
    } else {
        format!("MAX(CAST({ts} AS DATE))")
    };

    let sql = format!(
        "SELECT {key_list}, MIN(CAST({ts} AS DATE)) AS first_date, {last_expr} AS last_date \
         FROM ( \
             SELECT * \
             FROM ( \
                 SELECT {key_list}, {ts}, \
                        COALESCE({deleted}, FALSE) AS is_deleted, \
                        ROW_NUMBER() OVER ({partition}) AS rn, \
                        LEAD({ts}) OVER ({partition}) AS next_ts, \
                        LAG(COALESCE({deleted}, FALSE)) OVER ({partition}) AS prev_deleted \
                 FROM {table} \
             ) AS changes \
             WHERE rn = 1 \
                OR next_ts IS NULL \
                OR is_deleted IS DISTINCT FROM prev_deleted \
         ) AS boundaries \
         GROUP BY {key_list}"
    );

    debug!(table = config.name(), "Built window reconstruction subquery");
    Ok(sql)
}

/// Builds the window subquery with the sentinel upper bound normalized back
/// to NULL, for comparisons where "never closed" must mean "no upper bound"
/// rather than a far-future date.
pub fn normalized_window_subquery(config: &TableConfig, guard: &GuardConfig) -> Result<String> {
    let inner = window_subquery(config, guard)?;
    let keys = escaped_keys(config)?.join(", ");
    Ok(format!(
        "SELECT {keys}, first_date, \
                CASE WHEN last_date >= {sentinel} THEN NULL ELSE last_date END AS last_date \
         FROM ({inner}) AS windows",
        sentinel = guard.sentinel_literal()
    ))
}

/// Reconstructs the windows of an entity table and materializes them.
///
/// One row per entity, ordered by the entity key columns. Windows are
/// computed fresh on every call; nothing is persisted.
pub async fn reconstruct_windows(
    ctx: &SessionContext,
    config: &TableConfig,
    guard: &GuardConfig,
) -> Result<Vec<RecordBatch>> {
    let subquery = window_subquery(config, guard)?;
    let keys = escaped_keys(config)?.join(", ");
    let sql = format!("SELECT * FROM ({subquery}) AS windows ORDER BY {keys}");
    let df = ctx.sql(&sql).await?;
    Ok(df.collect().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType, TableKind};

    fn link_config() -> TableConfig {
        TableConfig::builder("account_party_link")
            .column(ColumnDef::required("account_id", ColumnType::String))
            .column(ColumnDef::required("party_id", ColumnType::String))
            .column(ColumnDef::required(VALIDITY_START_TIME, ColumnType::Timestamp))
            .column(ColumnDef::nullable(IS_ENTITY_DELETED, ColumnType::Boolean))
            .entity_keys(["account_id", "party_id"])
            .kind(TableKind::OpenEndedEntity)
            .build()
            .unwrap()
    }

    #[test]
    fn test_subquery_shape() {
        let config = link_config();
        let sql = window_subquery(&config, &GuardConfig::default()).unwrap();
        assert!(sql.contains("PARTITION BY \"account_id\", \"party_id\""));
        assert!(sql.contains("COALESCE(\"is_entity_deleted\", FALSE)"));
        assert!(sql.contains("IS DISTINCT FROM prev_deleted"));
        assert!(sql.contains("DATE '9995-01-01'"));
        assert!(sql.contains("MIN(CAST(\"validity_start_time\" AS DATE)) AS first_date"));
    }

    #[test]
    fn test_closed_ended_has_no_sentinel() {
        let config = TableConfig::builder("transaction")
            .column(ColumnDef::required("transaction_id", ColumnType::String))
            .column(ColumnDef::required(VALIDITY_START_TIME, ColumnType::Timestamp))
            .column(ColumnDef::nullable(IS_ENTITY_DELETED, ColumnType::Boolean))
            .entity_keys(["transaction_id"])
            .kind(TableKind::ClosedEndedEntity)
            .build()
            .unwrap();
        let sql = window_subquery(&config, &GuardConfig::default()).unwrap();
        assert!(!sql.contains("9995-01-01"));
        assert!(sql.contains("MAX(CAST(\"validity_start_time\" AS DATE)) AS last_date"));
    }

    #[test]
    fn test_event_table_is_rejected() {
        let config = TableConfig::builder("risk_case_event")
            .column(ColumnDef::required("risk_case_event_id", ColumnType::String))
            .kind(TableKind::Event)
            .build()
            .unwrap();
        assert!(window_subquery(&config, &GuardConfig::default()).is_err());
    }

    #[test]
    fn test_normalized_subquery_nulls_the_sentinel() {
        let config = link_config();
        let sql = normalized_window_subquery(&config, &GuardConfig::default()).unwrap();
        assert!(sql.contains("THEN NULL ELSE last_date END"));
    }
}
