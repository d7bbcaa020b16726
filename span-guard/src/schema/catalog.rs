//! Built-in table configurations for the analytical schema.
//!
//! The schema models parties, their accounts, transactions against those
//! accounts, and risk-case events, with temporal validity and soft deletion
//! on the mutable tables. Callers are free to define their own
//! [`TableConfig`] values; these definitions cover the fixed schema the
//! framework is normally pointed at.

use super::table::{TableConfig, TableKind};
use super::types::{ColumnDef, ColumnType};
use crate::error::Result;

/// Column shared by every mutable table: when this version of the row
/// became valid.
pub const VALIDITY_START_TIME: &str = "validity_start_time";

/// Column shared by every mutable table: soft-deletion flag, null meaning
/// not deleted.
pub const IS_ENTITY_DELETED: &str = "is_entity_deleted";

/// Canonical ordering of risk-case event labels. Later labels must not
/// precede earlier ones in time within the same (risk case, party) group;
/// absent labels are permitted.
pub const RISK_CASE_EVENT_ORDER: [&str; 5] = [
    "AML_PROCESS_START",
    "AML_SUSPECTED_CONTINUE",
    "AML_SAR",
    "AML_EXIT",
    "AML_PROCESS_END",
];

fn validity_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::required(VALIDITY_START_TIME, ColumnType::Timestamp),
        ColumnDef::nullable(IS_ENTITY_DELETED, ColumnType::Boolean),
    ]
}

fn region_code_list(name: &str) -> ColumnDef {
    ColumnDef::nullable(
        name,
        ColumnType::List(Box::new(ColumnDef::nullable(
            "item",
            ColumnType::Record(vec![ColumnDef::nullable("region_code", ColumnType::String)]),
        ))),
    )
}

fn amount_record(name: &str) -> ColumnDef {
    ColumnDef::nullable(
        name,
        ColumnType::Record(vec![
            ColumnDef::nullable("units", ColumnType::Int64),
            ColumnDef::nullable("nanos", ColumnType::Int64),
            ColumnDef::nullable("currency_code", ColumnType::String),
        ]),
    )
}

/// The party table: open-ended entities keyed by `party_id`.
pub fn party() -> Result<TableConfig> {
    TableConfig::builder("party")
        .column(ColumnDef::required("party_id", ColumnType::String))
        .columns(validity_columns())
        .column(ColumnDef::nullable("type", ColumnType::String))
        .column(ColumnDef::nullable("birth_date", ColumnType::Date))
        .column(ColumnDef::nullable("establishment_date", ColumnType::Date))
        .column(ColumnDef::nullable("occupation", ColumnType::String))
        .column(ColumnDef::nullable("gender", ColumnType::String))
        .column(region_code_list("nationalities"))
        .column(region_code_list("residencies"))
        .column(ColumnDef::nullable("exit_status", ColumnType::String))
        .column(ColumnDef::nullable("join_date", ColumnType::Date))
        .column(ColumnDef::nullable("civil_status_code", ColumnType::String))
        .column(ColumnDef::nullable("education_level_code", ColumnType::String))
        .entity_keys(["party_id"])
        .kind(TableKind::OpenEndedEntity)
        .build()
}

/// The account-party link table: open-ended link entities keyed by
/// `(account_id, party_id)`.
pub fn account_party_link() -> Result<TableConfig> {
    TableConfig::builder("account_party_link")
        .column(ColumnDef::required("account_id", ColumnType::String))
        .column(ColumnDef::required("party_id", ColumnType::String))
        .columns(validity_columns())
        .column(ColumnDef::nullable("role", ColumnType::String))
        .entity_keys(["account_id", "party_id"])
        .kind(TableKind::OpenEndedEntity)
        .build()
}

/// The transaction table: closed-ended entities keyed by `transaction_id`.
pub fn transaction() -> Result<TableConfig> {
    TableConfig::builder("transaction")
        .column(ColumnDef::required("transaction_id", ColumnType::String))
        .columns(validity_columns())
        .column(ColumnDef::required("account_id", ColumnType::String))
        .column(ColumnDef::nullable("counterparty_account", ColumnType::Record(vec![
            ColumnDef::nullable("account_id", ColumnType::String),
            ColumnDef::nullable("region_code", ColumnType::String),
        ])))
        .column(ColumnDef::required("type", ColumnType::String))
        .column(ColumnDef::nullable("direction", ColumnType::String))
        .column(ColumnDef::required("book_time", ColumnType::Timestamp))
        .column(amount_record("normalized_booked_amount"))
        .entity_keys(["transaction_id"])
        .kind(TableKind::ClosedEndedEntity)
        .build()
}

/// The risk-case event table: immutable point-in-time events.
pub fn risk_case_event() -> Result<TableConfig> {
    TableConfig::builder("risk_case_event")
        .column(ColumnDef::required("risk_case_event_id", ColumnType::String))
        .column(ColumnDef::required("event_time", ColumnType::Timestamp))
        .column(ColumnDef::required("type", ColumnType::String))
        .column(ColumnDef::required("risk_case_id", ColumnType::String))
        .column(ColumnDef::required("party_id", ColumnType::String))
        .kind(TableKind::Event)
        .build()
}

/// The optional party supplementary data table: closed-ended entities keyed
/// by `(party_supplementary_data_id, party_id)`.
pub fn party_supplementary_data() -> Result<TableConfig> {
    TableConfig::builder("party_supplementary_data")
        .column(ColumnDef::required(
            "party_supplementary_data_id",
            ColumnType::String,
        ))
        .column(ColumnDef::required("party_id", ColumnType::String))
        .columns(validity_columns())
        .column(ColumnDef::nullable("supplementary_data_payload", ColumnType::Record(vec![
            ColumnDef::nullable("value", ColumnType::Float64),
        ])))
        .entity_keys(["party_supplementary_data_id", "party_id"])
        .kind(TableKind::ClosedEndedEntity)
        .optional(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_builds() {
        let tables = [
            party().unwrap(),
            account_party_link().unwrap(),
            transaction().unwrap(),
            risk_case_event().unwrap(),
            party_supplementary_data().unwrap(),
        ];
        assert_eq!(tables.len(), 5);
        assert!(tables[4].is_optional());
    }

    #[test]
    fn test_entity_keys_and_kinds() {
        let link = account_party_link().unwrap();
        assert_eq!(link.entity_keys(), ["account_id", "party_id"]);
        assert!(link.kind().is_open_ended());

        let txn = transaction().unwrap();
        assert!(txn.kind().is_entity());
        assert!(!txn.kind().is_open_ended());

        let events = risk_case_event().unwrap();
        assert!(!events.kind().is_entity());
    }

    #[test]
    fn test_nested_declarations() {
        let party = party().unwrap();
        let nationalities = party.column("nationalities").unwrap();
        assert!(nationalities.column_type.is_list());
        let element = nationalities.column_type.element().unwrap();
        assert!(element.column_type.child("region_code").is_some());
    }
}
