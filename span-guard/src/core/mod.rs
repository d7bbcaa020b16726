//! Core validation types: constraints, checks, suites, outcomes.
//!
//! ```text
//! ValidationSuite
//!     ├── Check (table: party, Level: Error)
//!     │   ├── Constraint: schema_conformance
//!     │   └── Constraint: duplicate_keys
//!     └── Check (table: account_party_link, Level: Warning)
//!         ├── Constraint: referential_integrity
//!         └── Constraint: temporal_integrity
//! ```
//!
//! A constraint reports a [`ConstraintResult`] (success, warning, failure,
//! skip) as a value. The suite gates each check on its table's existence,
//! then maps every result through the severity [`dispatch`] to a terminal
//! [`CheckOutcome`], collecting all non-pass outcomes in the
//! [`ValidationReport`].

mod check;
mod constraint;
mod dispatch;
mod level;
mod result;
mod suite;

pub use check::{Check, CheckBuilder};
pub use constraint::{
    BoxedConstraint, Constraint, ConstraintMetadata, ConstraintResult, ConstraintStatus,
};
pub use dispatch::{dispatch, CheckOutcome};
pub use level::Level;
pub use result::{ValidationIssue, ValidationMetrics, ValidationReport, ValidationResult};
pub use suite::{ValidationSuite, ValidationSuiteBuilder};
