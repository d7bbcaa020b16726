//! # span-guard — temporal data-quality validation
//!
//! span-guard validates analytical datasets whose mutable tables are
//! append-only change logs with temporal validity and soft deletion: every
//! row is a new version of an entity, stamped with the time it became
//! valid and a deletion flag. Before such a dataset is consumed
//! downstream, span-guard checks that it conforms to its declared schema,
//! that entity lifecycles are well formed, and that lifetimes across
//! related tables actually line up.
//!
//! Queries run through DataFusion: checks generate SQL against a
//! [`SessionContext`](datafusion::prelude::SessionContext) holding the
//! registered tables and fold aggregate results into typed outcomes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use span_guard::core::{Check, Level, ValidationSuite};
//! use span_guard::schema::catalog;
//! use span_guard::windows::Tolerance;
//! use datafusion::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let party = Arc::new(catalog::party()?);
//! let link = Arc::new(catalog::account_party_link()?);
//!
//! let suite = ValidationSuite::builder("pre_consumption")
//!     .check(
//!         Check::builder("party_integrity", party.clone())
//!             .level(Level::Error)
//!             .schema_conformance()
//!             .row_count(10_000_000.0)
//!             .unique_change_rows()
//!             .no_orphan_deletions()
//!             .no_consecutive_deletions()
//!             .build()?,
//!     )
//!     .check(
//!         Check::builder("link_lifetimes", link)
//!             .level(Level::Error)
//!             .references_in_time(party, ["party_id"], Tolerance::days(1))
//!             .build()?,
//!     )
//!     .build();
//!
//! let ctx = SessionContext::new();
//! // ... register the dataset's tables ...
//!
//! let result = suite.run(&ctx).await?;
//! for issue in &result.report().issues {
//!     println!("[{}] {}: {}", issue.outcome, issue.check_name, issue.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`schema`**: declared column trees, table configurations, the
//!   structural type comparator, and the built-in analytical-schema catalog
//! - **`resolve`**: dotted field paths to query expressions, flattening
//!   repeated-list levels
//! - **`windows`**: validity-window reconstruction from change logs and
//!   calendar tolerances
//! - **`constraints`**: the validation primitives, from row counts to
//!   temporal referential integrity
//! - **`core`**: the `Constraint` trait, checks, suites, severity dispatch,
//!   and report types
//! - **`config`**: explicit per-session validation configuration
//! - **`security`**: identifier and literal escaping for generated SQL
//! - **`logging`**: `tracing` subscriber configuration helpers

pub mod config;
pub mod constraints;
pub mod core;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod resolve;
pub mod schema;
pub mod security;
pub mod windows;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
