//! Constraint trait and evaluation result types.

use crate::error::Result;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// The status of a single constraint evaluation.
///
/// A constraint reports its finding as a value rather than raising it; the
/// dispatcher combines this status with the owning check's severity level to
/// produce the terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintStatus {
    /// The condition held
    Success,
    /// The condition held only loosely; surfaced as a non-fatal warning
    /// regardless of the check's configured severity
    Warning,
    /// The condition was violated
    Failure,
    /// The constraint does not apply (no data, optional column absent)
    Skipped,
}

impl ConstraintStatus {
    /// Returns true if this is a Success status.
    pub fn is_success(&self) -> bool {
        matches!(self, ConstraintStatus::Success)
    }

    /// Returns true if this is a Failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, ConstraintStatus::Failure)
    }

    /// Returns true if this is a Skipped status.
    pub fn is_skipped(&self) -> bool {
        matches!(self, ConstraintStatus::Skipped)
    }
}

/// The result of evaluating a constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintResult {
    /// The status of the constraint evaluation
    pub status: ConstraintStatus,
    /// Optional metric value computed during evaluation (typically a
    /// violation count or a ratio)
    pub metric: Option<f64>,
    /// Optional message providing additional context
    pub message: Option<String>,
}

impl ConstraintResult {
    /// Creates a successful constraint result.
    pub fn success() -> Self {
        Self {
            status: ConstraintStatus::Success,
            metric: None,
            message: None,
        }
    }

    /// Creates a successful constraint result with a metric.
    pub fn success_with_metric(metric: f64) -> Self {
        Self {
            status: ConstraintStatus::Success,
            metric: Some(metric),
            message: None,
        }
    }

    /// Creates a warning result.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: ConstraintStatus::Warning,
            metric: None,
            message: Some(message.into()),
        }
    }

    /// Creates a warning result with a metric.
    pub fn warning_with_metric(metric: f64, message: impl Into<String>) -> Self {
        Self {
            status: ConstraintStatus::Warning,
            metric: Some(metric),
            message: Some(message.into()),
        }
    }

    /// Creates a failed constraint result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ConstraintStatus::Failure,
            metric: None,
            message: Some(message.into()),
        }
    }

    /// Creates a failed constraint result with a metric.
    pub fn failure_with_metric(metric: f64, message: impl Into<String>) -> Self {
        Self {
            status: ConstraintStatus::Failure,
            metric: Some(metric),
            message: Some(message.into()),
        }
    }

    /// Creates a skipped constraint result.
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: ConstraintStatus::Skipped,
            metric: None,
            message: Some(message.into()),
        }
    }
}

/// Metadata associated with a constraint, for reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintMetadata {
    /// The column path(s) this constraint operates on
    pub columns: Vec<String>,
    /// A human-readable description of what this constraint validates
    pub description: Option<String>,
    /// Additional key-value pairs for custom metadata
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, String>,
}

impl ConstraintMetadata {
    /// Creates a new metadata instance with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates metadata for a single-column constraint.
    pub fn for_column(column: impl Into<String>) -> Self {
        Self {
            columns: vec![column.into()],
            description: None,
            custom: HashMap::new(),
        }
    }

    /// Creates metadata for a multi-column constraint.
    pub fn for_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            description: None,
            custom: HashMap::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a custom metadata entry.
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// A validation constraint that can be evaluated against a bound session.
///
/// Implementations are stateless after construction: they carry their table
/// binding and parameters, generate one or more aggregate queries at
/// evaluation time, and fold the result into a [`ConstraintResult`].
#[async_trait]
pub trait Constraint: Debug + Send + Sync {
    /// Evaluates the constraint against the data registered in the session.
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ConstraintResult>;

    /// Returns the name of the constraint.
    fn name(&self) -> &str;

    /// Returns the column path this constraint operates on, if single-column.
    fn column(&self) -> Option<&str> {
        None
    }

    /// Returns the metadata associated with this constraint.
    fn metadata(&self) -> ConstraintMetadata {
        ConstraintMetadata::new()
    }
}

/// A boxed constraint for use in collections.
pub type BoxedConstraint = Box<dyn Constraint>;
