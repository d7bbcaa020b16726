//! Structural type comparison between declared and actual schemas.
//!
//! The comparison runs in stages: both types are normalized to strip
//! differences the storage layer cannot express or does not mean anything
//! by (nested nullability, timestamp unit and timezone, struct field
//! order), then checked for equality, then reconciled structurally so a
//! backend schema that is a superset of the declaration warns instead of
//! failing.

use arrow::datatypes::{DataType, Field, Fields, TimeUnit};
use std::sync::Arc;

/// Canonical name given to list element fields during normalization.
const LIST_ELEMENT_NAME: &str = "item";

/// Verdict of comparing an expected type against an actual one.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeComparison {
    /// Normalized forms are identical
    Match,
    /// Acceptable deviation: extra fields in the actual type, or an actual
    /// type stricter than the declaration requires
    Warn {
        /// One reason per deviation, path-qualified where applicable
        reasons: Vec<String>,
    },
    /// Structural mismatch
    Fail {
        /// Description quoting both type shapes
        reason: String,
    },
}

impl TypeComparison {
    /// Returns true for [`TypeComparison::Match`].
    pub fn is_match(&self) -> bool {
        matches!(self, TypeComparison::Match)
    }

    /// Returns true for [`TypeComparison::Fail`].
    pub fn is_fail(&self) -> bool {
        matches!(self, TypeComparison::Fail { .. })
    }
}

/// Full outcome of a comparison: the verdict plus informational notes that
/// never affect it (currently: non-UTC timestamp timezones).
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutcome {
    /// The verdict
    pub comparison: TypeComparison,
    /// Informational notes
    pub notes: Vec<String>,
}

/// Compares an expected (declared) field against the actual field a bound
/// session reports.
///
/// Stages, in order:
/// 1. normalize both sides;
/// 2. equal normalized forms are a match;
/// 3. structural reconciliation: every expected field present in the actual
///    type with matching structure, only extra actual fields remaining,
///    top-level nullability ignored — warn, listing the extra field paths;
/// 4. expected nullable but actual required — warn (stricter than required);
/// 5. anything else fails.
///
/// Reconciliation is attempted before the nullability-relaxation check: a
/// structural mismatch that also differs in nullability fails reconciliation
/// and falls through to stage 5.
pub fn compare(expected: &Field, actual: &Field) -> ComparisonOutcome {
    let mut notes = Vec::new();
    collect_timezone_notes(actual, &format!(".{}", actual.name()), &mut notes);

    let expected_norm = normalize(expected, true);
    let actual_norm = normalize(actual, true);

    if expected_norm == actual_norm {
        return ComparisonOutcome {
            comparison: TypeComparison::Match,
            notes,
        };
    }

    let mut extras = Vec::new();
    if reconcile(
        expected_norm.data_type(),
        actual_norm.data_type(),
        "",
        &mut extras,
    ) {
        if !extras.is_empty() {
            let reasons = extras
                .into_iter()
                .map(|path| format!("actual type has extra field '{path}'"))
                .collect();
            return ComparisonOutcome {
                comparison: TypeComparison::Warn { reasons },
                notes,
            };
        }
        // Structure identical: the only remaining difference is top-level
        // nullability.
        if expected_norm.is_nullable() && !actual_norm.is_nullable() {
            return ComparisonOutcome {
                comparison: TypeComparison::Warn {
                    reasons: vec![format!(
                        "column '{}' is non-nullable in the data, stricter than the declaration requires",
                        actual.name()
                    )],
                },
                notes,
            };
        }
    }

    ComparisonOutcome {
        comparison: TypeComparison::Fail {
            reason: format!(
                "expected {} but found {}",
                describe(&expected_norm),
                describe(&actual_norm)
            ),
        },
        notes,
    }
}

/// Normalizes a field for comparison.
///
/// - Nullability below the top level is forced to nullable: the storage
///   format cannot express non-nullability there.
/// - Struct fields are sorted by name so comparison is order-independent.
/// - Timestamp unit and timezone are stripped.
/// - String and list encodings are collapsed to their canonical variants.
fn normalize(field: &Field, top_level: bool) -> Field {
    let nullable = if top_level { field.is_nullable() } else { true };
    let data_type = normalize_type(field.data_type());
    Field::new(field.name(), data_type, nullable)
}

fn normalize_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Timestamp(_, _) => DataType::Timestamp(TimeUnit::Microsecond, None),
        DataType::LargeUtf8 | DataType::Utf8View => DataType::Utf8,
        DataType::Struct(fields) => {
            let mut normalized: Vec<Field> =
                fields.iter().map(|f| normalize(f, false)).collect();
            normalized.sort_by(|a, b| a.name().cmp(b.name()));
            DataType::Struct(Fields::from(normalized))
        }
        DataType::List(element) | DataType::LargeList(element) => {
            let normalized = normalize(element, false);
            DataType::List(Arc::new(normalized.with_name(LIST_ELEMENT_NAME)))
        }
        other => other.clone(),
    }
}

/// Structurally aligns an expected type against an actual type, ignoring
/// nullability, collecting the paths of fields present only in the actual
/// type. Returns false on any mismatch that is not an extra actual field.
fn reconcile(expected: &DataType, actual: &DataType, path: &str, extras: &mut Vec<String>) -> bool {
    match (expected, actual) {
        (DataType::Struct(expected_fields), DataType::Struct(actual_fields)) => {
            for expected_field in expected_fields {
                let Some(actual_field) = actual_fields
                    .iter()
                    .find(|f| f.name() == expected_field.name())
                else {
                    return false;
                };
                let child_path = format!("{path}.{}", expected_field.name());
                if !reconcile(
                    expected_field.data_type(),
                    actual_field.data_type(),
                    &child_path,
                    extras,
                ) {
                    return false;
                }
            }
            for actual_field in actual_fields {
                if !expected_fields.iter().any(|f| f.name() == actual_field.name()) {
                    extras.push(format!("{path}.{}", actual_field.name()));
                }
            }
            true
        }
        (DataType::List(expected_element), DataType::List(actual_element)) => reconcile(
            expected_element.data_type(),
            actual_element.data_type(),
            path,
            extras,
        ),
        (expected, actual) => expected == actual,
    }
}

fn collect_timezone_notes(field: &Field, path: &str, notes: &mut Vec<String>) {
    match field.data_type() {
        DataType::Timestamp(_, Some(tz)) if !tz.eq_ignore_ascii_case("utc") => {
            notes.push(format!(
                "timestamp at '{path}' carries non-UTC timezone '{tz}'"
            ));
        }
        DataType::Struct(fields) => {
            for child in fields {
                let child_path = format!("{path}.{}", child.name());
                collect_timezone_notes(child, &child_path, notes);
            }
        }
        DataType::List(element) | DataType::LargeList(element) => {
            collect_timezone_notes(element, path, notes);
        }
        _ => {}
    }
}

fn describe(field: &Field) -> String {
    let nullability = if field.is_nullable() {
        "nullable"
    } else {
        "required"
    };
    format!("{nullability} {:?}", field.data_type())
}
