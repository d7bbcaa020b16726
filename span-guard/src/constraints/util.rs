//! Shared helpers for executing generated aggregate queries.

use crate::error::{Result, SpanError};
use arrow::array::Array;
use arrow::array::Int64Array;
use arrow::util::display::array_value_to_string;
use datafusion::prelude::SessionContext;

/// Executes a query expected to return a single Int64 value and extracts it.
///
/// Returns `None` when the query produced no rows at all.
pub(crate) async fn scalar_i64(
    ctx: &SessionContext,
    sql: &str,
    constraint: &str,
) -> Result<Option<i64>> {
    let df = ctx.sql(sql).await.map_err(|e| {
        SpanError::constraint_evaluation(constraint, format!("query failed: {e}"))
    })?;
    let batches = df.collect().await.map_err(|e| {
        SpanError::constraint_evaluation(constraint, format!("failed to collect results: {e}"))
    })?;

    let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let array = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| {
            SpanError::constraint_evaluation(constraint, "aggregate column is not Int64")
        })?;
    if array.is_null(0) {
        return Ok(None);
    }
    Ok(Some(array.value(0)))
}

/// Executes a query and renders each row as a `:`-joined string, capped at
/// `max` rows. Used to quote violation examples in failure messages.
pub(crate) async fn collect_examples(
    ctx: &SessionContext,
    sql: &str,
    constraint: &str,
    max: usize,
) -> Result<Vec<String>> {
    if max == 0 {
        return Ok(Vec::new());
    }
    let df = ctx.sql(sql).await.map_err(|e| {
        SpanError::constraint_evaluation(constraint, format!("examples query failed: {e}"))
    })?;
    let batches = df.collect().await.map_err(|e| {
        SpanError::constraint_evaluation(constraint, format!("failed to collect examples: {e}"))
    })?;

    let mut examples = Vec::with_capacity(max);
    for batch in batches {
        for row in 0..batch.num_rows() {
            if examples.len() >= max {
                return Ok(examples);
            }
            let mut parts = Vec::with_capacity(batch.num_columns());
            for column in batch.columns() {
                parts.push(array_value_to_string(column, row)?);
            }
            examples.push(parts.join(":"));
        }
    }
    Ok(examples)
}

/// Formats collected examples for a failure message, noting how many
/// violations were not quoted.
pub(crate) fn format_examples(examples: &[String], total: i64) -> String {
    if examples.is_empty() {
        return String::new();
    }
    let shown = examples.len() as i64;
    if total > shown {
        format!(
            ". Examples: [{}, ... ({} more)]",
            examples.join(", "),
            total - shown
        )
    } else {
        format!(". Examples: [{}]", examples.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_examples_exhaustive() {
        let examples = vec!["a".to_string(), "b".to_string()];
        assert_eq!(format_examples(&examples, 2), ". Examples: [a, b]");
    }

    #[test]
    fn test_format_examples_truncated() {
        let examples = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            format_examples(&examples, 7),
            ". Examples: [a, b, ... (5 more)]"
        );
    }

    #[test]
    fn test_format_examples_empty() {
        assert_eq!(format_examples(&[], 3), "");
    }
}
