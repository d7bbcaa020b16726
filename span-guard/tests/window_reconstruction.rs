//! Validity-window reconstruction against in-memory change logs.

use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use datafusion::prelude::SessionContext;
use span_guard::config::GuardConfig;
use span_guard::schema::TableKind;
use span_guard::test_utils::{change_log_config, change_log_ddl, exec};
use span_guard::windows::reconstruct_windows;

/// Renders reconstructed windows as (entity, first_date, last_date) rows.
fn windows_as_strings(batches: &[RecordBatch]) -> Vec<(String, String, String)> {
    let mut rows = Vec::new();
    for batch in batches {
        for i in 0..batch.num_rows() {
            rows.push((
                array_value_to_string(batch.column(0), i).unwrap(),
                array_value_to_string(batch.column(1), i).unwrap(),
                array_value_to_string(batch.column(2), i).unwrap(),
            ));
        }
    }
    rows
}

async fn change_log(rows: &str) -> SessionContext {
    let ctx = SessionContext::new();
    exec(&ctx, &change_log_ddl("party")).await.unwrap();
    exec(&ctx, &format!("INSERT INTO party VALUES {rows}"))
        .await
        .unwrap();
    ctx
}

#[tokio::test]
async fn test_single_flip_closed_ended_window() {
    let ctx = change_log(
        "('p1', TIMESTAMP '2020-01-05T08:00:00', FALSE), \
         ('p1', TIMESTAMP '2020-03-10T12:00:00', TRUE)",
    )
    .await;
    let config = change_log_config("party", TableKind::ClosedEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(
        windows,
        vec![(
            "p1".to_string(),
            "2020-01-05".to_string(),
            "2020-03-10".to_string()
        )]
    );
}

#[tokio::test]
async fn test_open_ended_never_closed_gets_sentinel() {
    let ctx = change_log(
        "('p1', TIMESTAMP '2020-01-05T00:00:00', FALSE), \
         ('p1', TIMESTAMP '2020-02-01T00:00:00', FALSE)",
    )
    .await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].1, "2020-01-05");
    assert_eq!(windows[0].2, "9995-01-01");
}

#[tokio::test]
async fn test_open_ended_closed_by_deletion() {
    let ctx = change_log(
        "('p1', TIMESTAMP '2020-01-05T00:00:00', FALSE), \
         ('p1', TIMESTAMP '2020-06-30T00:00:00', TRUE)",
    )
    .await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(windows[0].2, "2020-06-30");
}

#[tokio::test]
async fn test_intermediate_rows_do_not_move_boundaries() {
    // Three undeleted versions, then a deletion: the middle rows carry no
    // flip and must not affect the window.
    let ctx = change_log(
        "('p1', TIMESTAMP '2020-01-01T00:00:00', FALSE), \
         ('p1', TIMESTAMP '2020-02-01T00:00:00', FALSE), \
         ('p1', TIMESTAMP '2020-03-01T00:00:00', NULL), \
         ('p1', TIMESTAMP '2020-04-01T00:00:00', TRUE)",
    )
    .await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(
        windows,
        vec![(
            "p1".to_string(),
            "2020-01-01".to_string(),
            "2020-04-01".to_string()
        )]
    );
}

#[tokio::test]
async fn test_first_row_deleted_is_zero_duration() {
    // An entity whose first-ever row is a deletion gets a zero-duration
    // window at that date, never one stretching back to time zero.
    let ctx = change_log("('p1', TIMESTAMP '2020-05-15T00:00:00', TRUE)").await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(
        windows,
        vec![(
            "p1".to_string(),
            "2020-05-15".to_string(),
            "2020-05-15".to_string()
        )]
    );
}

#[tokio::test]
async fn test_null_deletion_flag_reads_as_not_deleted() {
    let ctx = change_log("('p1', TIMESTAMP '2020-01-01T00:00:00', NULL)").await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(windows[0].2, "9995-01-01");
}

#[tokio::test]
async fn test_entities_are_windowed_independently() {
    let ctx = change_log(
        "('p1', TIMESTAMP '2020-01-01T00:00:00', FALSE), \
         ('p2', TIMESTAMP '2021-06-01T00:00:00', FALSE), \
         ('p2', TIMESTAMP '2021-08-01T00:00:00', TRUE)",
    )
    .await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);

    let batches = reconstruct_windows(&ctx, &config, &GuardConfig::default())
        .await
        .unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(windows.len(), 2);
    assert_eq!(
        windows[0],
        (
            "p1".to_string(),
            "2020-01-01".to_string(),
            "9995-01-01".to_string()
        )
    );
    assert_eq!(
        windows[1],
        (
            "p2".to_string(),
            "2021-06-01".to_string(),
            "2021-08-01".to_string()
        )
    );
}

#[tokio::test]
async fn test_reconstruction_is_idempotent() {
    let ctx = change_log(
        "('p1', TIMESTAMP '2020-01-01T00:00:00', FALSE), \
         ('p1', TIMESTAMP '2020-04-01T00:00:00', TRUE), \
         ('p2', TIMESTAMP '2020-02-01T00:00:00', FALSE)",
    )
    .await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);
    let guard = GuardConfig::default();

    let first = reconstruct_windows(&ctx, &config, &guard).await.unwrap();
    let second = reconstruct_windows(&ctx, &config, &guard).await.unwrap();
    assert_eq!(windows_as_strings(&first), windows_as_strings(&second));
}

#[tokio::test]
async fn test_custom_sentinel_date() {
    let ctx = change_log("('p1', TIMESTAMP '2020-01-01T00:00:00', FALSE)").await;
    let config = change_log_config("party", TableKind::OpenEndedEntity);
    let guard = GuardConfig::default()
        .with_sentinel_date(chrono::NaiveDate::from_ymd_opt(9999, 12, 31).unwrap());

    let batches = reconstruct_windows(&ctx, &config, &guard).await.unwrap();
    let windows = windows_as_strings(&batches);
    assert_eq!(windows[0].2, "9999-12-31");
}
