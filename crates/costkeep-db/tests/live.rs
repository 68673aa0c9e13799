//! Integration tests for costkeep-db against real SQLite files.
//!
//! Each test gets its own temporary database file with the schema applied,
//! so tests are independent and can run in parallel.

use chrono::NaiveDate;
use costkeep_core::NormalizedUsage;
use costkeep_db::{
    begin_run, complete_run_with_result, connect_pool, export_table, export_table_by_name,
    fail_run, find_result, get_run, init_schema, insert_result, list_results, list_runs,
    new_run_id, ping, skip_run, DbError, ExportError, ExportTable, PoolConfig,
    RunStatus,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = connect_pool(&dir.path().join("costkeep.db"), PoolConfig::default())
        .await
        .expect("failed to open sqlite pool");
    init_schema(&pool).await.expect("init_schema failed");
    (dir, pool)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn usage(provider: &str, on: NaiveDate, tokens: i64, cost: f64) -> NormalizedUsage {
    NormalizedUsage {
        provider: provider.to_string(),
        date: on,
        tokens,
        cost,
        raw_json: format!(r#"{{"total_tokens":{tokens},"total_cost":{cost}}}"#),
    }
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .expect("count query failed")
}

// ---------------------------------------------------------------------------
// Section 1: Schema
// ---------------------------------------------------------------------------

#[tokio::test]
async fn init_schema_is_idempotent() {
    let (_dir, pool) = test_pool().await;

    // test_pool already applied the schema once.
    for _ in 0..3 {
        let applied = init_schema(&pool).await.expect("repeat init_schema failed");
        assert_eq!(applied, 0, "no migrations should be re-applied");
    }

    let tables = count(
        &pool,
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('runs', 'results')",
    )
    .await;
    assert_eq!(tables, 2, "should have exactly runs and results tables");
}

#[tokio::test]
async fn init_schema_reports_first_application() {
    let dir = tempfile::tempdir().unwrap();
    let pool = connect_pool(&dir.path().join("fresh.db"), PoolConfig::default())
        .await
        .unwrap();

    let applied = init_schema(&pool).await.unwrap();
    assert!(applied >= 1, "fresh database should apply the schema");
    ping(&pool).await.expect("ping should succeed");
}

#[tokio::test]
async fn reopening_an_existing_file_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.db");

    {
        let pool = connect_pool(&path, PoolConfig::default()).await.unwrap();
        init_schema(&pool).await.unwrap();
        let run_id = new_run_id();
        begin_run(&pool, &run_id, "openai_collector").await.unwrap();
        pool.close().await;
    }

    let pool = connect_pool(&path, PoolConfig::default()).await.unwrap();
    init_schema(&pool).await.unwrap();
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM runs").await, 1);
}

#[tokio::test]
async fn schema_columns_match_export_headers() {
    let (_dir, pool) = test_pool().await;

    for table in ExportTable::ALL {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                .bind(table.as_str())
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(columns, table.columns(), "schema drifted for {table}");
    }
}

#[tokio::test]
async fn rows_are_readable_by_column_name() {
    use sqlx::Row;

    let (_dir, pool) = test_pool().await;
    let row = sqlx::query("SELECT 1 AS test_column")
        .fetch_one(&pool)
        .await
        .unwrap();
    let value: i64 = row.try_get("test_column").unwrap();
    assert_eq!(value, 1);
}

// ---------------------------------------------------------------------------
// Section 2: Run lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn begin_run_records_running_attempt() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();

    let run = begin_run(&pool, &run_id, "openai_collector")
        .await
        .expect("begin_run failed");

    assert_eq!(run.id, run_id);
    assert_eq!(run.plugin_name, "openai_collector");
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.finished_at.is_none());
    assert!(run.error.is_none());

    let fetched = get_run(&pool, &run_id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::Running);
    assert_eq!(fetched.started_at, run.started_at);
}

#[tokio::test]
async fn begin_run_rejects_duplicate_id() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();

    begin_run(&pool, &run_id, "openai_collector").await.unwrap();
    let err = begin_run(&pool, &run_id, "openai_collector")
        .await
        .expect_err("duplicate run id must be rejected");
    assert!(matches!(err, DbError::Sqlx(_)), "got: {err:?}");
}

#[tokio::test]
async fn skip_run_sets_terminal_status() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "anthropic_collector").await.unwrap();

    skip_run(&pool, &run_id).await.expect("skip_run failed");

    let run = get_run(&pool, &run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Skipped);
    assert!(run.finished_at.is_some());
    assert!(run.error.is_none());
}

#[tokio::test]
async fn fail_run_records_error() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "openai_collector").await.unwrap();

    fail_run(&pool, &run_id, "connection refused")
        .await
        .expect("fail_run failed");

    let run = get_run(&pool, &run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.finished_at.is_some());
    assert_eq!(run.error.as_deref(), Some("connection refused"));
}

#[tokio::test]
async fn terminal_runs_cannot_transition_again() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "openai_collector").await.unwrap();
    skip_run(&pool, &run_id).await.unwrap();

    let err = fail_run(&pool, &run_id, "late failure")
        .await
        .expect_err("skipped run must not become failed");
    assert!(
        matches!(err, DbError::InvalidRunTransition { ref id, expected_status: "running" } if *id == run_id),
        "got: {err:?}"
    );

    let err = skip_run(&pool, &run_id).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));

    let run = get_run(&pool, &run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Skipped);
    assert!(run.error.is_none());
}

#[tokio::test]
async fn transition_of_unknown_run_is_rejected() {
    let (_dir, pool) = test_pool().await;
    let err = skip_run(&pool, "no-such-run").await.unwrap_err();
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));
}

#[tokio::test]
async fn get_run_missing_returns_not_found() {
    let (_dir, pool) = test_pool().await;
    let err = get_run(&pool, "missing").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[tokio::test]
async fn list_runs_filters_by_status() {
    let (_dir, pool) = test_pool().await;

    let running = new_run_id();
    begin_run(&pool, &running, "openai_collector").await.unwrap();

    let failed = new_run_id();
    begin_run(&pool, &failed, "anthropic_collector").await.unwrap();
    fail_run(&pool, &failed, "boom").await.unwrap();

    let all = list_runs(&pool, None, 10).await.unwrap();
    assert_eq!(all.len(), 2);

    let orphans = list_runs(&pool, Some(RunStatus::Running), 10).await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].id, running);

    let failures = list_runs(&pool, Some(RunStatus::Failed), 10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, failed);

    let limited = list_runs(&pool, None, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

// ---------------------------------------------------------------------------
// Section 3: Results and idempotency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn complete_run_with_result_stores_result_and_marks_success() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "openai_collector").await.unwrap();

    let stored = complete_run_with_result(&pool, &run_id, &usage("OpenAI", date(2024, 1, 1), 500, 1.23))
        .await
        .expect("complete_run_with_result failed");

    assert_eq!(stored.run_id, run_id);
    assert_eq!(stored.provider, "OpenAI");
    assert_eq!(stored.date, date(2024, 1, 1));
    assert_eq!(stored.tokens, 500);
    assert!((stored.cost - 1.23).abs() < f64::EPSILON);

    let run = get_run(&pool, &run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.finished_at.is_some());

    let found = find_result(&pool, "OpenAI", date(2024, 1, 1))
        .await
        .unwrap()
        .expect("result should be found");
    assert_eq!(found.id, stored.id);
    assert!(find_result(&pool, "OpenAI", date(2024, 1, 2))
        .await
        .unwrap()
        .is_none());
    assert!(find_result(&pool, "Anthropic", date(2024, 1, 1))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_provider_date_is_rejected_regardless_of_run() {
    let (_dir, pool) = test_pool().await;

    let first = new_run_id();
    begin_run(&pool, &first, "openai_collector").await.unwrap();
    complete_run_with_result(&pool, &first, &usage("OpenAI", date(2024, 1, 1), 1, 0.1))
        .await
        .unwrap();

    let second = new_run_id();
    begin_run(&pool, &second, "openai_collector").await.unwrap();
    let err = complete_run_with_result(&pool, &second, &usage("OpenAI", date(2024, 1, 1), 2, 0.2))
        .await
        .expect_err("second result for same provider/date must fail");
    assert!(
        matches!(err, DbError::DuplicateResult { ref provider, ref date } if provider == "OpenAI" && date == "2024-01-01"),
        "got: {err:?}"
    );

    // The failed transaction must leave the second run untouched.
    let run = get_run(&pool, &second).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM results").await, 1);
}

#[tokio::test]
async fn uniqueness_is_enforced_by_storage_layer() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "openai_collector").await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    insert_result(&mut conn, &run_id, &usage("OpenAI", date(2024, 1, 1), 1, 0.1))
        .await
        .unwrap();
    let err = insert_result(&mut conn, &run_id, &usage("OpenAI", date(2024, 1, 1), 1, 0.1))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DuplicateResult { .. }), "got: {err:?}");

    // Same date, different provider is fine.
    insert_result(&mut conn, &run_id, &usage("Anthropic", date(2024, 1, 1), 1, 0.1))
        .await
        .unwrap();
}

#[tokio::test]
async fn result_value_columns_reject_null() {
    let (_dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "openai_collector").await.unwrap();

    for (tokens, cost, raw_json) in [
        (None, Some(1.0), Some("{}")),
        (Some(1_i64), None, Some("{}")),
        (Some(1_i64), Some(1.0), None),
    ] {
        let result = sqlx::query(
            "INSERT INTO results (run_id, provider, date, tokens, cost, raw_json, created_at) \
             VALUES (?, 'OpenAI', '2024-01-01', ?, ?, ?, '2024-01-02T00:00:00Z')",
        )
        .bind(&run_id)
        .bind(tokens)
        .bind(cost)
        .bind(raw_json)
        .execute(&pool)
        .await;
        assert!(result.is_err(), "null value column was accepted");
    }
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM results").await, 0);
}

#[tokio::test]
async fn result_requires_existing_run() {
    let (_dir, pool) = test_pool().await;
    let mut conn = pool.acquire().await.unwrap();

    let err = insert_result(&mut conn, "ghost-run", &usage("OpenAI", date(2024, 1, 1), 1, 0.1))
        .await
        .expect_err("orphan result must be rejected");
    assert!(
        matches!(err, DbError::UnknownRun { ref run_id } if run_id == "ghost-run"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn list_results_returns_newest_first() {
    let (_dir, pool) = test_pool().await;

    for day in 1..=3 {
        let run_id = new_run_id();
        begin_run(&pool, &run_id, "openai_collector").await.unwrap();
        complete_run_with_result(&pool, &run_id, &usage("OpenAI", date(2024, 1, day), 10, 0.5))
            .await
            .unwrap();
    }

    let rows = list_results(&pool, 10).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].date, date(2024, 1, 3));
    assert_eq!(rows[2].date, date(2024, 1, 1));
}

// ---------------------------------------------------------------------------
// Section 4: Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_rejects_invalid_table_before_touching_database() {
    let (dir, pool) = test_pool().await;
    let output = dir.path().join("out.csv");

    let err = export_table_by_name(&pool, "results; DROP TABLE runs;--", Some(&output), dir.path())
        .await
        .expect_err("injection attempt must be rejected");
    assert!(matches!(err, ExportError::InvalidTable { .. }), "got: {err:?}");
    assert!(!output.exists(), "no file should be written");

    let tables = count(
        &pool,
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('runs', 'results')",
    )
    .await;
    assert_eq!(tables, 2);
}

#[tokio::test]
async fn export_writes_header_for_each_allowed_table() {
    let (dir, pool) = test_pool().await;

    for name in ["results", "runs"] {
        let output = dir.path().join(format!("{name}.csv"));
        let written = export_table_by_name(&pool, name, Some(&output), dir.path())
            .await
            .expect("export should succeed");
        assert_eq!(written, output);

        let content = std::fs::read_to_string(&output).unwrap();
        let header = content.lines().next().expect("header row");
        let table: ExportTable = name.parse().unwrap();
        assert_eq!(header, table.columns().join(","));
    }
}

#[tokio::test]
async fn export_without_output_uses_timestamped_file_in_export_dir() {
    let (dir, pool) = test_pool().await;
    let export_dir = dir.path().join("exports");

    let written = export_table_by_name(&pool, "results", None, &export_dir)
        .await
        .expect("export should succeed");

    assert_eq!(written.parent(), Some(export_dir.as_path()));
    let file_name = written.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("export_results_"), "got: {file_name}");
    assert!(file_name.ends_with(".csv"), "got: {file_name}");
    assert!(written.exists());
}

#[tokio::test]
async fn export_results_orders_by_created_at_desc() {
    let (dir, pool) = test_pool().await;

    for day in [1, 2] {
        let run_id = new_run_id();
        begin_run(&pool, &run_id, "openai_collector").await.unwrap();
        complete_run_with_result(&pool, &run_id, &usage("OpenAI", date(2024, 1, day), 100, 2.5))
            .await
            .unwrap();
    }

    let output = dir.path().join("nested").join("results.csv");
    export_table(&pool, ExportTable::Results, &output)
        .await
        .unwrap();

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][3], "2024-01-02");
    assert_eq!(&rows[1][3], "2024-01-01");
    assert_eq!(&rows[0][2], "OpenAI");
    assert_eq!(&rows[0][4], "100");
    assert_eq!(&rows[0][5], "2.5");
    assert!(rows[0][6].contains("total_tokens"));
}

#[tokio::test]
async fn export_runs_leaves_missing_values_blank() {
    let (dir, pool) = test_pool().await;
    let run_id = new_run_id();
    begin_run(&pool, &run_id, "openai_collector").await.unwrap();

    let output = dir.path().join("runs.csv");
    export_table(&pool, ExportTable::Runs, &output).await.unwrap();

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], run_id.as_str());
    assert_eq!(&rows[0][2], "running");
    assert_eq!(&rows[0][4], "");
    assert_eq!(&rows[0][5], "");
}
