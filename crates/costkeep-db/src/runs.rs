//! Database operations for the `runs` table.
//!
//! A run is created in `running` status and moves exactly once to one of the
//! terminal statuses. Every transition is guarded on `status = 'running'` in
//! SQL, so a run that has already finished cannot be rewritten.

use chrono::{DateTime, Utc};
use costkeep_core::NormalizedUsage;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::results::{insert_result, ResultRow};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Skipped,
    Failed,
}

impl RunStatus {
    pub const ALL: [RunStatus; 4] = [
        RunStatus::Running,
        RunStatus::Success,
        RunStatus::Skipped,
        RunStatus::Failed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Skipped => "skipped",
            RunStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!("unknown run status '{s}': expected running, success, skipped or failed")
            })
    }
}

/// A row from the `runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    pub id: String,
    pub plugin_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    /// `None` while the run is still `running`.
    pub finished_at: Option<DateTime<Utc>>,
    /// Set only when `status` is `failed`.
    pub error: Option<String>,
}

const RUN_COLUMNS: &str = "id, plugin_name, status, started_at, finished_at, error";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// A fresh run identifier (hyphenated UUID v4).
#[must_use]
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Records the start of a collection attempt as a `running` run.
///
/// The insert is committed on its own so the attempt stays visible even if
/// the process dies before the run finishes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate id).
pub async fn begin_run(
    pool: &SqlitePool,
    run_id: &str,
    plugin_name: &str,
) -> Result<RunRow, DbError> {
    let row = sqlx::query_as::<_, RunRow>(&format!(
        "INSERT INTO runs (id, plugin_name, status, started_at) \
         VALUES (?, ?, 'running', ?) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(run_id)
    .bind(plugin_name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `skipped` and sets `finished_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn skip_run(pool: &SqlitePool, run_id: &str) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;
    finish_run(&mut conn, run_id, RunStatus::Skipped, None).await
}

/// Marks a run as `failed`, sets `finished_at` and records `error`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_run(pool: &SqlitePool, run_id: &str, error: &str) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;
    finish_run(&mut conn, run_id, RunStatus::Failed, Some(error)).await
}

/// Stores the collected usage and marks the run `success`, atomically.
///
/// Both writes share one transaction: either the result row exists and the
/// run is `success`, or neither change is visible.
///
/// # Errors
///
/// - [`DbError::DuplicateResult`] if `(provider, date)` is already stored.
/// - [`DbError::UnknownRun`] if `run_id` does not reference a run.
/// - [`DbError::InvalidRunTransition`] if the run is not `running`.
/// - [`DbError::Sqlx`] for any other database failure.
pub async fn complete_run_with_result(
    pool: &SqlitePool,
    run_id: &str,
    usage: &NormalizedUsage,
) -> Result<ResultRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = insert_result(&mut tx, run_id, usage).await?;
    finish_run(&mut tx, run_id, RunStatus::Success, None).await?;

    tx.commit().await?;
    Ok(row)
}

/// Fetches a single run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has this id, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_run(pool: &SqlitePool, run_id: &str) -> Result<RunRow, DbError> {
    let row = sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM runs WHERE id = ?"
    ))
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first, optionally filtered by
/// status.
///
/// Filtering on [`RunStatus::Running`] lists runs that are in flight or were
/// orphaned by a crash mid-collection.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_runs(
    pool: &SqlitePool,
    status: Option<RunStatus>,
    limit: i64,
) -> Result<Vec<RunRow>, DbError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, RunRow>(&format!(
                "SELECT {RUN_COLUMNS} FROM runs \
                 WHERE status = ? \
                 ORDER BY started_at DESC, rowid DESC \
                 LIMIT ?"
            ))
            .bind(status)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, RunRow>(&format!(
                "SELECT {RUN_COLUMNS} FROM runs \
                 ORDER BY started_at DESC, rowid DESC \
                 LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// Moves a `running` run into a terminal status on the given connection.
async fn finish_run(
    conn: &mut SqliteConnection,
    run_id: &str,
    status: RunStatus,
    error: Option<&str>,
) -> Result<(), DbError> {
    debug_assert!(status.is_terminal());

    let result = sqlx::query(
        "UPDATE runs \
         SET status = ?, finished_at = ?, error = ? \
         WHERE id = ? AND status = 'running'",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(error)
    .bind(run_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id: run_id.to_string(),
            expected_status: RunStatus::Running.as_str(),
        });
    }

    Ok(())
}
