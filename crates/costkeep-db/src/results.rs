//! Database operations for the `results` table.

use chrono::{DateTime, NaiveDate, Utc};
use costkeep_core::NormalizedUsage;
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResultRow {
    pub id: i64,
    pub run_id: String,
    pub provider: String,
    pub date: NaiveDate,
    pub tokens: i64,
    pub cost: f64,
    pub raw_json: String,
    pub created_at: DateTime<Utc>,
}

const RESULT_COLUMNS: &str = "id, run_id, provider, date, tokens, cost, raw_json, created_at";

/// Looks up the stored result for `provider` on `date`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_result(
    pool: &SqlitePool,
    provider: &str,
    date: NaiveDate,
) -> Result<Option<ResultRow>, DbError> {
    let row = sqlx::query_as::<_, ResultRow>(&format!(
        "SELECT {RESULT_COLUMNS} FROM results WHERE provider = ? AND date = ?"
    ))
    .bind(provider)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts one result row on the given connection (normally a transaction).
///
/// Constraint violations are reported as typed errors rather than raw
/// database errors.
///
/// # Errors
///
/// - [`DbError::DuplicateResult`] if `(provider, date)` is already stored.
/// - [`DbError::UnknownRun`] if `run_id` does not reference a run.
/// - [`DbError::Sqlx`] for any other database failure.
pub async fn insert_result(
    conn: &mut SqliteConnection,
    run_id: &str,
    usage: &NormalizedUsage,
) -> Result<ResultRow, DbError> {
    sqlx::query_as::<_, ResultRow>(&format!(
        "INSERT INTO results (run_id, provider, date, tokens, cost, raw_json, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         RETURNING {RESULT_COLUMNS}"
    ))
    .bind(run_id)
    .bind(&usage.provider)
    .bind(usage.date)
    .bind(usage.tokens)
    .bind(usage.cost)
    .bind(&usage.raw_json)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(|err| classify_insert_error(err, run_id, usage))
}

/// Returns the most recent `limit` results, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_results(pool: &SqlitePool, limit: i64) -> Result<Vec<ResultRow>, DbError> {
    let rows = sqlx::query_as::<_, ResultRow>(&format!(
        "SELECT {RESULT_COLUMNS} FROM results \
         ORDER BY created_at DESC, id DESC \
         LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

fn classify_insert_error(err: sqlx::Error, run_id: &str, usage: &NormalizedUsage) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DbError::DuplicateResult {
                provider: usage.provider.clone(),
                date: usage.date.to_string(),
            };
        }
        if db_err.is_foreign_key_violation() {
            return DbError::UnknownRun {
                run_id: run_id.to_string(),
            };
        }
    }
    DbError::Sqlx(err)
}
