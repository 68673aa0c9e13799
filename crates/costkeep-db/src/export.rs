//! CSV export of the persisted tables.
//!
//! Only the tables named by [`ExportTable`] can be exported. A table name
//! typed by a user is checked against that list by
//! [`ExportTable::from_str`](std::str::FromStr) before anything touches the
//! database, and no query in this module is built from caller-supplied text.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::results::ResultRow;
use crate::runs::RunRow;
use crate::DbError;

/// Tables that may be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTable {
    Runs,
    Results,
}

impl ExportTable {
    pub const ALL: [ExportTable; 2] = [ExportTable::Results, ExportTable::Runs];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExportTable::Runs => "runs",
            ExportTable::Results => "results",
        }
    }

    /// Header row written for this table, in schema order.
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            ExportTable::Runs => &[
                "id",
                "plugin_name",
                "status",
                "started_at",
                "finished_at",
                "error",
            ],
            ExportTable::Results => &[
                "id",
                "run_id",
                "provider",
                "date",
                "tokens",
                "cost",
                "raw_json",
                "created_at",
            ],
        }
    }

    fn allowed_names() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

impl std::fmt::Display for ExportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportTable {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| ExportError::InvalidTable {
                name: s.to_string(),
                allowed: Self::allowed_names(),
            })
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid table name: '{name}'. must be one of: {allowed}")]
    InvalidTable { name: String, allowed: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for ExportError {
    fn from(err: sqlx::Error) -> Self {
        ExportError::Db(DbError::Sqlx(err))
    }
}

/// Default output file: `<dir>/export_<table>_<YYYYMMDD_HHMMSS>.csv`.
#[must_use]
pub fn default_export_path(dir: &Path, table: ExportTable, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "export_{}_{}.csv",
        table.as_str(),
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Validates a user-supplied table name, then exports it.
///
/// Writes to `output` when given, else to [`default_export_path`] inside
/// `export_dir`. Returns the path written.
///
/// # Errors
///
/// Returns [`ExportError::InvalidTable`] before any query runs if `name` is
/// not an exportable table; otherwise see [`export_table`].
pub async fn export_table_by_name(
    pool: &SqlitePool,
    name: &str,
    output: Option<&Path>,
    export_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let table: ExportTable = name.parse()?;
    let output = output.map_or_else(
        || default_export_path(export_dir, table, Utc::now()),
        Path::to_path_buf,
    );
    export_table(pool, table, &output).await
}

/// Writes every row of `table` to `output` as CSV with a header row.
///
/// `results` rows are ordered by `created_at` descending and `runs` rows by
/// `started_at` descending. Returns the path written.
///
/// # Errors
///
/// Returns [`ExportError::Db`] if the rows cannot be read, or
/// [`ExportError::Io`]/[`ExportError::Csv`] if the file cannot be written.
pub async fn export_table(
    pool: &SqlitePool,
    table: ExportTable,
    output: &Path,
) -> Result<PathBuf, ExportError> {
    let records = match table {
        ExportTable::Runs => fetch_run_records(pool).await?,
        ExportTable::Results => fetch_result_records(pool).await?,
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let csv_err = |source| ExportError::Csv {
        path: output.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(output).map_err(csv_err)?;
    writer.write_record(table.columns()).map_err(csv_err)?;
    for record in &records {
        writer.write_record(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    tracing::debug!(table = %table, rows = records.len(), path = %output.display(), "exported table");
    Ok(output.to_path_buf())
}

async fn fetch_run_records(pool: &SqlitePool) -> Result<Vec<Vec<String>>, ExportError> {
    let rows = sqlx::query_as::<_, RunRow>(
        "SELECT id, plugin_name, status, started_at, finished_at, error \
         FROM runs \
         ORDER BY started_at DESC, rowid DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            vec![
                row.id,
                row.plugin_name,
                row.status.to_string(),
                timestamp(row.started_at),
                row.finished_at.map(timestamp).unwrap_or_default(),
                row.error.unwrap_or_default(),
            ]
        })
        .collect())
}

async fn fetch_result_records(pool: &SqlitePool) -> Result<Vec<Vec<String>>, ExportError> {
    let rows = sqlx::query_as::<_, ResultRow>(
        "SELECT id, run_id, provider, date, tokens, cost, raw_json, created_at \
         FROM results \
         ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            vec![
                row.id.to_string(),
                row.run_id,
                row.provider,
                row.date.to_string(),
                row.tokens.to_string(),
                row.cost.to_string(),
                row.raw_json,
                timestamp(row.created_at),
            ]
        })
        .collect())
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}
