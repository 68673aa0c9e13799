use std::path::Path;

use costkeep_core::AppConfig;
use sqlx::SqlitePool;

/// Export one table to CSV.
///
/// `table` is checked against the exportable tables before anything touches
/// the database. Without `--output` the file lands in the configured export
/// directory under a timestamped name.
///
/// # Errors
///
/// Returns an error for an unknown table name, or if the rows cannot be read
/// or written.
pub(crate) async fn run_export(
    pool: &SqlitePool,
    config: &AppConfig,
    table: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let written =
        costkeep_db::export_table_by_name(pool, table, output, &config.export_dir).await?;
    tracing::info!(table, path = %written.display(), "export complete");
    println!("exported {table} to {}", written.display());
    Ok(())
}
