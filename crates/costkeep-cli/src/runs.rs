use costkeep_db::{RunRow, RunStatus};
use sqlx::SqlitePool;

const ERROR_WIDTH: usize = 60;

/// Print the most recent runs, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_list_runs(
    pool: &SqlitePool,
    status: Option<RunStatus>,
    limit: i64,
) -> anyhow::Result<()> {
    let runs = costkeep_db::list_runs(pool, status, limit.max(1)).await?;

    if runs.is_empty() {
        println!(
            "no runs found{}",
            status.map(|s| format!(" with status {s}")).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{:<38}{:<22}{:<9}{:<22}ERROR",
        "RUN", "PLUGIN", "STATUS", "STARTED"
    );
    for run in &runs {
        println!("{}", format_run_line(run));
    }

    Ok(())
}

fn format_run_line(run: &RunRow) -> String {
    let started = run.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let error = run.error.as_deref().map(truncate).unwrap_or_default();
    format!(
        "{:<38}{:<22}{:<9}{:<22}{}",
        run.id,
        run.plugin_name,
        run.status.as_str(),
        started,
        error
    )
}

fn truncate(text: &str) -> String {
    if text.chars().count() > ERROR_WIDTH {
        format!("{}...", text.chars().take(ERROR_WIDTH).collect::<String>())
    } else {
        text.to_string()
    }
}
