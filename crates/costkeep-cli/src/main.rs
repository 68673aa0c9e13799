mod collect;
mod export;
mod logging;
mod runs;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use costkeep_core::Credentials;
use costkeep_db::{PoolConfig, RunStatus};
use costkeep_providers::ProviderKind;
use tracing::Instrument;

const APP_NAME: &str = "costkeep";

#[derive(Debug, Parser)]
#[command(name = "costkeep")]
#[command(about = "Collects daily LLM usage and cost from provider APIs into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect one provider's usage for a single day
    Fetch {
        /// Provider to collect (openai, anthropic)
        #[arg(value_parser = ProviderKind::from_str)]
        provider: ProviderKind,

        /// Day to collect, YYYY-MM-DD (defaults to yesterday, UTC)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Collect every provider that has an API key configured
    RunAll {
        /// Day to collect, YYYY-MM-DD (defaults to yesterday, UTC)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Export a table to CSV
    Export {
        /// Table to export (results, runs)
        #[arg(long, default_value = "results")]
        table: String,

        /// Output file (defaults to a timestamped file in COSTKEEP_EXPORT_DIR)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List recent collection runs, newest first
    Runs {
        /// Only show runs with this status (running, success, skipped, failed)
        #[arg(long, value_parser = RunStatus::from_str)]
        status: Option<RunStatus>,

        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    costkeep_core::parse_target_date(value).map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        // Printing help is best-effort; the exit code carries the result.
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::FAILURE;
    };

    match run(command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, sets up logging and the database, then dispatches.
///
/// `Ok(false)` means the command ran but at least one collection attempt
/// failed (or none could be attempted).
async fn run(command: Commands) -> anyhow::Result<bool> {
    let config = costkeep_core::load_app_config().context("failed to load configuration")?;
    let log = logging::init(APP_NAME, &config.log_level, config.log_file.as_deref());

    let pool = costkeep_db::connect_pool(&config.db_path, PoolConfig::from_app_config(&config))
        .await
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    costkeep_db::ping(&pool)
        .await
        .with_context(|| format!("database {} is not usable", config.db_path.display()))?;
    let applied = costkeep_db::init_schema(&pool)
        .await
        .context("failed to initialize database schema")?;
    if applied > 0 {
        tracing::info!(applied, db = %config.db_path.display(), "database schema initialized");
    }

    let credentials = Credentials::from_env(ProviderKind::api_key_vars());
    tracing::debug!(app = log.name(), ?credentials, "configuration loaded");

    let outcome = dispatch(command, &pool, &config, &credentials)
        .instrument(log.span())
        .await;

    pool.close().await;
    outcome
}

async fn dispatch(
    command: Commands,
    pool: &sqlx::SqlitePool,
    config: &costkeep_core::AppConfig,
    credentials: &Credentials,
) -> anyhow::Result<bool> {
    match command {
        Commands::Fetch { provider, date } => {
            collect::run_fetch(pool, config, credentials, provider, date).await
        }
        Commands::RunAll { date } => collect::run_all(pool, config, credentials, date).await,
        Commands::Export { table, output } => {
            export::run_export(pool, config, &table, output.as_deref()).await?;
            Ok(true)
        }
        Commands::Runs { status, limit } => {
            runs::run_list_runs(pool, status, limit).await?;
            Ok(true)
        }
    }
}
