//! Collection command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. Per-provider failures are recorded on their run and reported
//! through the exit status rather than propagated, so one bad provider does
//! not abort the others.

pub(crate) mod batch;
pub(crate) mod engine;

use chrono::NaiveDate;
use costkeep_core::{AppConfig, Credentials};
use costkeep_providers::ProviderKind;
use sqlx::SqlitePool;

use batch::{run_batch, ProviderEntry};
use engine::{collect_provider, RunOutcome};

/// Builds a batch entry for every built-in provider, in registry order.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed.
pub(crate) fn builtin_entries(config: &AppConfig) -> anyhow::Result<Vec<ProviderEntry>> {
    ProviderKind::ALL
        .into_iter()
        .map(|kind| {
            let provider = kind
                .build(config.http_timeout_secs)
                .map_err(|e| anyhow::anyhow!("failed to build {} client: {e}", kind.name()))?;
            Ok(ProviderEntry {
                provider,
                api_key_var: kind.api_key_var().to_string(),
            })
        })
        .collect()
}

/// Collect one provider for `date` (yesterday when `None`).
///
/// Returns `Ok(true)` on success or skip, `Ok(false)` if the attempt failed.
///
/// # Errors
///
/// Returns an error only if the provider client cannot be constructed; the
/// attempt itself never propagates.
pub(crate) async fn run_fetch(
    pool: &SqlitePool,
    config: &AppConfig,
    credentials: &Credentials,
    kind: ProviderKind,
    date: Option<NaiveDate>,
) -> anyhow::Result<bool> {
    let provider = kind
        .build(config.http_timeout_secs)
        .map_err(|e| anyhow::anyhow!("failed to build {} client: {e}", kind.name()))?;

    let outcome =
        collect_provider(pool, provider.as_ref(), kind.api_key_var(), credentials, date).await;

    match &outcome {
        RunOutcome::Success {
            run_id,
            date,
            tokens,
            cost,
        } => println!(
            "{}: collected {date}: {tokens} tokens, ${cost:.2} (run {run_id})",
            kind.name()
        ),
        RunOutcome::Skipped { run_id, date } => println!(
            "{}: data for {date} already collected, skipped (run {run_id})",
            kind.name()
        ),
        RunOutcome::Failed { run_id, error } => {
            eprintln!("error: {} collection failed: {error} (run {run_id})", kind.name());
        }
    }

    Ok(outcome.is_ok())
}

/// Collect every built-in provider that has a credential.
///
/// Returns `Ok(true)` when at least one provider ran and none failed.
///
/// # Errors
///
/// Returns an error only if a provider client cannot be constructed.
pub(crate) async fn run_all(
    pool: &SqlitePool,
    config: &AppConfig,
    credentials: &Credentials,
    date: Option<NaiveDate>,
) -> anyhow::Result<bool> {
    let entries = builtin_entries(config)?;
    let summary = run_batch(pool, &entries, credentials, date).await;

    println!(
        "run-all: {} attempted, {} succeeded, {} skipped, {} failed, {} unconfigured",
        summary.attempted, summary.succeeded, summary.skipped, summary.failed, summary.unconfigured
    );
    if summary.attempted == 0 {
        eprintln!("error: no providers configured; set OPENAI_API_KEY or ANTHROPIC_API_KEY");
    }

    Ok(summary.is_success())
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
