//! One provider, one date: the tracked collection protocol.
//!
//! 1. record a `running` run (committed on its own)
//! 2. resolve the provider's credential
//! 3. pick the target date (explicit, else yesterday UTC)
//! 4. skip if a result for (provider, date) is already stored
//! 5. fetch, normalize, then store the result and mark the run `success`
//!    in one transaction
//!
//! Any failure in steps 2-5 is written to the run as `failed` and returned as
//! [`RunOutcome::Failed`]; nothing here panics or propagates an error.

use chrono::{NaiveDate, Utc};
use costkeep_core::{default_target_date, Credentials};
use costkeep_db::{DbError, ResultRow};
use costkeep_providers::{FetchError, UsageProvider};
use sqlx::SqlitePool;
use thiserror::Error;

/// Why a collection attempt failed. The `Display` text is what ends up in
/// `runs.error`.
#[derive(Debug, Error)]
pub(crate) enum CollectError {
    #[error("{var} is not set; configure it in the environment or .env")]
    MissingCredential { var: String },

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("normalized usage for {provider} is invalid: {reason}")]
    Normalization { provider: String, reason: String },

    #[error("result for {provider} on {date} was stored by a concurrent run")]
    LostRace { provider: String, date: NaiveDate },

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

/// What happened to one collection attempt.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RunOutcome {
    Success {
        run_id: String,
        date: NaiveDate,
        tokens: i64,
        cost: f64,
    },
    /// Data for the date was already stored; no fetch was made.
    Skipped { run_id: String, date: NaiveDate },
    Failed { run_id: String, error: String },
}

impl RunOutcome {
    /// `true` for success and skip; a skip is correct avoidance of duplicate
    /// work, not an error.
    pub(crate) fn is_ok(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }

    pub(crate) fn run_id(&self) -> &str {
        match self {
            RunOutcome::Success { run_id, .. }
            | RunOutcome::Skipped { run_id, .. }
            | RunOutcome::Failed { run_id, .. } => run_id,
        }
    }
}

enum Attempt {
    Stored(ResultRow),
    AlreadyCollected(NaiveDate),
}

/// `runs.plugin_name` for a provider, e.g. `openai_collector`.
pub(crate) fn plugin_name(provider_name: &str) -> String {
    format!("{}_collector", provider_name.to_lowercase())
}

/// Runs the tracked collection protocol for one provider.
///
/// `api_key_var` names the credential in `credentials`; `target_date`
/// defaults to yesterday (UTC).
pub(crate) async fn collect_provider<P>(
    pool: &SqlitePool,
    provider: &P,
    api_key_var: &str,
    credentials: &Credentials,
    target_date: Option<NaiveDate>,
) -> RunOutcome
where
    P: UsageProvider + ?Sized,
{
    let name = provider.name();
    let run_id = costkeep_db::new_run_id();

    tracing::info!(provider = name, %run_id, "starting collection");

    if let Err(err) = costkeep_db::begin_run(pool, &run_id, &plugin_name(name)).await {
        tracing::error!(provider = name, %run_id, error = %err, "could not record run start");
        return RunOutcome::Failed {
            run_id,
            error: err.to_string(),
        };
    }

    match attempt(pool, provider, &run_id, api_key_var, credentials, target_date).await {
        Ok(Attempt::Stored(row)) => {
            tracing::info!(
                provider = name,
                %run_id,
                date = %row.date,
                tokens = row.tokens,
                cost = format!("{:.2}", row.cost),
                "collection successful"
            );
            RunOutcome::Success {
                run_id,
                date: row.date,
                tokens: row.tokens,
                cost: row.cost,
            }
        }
        Ok(Attempt::AlreadyCollected(date)) => {
            tracing::info!(provider = name, %run_id, %date, "data already collected, skipping");
            RunOutcome::Skipped { run_id, date }
        }
        Err(err) => {
            let message = err.to_string();
            fail_run_best_effort(pool, &run_id, name, &message).await;
            tracing::error!(provider = name, %run_id, error = %message, "collection failed");
            RunOutcome::Failed {
                run_id,
                error: message,
            }
        }
    }
}

async fn attempt<P>(
    pool: &SqlitePool,
    provider: &P,
    run_id: &str,
    api_key_var: &str,
    credentials: &Credentials,
    target_date: Option<NaiveDate>,
) -> Result<Attempt, CollectError>
where
    P: UsageProvider + ?Sized,
{
    let name = provider.name();

    let api_key = credentials
        .get(api_key_var)
        .ok_or_else(|| CollectError::MissingCredential {
            var: api_key_var.to_string(),
        })?;

    let date = target_date.unwrap_or_else(|| default_target_date(Utc::now()));

    // Fast path only: the UNIQUE(provider, date) constraint is what actually
    // prevents duplicates when runs race.
    if costkeep_db::find_result(pool, name, date).await?.is_some() {
        costkeep_db::skip_run(pool, run_id).await?;
        return Ok(Attempt::AlreadyCollected(date));
    }

    let raw = provider.fetch(api_key, date).await?;
    let usage = provider.normalize(&raw, date);

    if usage.provider != name || usage.date != date {
        return Err(CollectError::Normalization {
            provider: name.to_string(),
            reason: format!(
                "expected {name} on {date}, got {} on {}",
                usage.provider, usage.date
            ),
        });
    }
    if let Some(reason) = usage.problem() {
        return Err(CollectError::Normalization {
            provider: name.to_string(),
            reason,
        });
    }

    let row = costkeep_db::complete_run_with_result(pool, run_id, &usage)
        .await
        .map_err(|err| match err {
            DbError::DuplicateResult { .. } => CollectError::LostRace {
                provider: name.to_string(),
                date,
            },
            other => CollectError::Storage(other),
        })?;

    Ok(Attempt::Stored(row))
}

/// Marks the run failed; if even that write fails, log it and move on.
async fn fail_run_best_effort(pool: &SqlitePool, run_id: &str, provider: &str, message: &str) {
    if let Err(mark_err) = costkeep_db::fail_run(pool, run_id, message).await {
        tracing::error!(
            run_id,
            provider,
            error = %mark_err,
            "failed to mark run as failed"
        );
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
