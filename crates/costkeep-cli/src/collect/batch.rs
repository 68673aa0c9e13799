//! Runs the collector over every configured provider, one after another.

use chrono::NaiveDate;
use costkeep_core::Credentials;
use costkeep_providers::UsageProvider;
use sqlx::SqlitePool;

use super::engine::{collect_provider, RunOutcome};

/// A provider together with the credential it needs.
pub(crate) struct ProviderEntry {
    pub provider: Box<dyn UsageProvider>,
    pub api_key_var: String,
}

/// Aggregate over one batch. Unconfigured providers are not attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unconfigured: usize,
}

impl BatchSummary {
    /// At least one provider ran and none of them failed.
    pub(crate) fn is_success(&self) -> bool {
        self.attempted > 0 && self.failed == 0
    }

    fn record(&mut self, outcome: &RunOutcome) {
        self.attempted += 1;
        match outcome {
            RunOutcome::Success { .. } => self.succeeded += 1,
            RunOutcome::Skipped { .. } => self.skipped += 1,
            RunOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Runs every entry whose credential is present, in order. A failing
/// provider never stops the ones after it.
pub(crate) async fn run_batch(
    pool: &SqlitePool,
    entries: &[ProviderEntry],
    credentials: &Credentials,
    target_date: Option<NaiveDate>,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for entry in entries {
        let name = entry.provider.name();
        if !credentials.contains(&entry.api_key_var) {
            tracing::warn!(
                provider = name,
                var = %entry.api_key_var,
                "no credential configured, skipping provider"
            );
            summary.unconfigured += 1;
            continue;
        }

        let outcome = collect_provider(
            pool,
            entry.provider.as_ref(),
            &entry.api_key_var,
            credentials,
            target_date,
        )
        .await;
        tracing::debug!(
            provider = name,
            run_id = outcome.run_id(),
            ok = outcome.is_ok(),
            "provider finished"
        );
        summary.record(&outcome);
    }

    if summary.attempted == 0 {
        tracing::error!(
            unconfigured = summary.unconfigured,
            "no providers configured; set at least one provider API key"
        );
    }

    tracing::info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        unconfigured = summary.unconfigured,
        "collection batch finished"
    );

    summary
}
