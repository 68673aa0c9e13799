use async_trait::async_trait;
use chrono::NaiveDate;
use costkeep_core::NormalizedUsage;

use crate::error::FetchError;

/// The capability a usage source must offer to be collected.
///
/// The collector only ever calls these methods, so supporting a new provider
/// means adding an implementation, not touching the collector.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Canonical provider name stored in `results.provider` (e.g. `"OpenAI"`).
    fn name(&self) -> &str;

    /// Fetches the raw usage payload for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the endpoint is unreachable, times out,
    /// answers with a non-2xx status, or returns a non-JSON body.
    async fn fetch(&self, api_key: &str, date: NaiveDate)
        -> Result<serde_json::Value, FetchError>;

    /// Maps a raw payload onto the canonical shape. Never fails.
    fn normalize(&self, raw: &serde_json::Value, date: NaiveDate) -> NormalizedUsage;
}
