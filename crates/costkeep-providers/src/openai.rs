//! OpenAI usage adapter.

use async_trait::async_trait;
use chrono::NaiveDate;
use costkeep_core::NormalizedUsage;

use crate::client::UsageApiClient;
use crate::error::FetchError;
use crate::normalize::normalize_totals;
use crate::provider::UsageProvider;

pub const OPENAI_PROVIDER_NAME: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// Collects daily usage from the OpenAI usage endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: UsageApiClient,
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be constructed.
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout_secs)
    }

    /// Points the adapter at a different API root (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the client cannot be constructed or
    /// `base_url` is not a valid URL.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        Ok(Self {
            client: UsageApiClient::new(base_url, timeout_secs)?,
        })
    }
}

#[async_trait]
impl UsageProvider for OpenAiProvider {
    fn name(&self) -> &str {
        OPENAI_PROVIDER_NAME
    }

    async fn fetch(
        &self,
        api_key: &str,
        date: NaiveDate,
    ) -> Result<serde_json::Value, FetchError> {
        let url = self.client.usage_url(date)?;
        let request = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        tracing::debug!(provider = OPENAI_PROVIDER_NAME, %date, "requesting usage");
        self.client.send_json(&url, request).await
    }

    fn normalize(&self, raw: &serde_json::Value, date: NaiveDate) -> NormalizedUsage {
        normalize_totals(OPENAI_PROVIDER_NAME, raw, date)
    }
}
