//! Shared HTTP plumbing for provider usage endpoints.
//!
//! Wraps `reqwest` with a request timeout, base-URL handling (so tests can
//! point a provider at a mock server) and uniform status/JSON error mapping.
//! Requests are never retried; a failed request fails the run.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Url};

use crate::error::FetchError;

const USER_AGENT: &str = "costkeep/0.1 (usage-collector)";
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client bound to one provider's API root.
#[derive(Debug, Clone)]
pub struct UsageApiClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl UsageApiClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FetchError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(timeout_secs)))
            .user_agent(USER_AGENT)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends to the path rather than replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| FetchError::InvalidBaseUrl {
            base_url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            timeout_secs,
        })
    }

    /// `GET {base}/v1/usage?date=YYYY-MM-DD`.
    pub(crate) fn usage_url(&self, date: NaiveDate) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join("v1/usage")
            .map_err(|e| FetchError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("date", &date.format(costkeep_core::DATE_FORMAT).to_string());
        Ok(url)
    }

    /// Starts a GET request to `url`; callers add their auth headers.
    pub(crate) fn get(&self, url: &Url) -> RequestBuilder {
        self.client.get(url.clone())
    }

    /// Sends the request, asserts a 2xx status, and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] if the request exceeds the client timeout.
    /// - [`FetchError::Http`] on any other network failure.
    /// - [`FetchError::UnexpectedStatus`] on a non-2xx response.
    /// - [`FetchError::Deserialize`] if the body is not valid JSON.
    pub(crate) async fn send_json(
        &self,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<serde_json::Value, FetchError> {
        let response = request.send().await.map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact(url),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Deserialize {
            context: redact(url),
            source: e,
        })
    }

    fn map_send_error(&self, url: &Url, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: redact(url),
                timeout_secs: self.timeout_secs,
            }
        } else {
            FetchError::Http(err.without_url())
        }
    }
}

/// URL as shown in errors and logs: scheme, host and path only.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
