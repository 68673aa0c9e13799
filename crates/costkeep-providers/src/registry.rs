//! The closed set of built-in providers and where their credentials live.

use crate::anthropic::{AnthropicProvider, ANTHROPIC_PROVIDER_NAME};
use crate::error::FetchError;
use crate::openai::{OpenAiProvider, OPENAI_PROVIDER_NAME};
use crate::provider::UsageProvider;

/// A built-in provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Every built-in provider, in collection order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Anthropic];

    /// Canonical name, as stored in `results.provider`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => OPENAI_PROVIDER_NAME,
            ProviderKind::Anthropic => ANTHROPIC_PROVIDER_NAME,
        }
    }

    /// Command-line selector.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key.
    #[must_use]
    pub const fn api_key_var(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Credential variables of every built-in provider.
    pub fn api_key_vars() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(Self::api_key_var)
    }

    /// Constructs the adapter against the provider's production API.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be constructed.
    pub fn build(self, timeout_secs: u64) -> Result<Box<dyn UsageProvider>, FetchError> {
        Ok(match self {
            ProviderKind::OpenAi => Box::new(OpenAiProvider::new(timeout_secs)?),
            ProviderKind::Anthropic => Box::new(AnthropicProvider::new(timeout_secs)?),
        })
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    /// Accepts the slug or the canonical name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.slug().eq_ignore_ascii_case(wanted) || kind.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.slug()).collect();
                format!("unknown provider '{s}': expected one of {}", known.join(", "))
            })
    }
}
