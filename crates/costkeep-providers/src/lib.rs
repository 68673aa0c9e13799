//! Usage providers: the fetch/normalize capability and its built-in
//! implementations.

pub mod anthropic;
pub mod client;
pub mod error;
pub mod normalize;
pub mod openai;
pub mod provider;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use client::UsageApiClient;
pub use error::FetchError;
pub use normalize::normalize_totals;
pub use openai::OpenAiProvider;
pub use provider::UsageProvider;
pub use registry::ProviderKind;
