mod app_config;
mod config;
mod credentials;
mod usage;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use credentials::Credentials;
pub use usage::{default_target_date, parse_target_date, NormalizedUsage, DATE_FORMAT};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("invalid date \"{value}\": expected YYYY-MM-DD")]
    InvalidDate { value: String },
}
