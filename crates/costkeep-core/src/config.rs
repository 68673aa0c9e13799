use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

pub(crate) const DEFAULT_DB_PATH: &str = "costkeep.db";
pub(crate) const DEFAULT_LOG_FILE: &str = "costkeep.log";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a numeric setting cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files, for tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a numeric setting cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting is optional. The lookup is injected so tests can drive it
/// from a plain `HashMap` instead of mutating the process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let db_path = PathBuf::from(or_default("COSTKEEP_DB_PATH", DEFAULT_DB_PATH));
    let log_file = parse_log_file(&or_default("COSTKEEP_LOG_FILE", DEFAULT_LOG_FILE));
    let log_level = or_default("COSTKEEP_LOG_LEVEL", "info");
    let export_dir = PathBuf::from(or_default("COSTKEEP_EXPORT_DIR", "."));

    let http_timeout_secs = parse_u64("COSTKEEP_HTTP_TIMEOUT_SECS", "30")?;
    if http_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "COSTKEEP_HTTP_TIMEOUT_SECS".to_string(),
            reason: "timeout must be at least one second".to_string(),
        });
    }

    let db_max_connections = parse_u32("COSTKEEP_DB_MAX_CONNECTIONS", "4")?;
    let db_acquire_timeout_secs = parse_u64("COSTKEEP_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        db_path,
        log_file,
        log_level,
        export_dir,
        http_timeout_secs,
        db_max_connections,
        db_acquire_timeout_secs,
    })
}

/// An empty `COSTKEEP_LOG_FILE` turns the file sink off.
fn parse_log_file(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
