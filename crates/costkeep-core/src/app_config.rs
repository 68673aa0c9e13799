use std::path::PathBuf;

/// Process-wide settings read from the environment.
///
/// Provider credentials are resolved separately through
/// [`crate::Credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// `None` when file logging is disabled (`COSTKEEP_LOG_FILE=""`).
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub export_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}
