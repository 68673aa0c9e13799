//! Process-wide tracing setup.
//!
//! [`init`] installs the global subscriber at most once and hands back a
//! [`LogHandle`]; later calls return the same handle without adding sinks.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static HANDLE: OnceLock<LogHandle> = OnceLock::new();

/// Root logging context for one process.
#[derive(Debug)]
pub(crate) struct LogHandle {
    name: &'static str,
    span: tracing::Span,
}

impl LogHandle {
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Span that command dispatch runs inside.
    pub(crate) fn span(&self) -> tracing::Span {
        self.span.clone()
    }
}

/// Installs the subscriber on first call and returns the shared handle.
///
/// The filter comes from `RUST_LOG` when set, else `level`. Events go to
/// stderr and, when `log_file` is `Some`, are appended to that file without
/// ANSI colors. A log file that cannot be opened is reported on stderr and
/// skipped.
pub(crate) fn init(
    name: &'static str,
    level: &str,
    log_file: Option<&Path>,
) -> &'static LogHandle {
    HANDLE.get_or_init(|| {
        install(level, log_file);
        LogHandle {
            name,
            span: tracing::info_span!("costkeep", app = name),
        }
    })
}

fn install(level: &str, log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_layer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        ),
        Err(err) => {
            eprintln!(
                "warning: cannot open log file {}: {err}; logging to stderr only",
                path.display()
            );
            None
        }
    });

    // A subscriber installed elsewhere (e.g. by a test harness) wins.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
