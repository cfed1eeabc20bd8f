//! Structured logging for parla using the tracing crate.
//!
//! Writes to daily-rotated files under the XDG state directory so log
//! output never interleaves with the conversation transcript on the
//! terminal. Old log files are pruned at startup, keeping one week.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

const LOG_FILE_PREFIX: &str = "parla.log";
const RETAINED_LOG_FILES: usize = 7;

/// Keeps the non-blocking appender's worker alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes file-based logging.
///
/// Log level comes from the RUST_LOG environment variable and defaults
/// to "info".
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> anyhow::Result<()> {
    let dir = log_dir()?;

    if let Err(e) = prune_old_logs(&dir) {
        eprintln!("Warning: failed to prune old logs: {e}");
    }

    let file_appender = rolling::daily(&dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", dir.display());
    Ok(())
}

/// Log directory per the XDG Base Directory Specification:
/// `$XDG_STATE_HOME/parla`, or `~/.local/state/parla` when unset.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn log_dir() -> anyhow::Result<PathBuf> {
    let dir = match std::env::var("XDG_STATE_HOME") {
        Ok(xdg_state) if !xdg_state.is_empty() => PathBuf::from(xdg_state).join("parla"),
        _ => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local/state/parla"),
    };

    fs::create_dir_all(&dir)?;

    Ok(dir)
}

/// Removes rotated log files beyond the newest [`RETAINED_LOG_FILES`].
/// Rotated files carry a `parla.log.YYYY-MM-DD` name, so a lexicographic
/// sort on the file name is also a chronological sort.
fn prune_old_logs(dir: &Path) -> anyhow::Result<()> {
    let mut rotated: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?;
            name.strip_prefix(LOG_FILE_PREFIX)
                .filter(|suffix| suffix.starts_with('.'))
                .is_some()
                .then_some(path)
        })
        .collect();

    rotated.sort();
    rotated.reverse();

    for path in rotated.iter().skip(RETAINED_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Warning: failed to delete {}: {e}", path.display());
        }
    }

    Ok(())
}
