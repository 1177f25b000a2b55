//! Logging set-up and log-file housekeeping.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{PosError, PosResult};
use crate::settings::RegisterSettings;

/// Prefix of the daily rolling log files (`register.YYYY-MM-DD`).
const LOG_FILE_PREFIX: &str = "register";

const DEFAULT_FILTER: &str = "info,pos_register=debug";

// ---------------------------------------------------------------------------
// Log rotation
// ---------------------------------------------------------------------------

fn is_log_file(name: &str) -> bool {
    name == LOG_FILE_PREFIX || name.starts_with(&format!("{LOG_FILE_PREFIX}."))
}

/// Prune old log files, keeping only the most recent `keep`. Returns how many
/// files were removed.
pub fn prune_old_logs(log_dir: &Path, keep: usize) -> usize {
    if !log_dir.exists() {
        return 0;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if is_log_file(name) {
                    let modified = entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .unwrap_or(std::time::UNIX_EPOCH);
                    log_files.push((path, modified));
                }
            }
        }
    }

    // Newest first; names carry the date so they break mtime ties.
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Install the global subscriber: `RUST_LOG`-style filter, console output and
/// a daily rolling file. Keep the returned guard alive for the life of the
/// process; dropping it flushes and stops the file writer.
pub fn init_logging(settings: &RegisterSettings) -> PosResult<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let log_dir = settings.log_dir();
    fs::create_dir_all(&log_dir)
        .map_err(|e| PosError::Settings(format!("create log dir {}: {e}", log_dir.display())))?;
    let pruned = prune_old_logs(&log_dir, settings.max_log_files);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (text_file_layer, json_file_layer) = if settings.json_logs {
        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true);
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true);
        (Some(layer), None)
    };
    let console_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(text_file_layer)
        .with(json_file_layer)
        .try_init()
        .map_err(|e| PosError::Settings(format!("logging already initialised: {e}")))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("BUILD_GIT_SHA"),
        log_dir = %log_dir.display(),
        pruned,
        "Starting pos-register"
    );
    Ok(guard)
}
