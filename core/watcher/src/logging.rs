//! File logging for the watcher.
//!
//! Logs go to `~/.claude/logs/session-watcher.log` (daily rotation). The
//! filter comes from `RUST_LOG`; `SESSION_RESTORE_DEBUG_LOG=1` forces debug.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "session-watcher.log";
const DEBUG_ENV: &str = "SESSION_RESTORE_DEBUG_LOG";

/// Installs the global subscriber. The returned guard flushes pending lines
/// on drop and must live until exit.
pub fn init(logs_dir: &Path) -> Result<WorkerGuard, String> {
    fs_err::create_dir_all(logs_dir).map_err(|err| format!("cannot create log directory: {err}"))?;

    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
