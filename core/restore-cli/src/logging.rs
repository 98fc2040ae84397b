//! File-only logging.
//!
//! Startup scripts parse stdout and treat any stderr output as failure, so
//! nothing is ever logged to the console. Logs go to
//! `~/.claude/logs/session-restore.log`; if that directory cannot be created
//! the run continues without logging.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "session-restore.log";

pub fn init(logs_dir: &Path) -> Option<WorkerGuard> {
    fs_err::create_dir_all(logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let debug_enabled = env::var("SESSION_RESTORE_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}
