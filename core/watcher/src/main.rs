//! session-watcher: tracks claude/codex sessions in Ghostty and cmux.
//!
//! Polls on a fixed cadence. Every cycle it detects which host contexts are
//! running, observes the tool processes inside them, and hands both to the
//! [`machine::Watcher`] state machine, which keeps the live-state record
//! current and writes the pending-restore record when a host closes.

mod host;
mod logging;
mod machine;
mod signal;

use std::thread;
use std::time::{Duration, Instant};

use restore_core::{ProcessObserver, RestorePolicy, StateStore, StorageConfig, SystemProcessSource};
use tracing::{error, info};

use host::{HostDetector, SystemHostDetector};
use machine::Watcher;

/// Longest stretch between shutdown-flag checks.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

fn main() {
    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("session-watcher: {err}");
            std::process::exit(1);
        }
    };

    let _logging_guard = match logging::init(&storage.logs_dir()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("session-watcher: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = signal::install_handlers() {
        error!(error = %err, "Signal setup failed");
        std::process::exit(1);
    }

    let policy = RestorePolicy::load_or_default(&storage.policy_file());
    info!(
        poll_secs = policy.poll_interval_secs,
        grace_secs = policy.empty_grace_secs,
        "Session watcher started"
    );

    let store = StateStore::new(storage);
    let source = SystemProcessSource;
    let observer = ProcessObserver::new(&policy);
    let detector = SystemHostDetector::new(&policy);
    let mut watcher = Watcher::new(&store, &source, &policy);

    while !signal::shutdown_requested() {
        let detected = detector.active_contexts();
        let observations = observer.observe(&source, &detected);
        watcher.tick(&detected, observations, Instant::now());
        sleep_unless_stopped(policy.poll_interval());
    }

    info!(tracked = watcher.active().len(), "Shutdown requested");
    watcher.shutdown(&detector.active_contexts());
    info!("Session watcher stopped");
}

fn sleep_unless_stopped(total: Duration) {
    let deadline = Instant::now() + total;
    while !signal::shutdown_requested() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}
