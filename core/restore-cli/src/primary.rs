//! Ghostty modes.
//!
//! The calling tab is itself a restore target: the first queued session is
//! handed back instead of opened, so the shell that ran us can become it.

use std::env;
use std::io::{self, BufRead, Write};
use std::os::unix::process::CommandExt;
use std::process::Command;

use restore_core::invocation::shell_command;
use restore_core::restorer::{load_candidates, run_tabs};
use restore_core::state::merge::of_host;
use restore_core::{
    GhosttyTabLauncher, Handoff, HostContext, ResolvedSession, RestoreGate, RestorePolicy,
    StateStore,
};
use tracing::{debug, info};

/// Query mode: prints `{tool, sessionId, cwd, flags, command}` for the calling
/// tab, or nothing when there is nothing to restore.
pub fn run_auto(store: &StateStore, policy: &RestorePolicy) -> Result<(), String> {
    let Some(_gate) = acquire_gate(store, policy) else {
        return Ok(());
    };

    let outcome = run_tabs(store, &GhosttyTabLauncher);
    let Some(entry) = outcome.handoff else {
        debug!("Nothing to restore");
        return Ok(());
    };

    let handoff = Handoff::from_entry(&entry).map_err(|err| err.to_string())?;
    let line = serde_json::to_string(&handoff)
        .map_err(|err| format!("Failed to encode restore record: {err}"))?;
    println!("{line}");
    info!(
        restored = outcome.restored,
        requeued = outcome.unmatched.len(),
        "Restore handed back"
    );
    Ok(())
}

/// Lists the queued sessions, asks once, then restores and replaces this
/// process with the first session.
pub fn run_interactive(store: &StateStore, policy: &RestorePolicy) -> Result<(), String> {
    let Some(gate) = acquire_gate(store, policy) else {
        println!("Another restore is already running.");
        return Ok(());
    };

    let candidates = of_host(&load_candidates(store).entries, HostContext::Ghostty);
    if candidates.is_empty() {
        println!("No sessions to restore.");
        return Ok(());
    }

    println!("Sessions to restore:");
    for (index, entry) in candidates.iter().enumerate() {
        println!("  {}. {}", index + 1, describe(entry));
    }
    if !confirm(&format!("Restore {} session(s)? [Y/n] ", candidates.len()))? {
        return Ok(());
    }

    let outcome = run_tabs(store, &GhosttyTabLauncher);
    if !outcome.unmatched.is_empty() {
        println!(
            "{} session(s) could not be opened and stay queued.",
            outcome.unmatched.len()
        );
    }
    let Some(entry) = outcome.handoff else {
        return Ok(());
    };
    let command = shell_command(&entry).map_err(|err| err.to_string())?;

    // exec never returns on success, so the gate would never be released.
    drop(gate);
    let shell = env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let err = Command::new(&shell).arg("-c").arg(&command).exec();
    Err(format!("Failed to run {shell}: {err}"))
}

fn acquire_gate(store: &StateStore, policy: &RestorePolicy) -> Option<RestoreGate> {
    let gate_dir = store.storage().gate_dir(HostContext::Ghostty);
    let gate = RestoreGate::acquire(&gate_dir, policy.gate_stale_after());
    if gate.is_none() {
        info!("Ghostty restore already running");
    }
    gate
}

fn describe(entry: &ResolvedSession) -> String {
    let target = entry.session_id.as_deref().unwrap_or("most recent");
    let mut line = format!("{} {} in {}", entry.tool, target, entry.cwd);
    if !entry.flags.is_empty() {
        line.push_str(&format!(" ({})", entry.flags.join(" ")));
    }
    line
}

fn confirm(prompt: &str) -> Result<bool, String> {
    print!("{prompt}");
    io::stdout()
        .flush()
        .map_err(|err| format!("Failed to write prompt: {err}"))?;
    let mut answer = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|err| format!("Failed to read answer: {err}"))?;
    // Closed stdin is not consent.
    Ok(read > 0 && is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes")
}
