//! Poll-cycle state machine.
//!
//! The loop in `main` detects active host contexts and observes processes;
//! everything it does with that data happens in [`Watcher::tick`]. All state
//! that has to survive between cycles lives on the [`Watcher`] itself, so a
//! test can drive it with a synthetic sequence of cycles.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use restore_core::resolver::OpenFileProbe;
use restore_core::workspace::{enrich_observations, load_workspace_map};
use restore_core::{
    HostContext, ProcessObservation, ResolvedSession, RestorePolicy, SessionResolver, StateStore,
    ToolKind,
};
use tracing::{debug, info, warn};

pub struct Watcher<'a> {
    store: &'a StateStore,
    resolver: SessionResolver<'a>,
    empty_grace: Duration,
    active: BTreeSet<HostContext>,
    last_signature: Option<Vec<ProcessObservation>>,
    empty_since: Option<Instant>,
    live_cleared: bool,
    unresolved_codex: BTreeSet<u32>,
}

impl<'a> Watcher<'a> {
    pub fn new(
        store: &'a StateStore,
        probe: &'a dyn OpenFileProbe,
        policy: &RestorePolicy,
    ) -> Self {
        let projects_dir = store.storage().claude_projects_dir();
        Self {
            store,
            resolver: SessionResolver::new(&projects_dir, probe, policy.stub_scan_lines),
            empty_grace: policy.empty_grace(),
            active: BTreeSet::new(),
            last_signature: None,
            empty_since: None,
            live_cleared: false,
            unresolved_codex: BTreeSet::new(),
        }
    }

    pub fn active(&self) -> &BTreeSet<HostContext> {
        &self.active
    }

    /// Runs one poll cycle. `observations` must cover exactly the contexts in
    /// `detected`.
    pub fn tick(
        &mut self,
        detected: &BTreeSet<HostContext>,
        mut observations: Vec<ProcessObservation>,
        now: Instant,
    ) {
        if detected.is_empty() {
            if !self.active.is_empty() {
                info!(contexts = %describe(&self.active), "All host contexts closed");
                self.save(scope_for_final_save(&self.active));
                self.store.clear_snapshot();
                self.reset();
            }
            return;
        }

        let closed: Vec<HostContext> = self.active.difference(detected).copied().collect();
        for context in closed {
            // The live-state record still holds this context's last entries.
            info!(host = %context, "Host context closed");
            self.save(Some(context));
        }
        for context in detected.difference(&self.active) {
            info!(host = %context, "Host context detected");
        }
        self.active = detected.clone();

        self.resolver.annotate_live_artifacts(&mut observations);
        let names = load_workspace_map(&self.store.storage().workspace_map_file());
        enrich_observations(&mut observations, &names);

        if self.last_signature.as_ref() != Some(&observations) {
            self.record(&observations);
        }
        self.track_empty_period(observations.is_empty(), now);
    }

    /// Best-effort save before exit, then drops the ephemeral mirror.
    pub fn shutdown(&mut self, detected: &BTreeSet<HostContext>) {
        let tracked = if self.active.is_empty() {
            detected
        } else {
            &self.active
        };
        let scope = scope_for_final_save(tracked);
        let mirror_has_entries = !self.store.load_snapshot().is_empty();
        if should_save_on_shutdown(tracked, mirror_has_entries) {
            info!(contexts = %describe(tracked), "Final save before exit");
            self.save(scope);
        }
        self.store.clear_snapshot();
        self.reset();
    }

    fn record(&mut self, observations: &[ProcessObservation]) {
        if let Err(err) = self.store.write_snapshot(observations) {
            warn!(error = %err, "Failed to write session snapshot");
            return;
        }
        let resolved = self.resolver.resolve_batch(observations);
        if let Err(err) = self.store.persist_live_state(&resolved) {
            warn!(error = %err, "Failed to write live state");
            return;
        }

        let (message, unresolved) =
            snapshot_log_message(observations, &resolved, &self.unresolved_codex);
        info!("{message}");
        self.unresolved_codex = unresolved;
        self.last_signature = Some(observations.to_vec());
    }

    fn track_empty_period(&mut self, empty: bool, now: Instant) {
        if !empty {
            self.empty_since = None;
            self.live_cleared = false;
            return;
        }
        let since = *self.empty_since.get_or_insert(now);
        if should_clear_live_state(Some(since), now, self.live_cleared, self.empty_grace) {
            info!(
                grace_secs = self.empty_grace.as_secs(),
                "No sessions for the grace window; clearing live state"
            );
            self.store.clear_live_state();
            self.live_cleared = true;
        }
    }

    fn save(&self, scope: Option<HostContext>) {
        match self.store.save_pending(scope, &self.resolver) {
            Ok(summary) if summary.total == 0 => {
                debug!(scope = ?scope, "No sessions to save");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Failed to save sessions for restore"),
        }
    }

    fn reset(&mut self) {
        self.active.clear();
        self.last_signature = None;
        self.empty_since = None;
        self.live_cleared = false;
        self.unresolved_codex.clear();
    }
}

/// A final save covers a single context when only one was active, otherwise
/// every context at once.
pub fn scope_for_final_save(active: &BTreeSet<HostContext>) -> Option<HostContext> {
    if active.len() == 1 {
        active.iter().next().copied()
    } else {
        None
    }
}

pub fn should_save_on_shutdown(active: &BTreeSet<HostContext>, mirror_has_entries: bool) -> bool {
    !active.is_empty() || mirror_has_entries
}

/// True once an empty period has lasted the full grace window, and only the
/// first time.
pub fn should_clear_live_state(
    empty_since: Option<Instant>,
    now: Instant,
    already_cleared: bool,
    grace: Duration,
) -> bool {
    if already_cleared {
        return false;
    }
    empty_since.map_or(false, |since| now.saturating_duration_since(since) >= grace)
}

/// Builds the per-snapshot log line. The unresolved-codex note is only
/// included when that set of pids differs from `previous`.
pub fn snapshot_log_message(
    observations: &[ProcessObservation],
    resolved: &[ResolvedSession],
    previous: &BTreeSet<u32>,
) -> (String, BTreeSet<u32>) {
    let unresolved: BTreeSet<u32> = observations
        .iter()
        .zip(resolved)
        .filter(|(obs, entry)| obs.tool == ToolKind::Codex && entry.session_id.is_none())
        .map(|(obs, _)| obs.pid)
        .collect();

    let mut message = format!("Snapshot: {} session(s)", observations.len());
    if unresolved != *previous && !unresolved.is_empty() {
        message.push_str(&format!(", {} codex unresolved", unresolved.len()));
    }
    (message, unresolved)
}

fn describe(contexts: &BTreeSet<HostContext>) -> String {
    contexts
        .iter()
        .map(|context| context.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
