//! Restoring saved sessions into a freshly started host.
//!
//! A run handles exactly one host context:
//!
//! - **Ghostty**: the first entry is handed back to the caller, which runs it
//!   in the tab that invoked the restorer. The rest open new tabs; the first
//!   tab that fails to open stops the run, and it plus everything after it is
//!   requeued.
//! - **cmux**: each entry is matched to a live workspace pane (by id, then by
//!   name or position) and typed into it. Entries that cannot be matched or
//!   submitted are requeued; the run never stops early.
//!
//! Afterwards the pending-restore record is rewritten with the requeued
//! entries plus every saved entry of the *other* context, deduplicated. The
//! live-state record is only ever read.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::invocation;
use crate::launcher::TabLauncher;
use crate::state::merge::of_host;
use crate::state::{dedupe, StateStore};
use crate::types::{HostContext, ResolvedSession, ToolKind};
use crate::workspace::{PaneInfo, PaneSubmitter, WorkspaceDirectory, WorkspaceInfo};

/// Result of one restore run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored: usize,
    /// Entries that were not restored, in their original order.
    pub unmatched: Vec<ResolvedSession>,
    /// Entry the caller should run itself (Ghostty only).
    pub handoff: Option<ResolvedSession>,
}

/// Restore candidates and where they came from.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub entries: Vec<ResolvedSession>,
    pub from_live_state: bool,
}

/// Single-line record printed for the shell that invoked the restorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    pub tool: ToolKind,
    pub session_id: Option<String>,
    pub cwd: String,
    pub flags: Vec<String>,
    pub command: String,
}

impl Handoff {
    pub fn from_entry(entry: &ResolvedSession) -> Result<Self> {
        Ok(Self {
            tool: entry.tool,
            session_id: entry.session_id.clone(),
            cwd: entry.cwd.clone(),
            flags: entry.flags.clone(),
            command: invocation::shell_command(entry)?,
        })
    }
}

fn cwd_exists(entry: &ResolvedSession) -> bool {
    Path::new(&entry.cwd).is_dir()
}

/// Loads what should be restored.
///
/// The pending-restore record wins whenever it holds any entry. Otherwise the
/// live-state record is used, unless that exact revision was already consumed
/// by an earlier run. Entries whose directory no longer exists are dropped.
pub fn load_candidates(store: &StateStore) -> Candidates {
    let pending = store.load_pending();
    if !pending.is_empty() {
        return Candidates {
            entries: pending.into_iter().filter(cwd_exists).collect(),
            from_live_state: false,
        };
    }
    if store.live_state_consumed() {
        debug!("Live state already restored once; nothing to do");
        return Candidates::default();
    }
    Candidates {
        entries: store.load_live_state().into_iter().filter(cwd_exists).collect(),
        from_live_state: true,
    }
}

/// Saved entries of `host` from both records, deduplicated.
fn preserved_entries(store: &StateStore, host: HostContext) -> Vec<ResolvedSession> {
    let pending = of_host(&store.load_pending(), host);
    let live = of_host(&store.load_live_state(), host);
    dedupe(pending.into_iter().chain(live).filter(cwd_exists))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matching
// ═══════════════════════════════════════════════════════════════════════════════

/// Restores Ghostty entries. The first is handed back; the rest open tabs
/// until one fails.
pub fn restore_tabs(entries: Vec<ResolvedSession>, launcher: &dyn TabLauncher) -> RestoreOutcome {
    let mut iter = entries.into_iter();
    let handoff = iter.next();
    let rest: Vec<ResolvedSession> = iter.collect();
    let mut outcome = RestoreOutcome {
        restored: usize::from(handoff.is_some()),
        unmatched: Vec::new(),
        handoff,
    };

    for (index, entry) in rest.iter().enumerate() {
        let opened = match invocation::shell_command(entry) {
            Ok(command) => launcher.open_tab(&command),
            Err(err) => {
                warn!(error = %err, cwd = %entry.cwd, "Cannot build restore command");
                false
            }
        };
        if !opened {
            warn!(remaining = rest.len() - index, "Tab launch failed; requeueing");
            outcome.unmatched = rest[index..].to_vec();
            break;
        }
        outcome.restored += 1;
    }
    outcome
}

/// Restores cmux entries into their panes, requeueing every miss.
pub fn restore_panes<D>(entries: Vec<ResolvedSession>, cmux: &D) -> RestoreOutcome
where
    D: WorkspaceDirectory + PaneSubmitter + ?Sized,
{
    let mut outcome = RestoreOutcome::default();
    if entries.is_empty() {
        return outcome;
    }

    let workspaces = match cmux.workspaces() {
        Ok(workspaces) => workspaces,
        Err(err) => {
            warn!(error = %err, "Workspace listing failed; requeueing all");
            outcome.unmatched = entries;
            return outcome;
        }
    };

    for entry in entries {
        let Some(pane_ref) = locate_pane(&entry, &workspaces, cmux) else {
            info!(
                workspace = entry
                    .workspace_name
                    .as_deref()
                    .or(entry.workspace_id.as_deref())
                    .unwrap_or("?"),
                "No live pane for session; requeueing"
            );
            outcome.unmatched.push(entry);
            continue;
        };
        let submitted = match invocation::shell_command(&entry) {
            Ok(command) => cmux.submit(&pane_ref, &command),
            Err(err) => {
                warn!(error = %err, cwd = %entry.cwd, "Cannot build restore command");
                false
            }
        };
        if submitted {
            outcome.restored += 1;
        } else {
            outcome.unmatched.push(entry);
        }
    }
    outcome
}

/// Finds the pane reference for an entry: workspace by id then name, pane by
/// id then position.
fn locate_pane<D>(entry: &ResolvedSession, workspaces: &[WorkspaceInfo], cmux: &D) -> Option<String>
where
    D: WorkspaceDirectory + ?Sized,
{
    let by_id = entry
        .workspace_id
        .as_ref()
        .and_then(|id| workspaces.iter().find(|ws| ws.id.as_ref() == Some(id)));
    let workspace = by_id.or_else(|| {
        entry
            .workspace_name
            .as_ref()
            .and_then(|name| workspaces.iter().find(|ws| ws.title.as_ref() == Some(name)))
    })?;

    let panes: Vec<PaneInfo> = match cmux.panes(&workspace.reference) {
        Ok(panes) => panes,
        Err(err) => {
            debug!(error = %err, "Pane listing failed");
            return None;
        }
    };
    let by_id = entry
        .pane_id
        .as_ref()
        .and_then(|id| panes.iter().find(|pane| pane.id.as_ref() == Some(id)));
    let pane = by_id.or_else(|| panes.get(entry.pane_index.unwrap_or(0) as usize))?;
    Some(pane.reference.clone())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runs
// ═══════════════════════════════════════════════════════════════════════════════

/// Full Ghostty restore: load, restore, requeue.
pub fn run_tabs(store: &StateStore, launcher: &dyn TabLauncher) -> RestoreOutcome {
    let candidates = load_candidates(store);
    let entries = of_host(&candidates.entries, HostContext::Ghostty);
    if entries.is_empty() {
        return RestoreOutcome::default();
    }
    let outcome = restore_tabs(entries, launcher);
    finish(store, HostContext::Ghostty, &outcome, candidates.from_live_state);
    outcome
}

/// Full cmux restore: load, match, requeue.
pub fn run_panes<D>(store: &StateStore, cmux: &D) -> RestoreOutcome
where
    D: WorkspaceDirectory + PaneSubmitter + ?Sized,
{
    let candidates = load_candidates(store);
    let entries = of_host(&candidates.entries, HostContext::Cmux);
    if entries.is_empty() {
        return RestoreOutcome::default();
    }
    let outcome = restore_panes(entries, cmux);
    finish(store, HostContext::Cmux, &outcome, candidates.from_live_state);
    outcome
}

/// Rewrites the pending record with this run's leftovers plus the other
/// context's saved entries. Write failures are logged; the next run starts
/// from whatever is on disk.
fn finish(
    store: &StateStore,
    processed: HostContext,
    outcome: &RestoreOutcome,
    from_live_state: bool,
) {
    let preserved = preserved_entries(store, processed.other());
    let requeue = dedupe(outcome.unmatched.iter().cloned().chain(preserved));
    if let Err(err) = store.write_pending(&requeue) {
        warn!(error = %err, "Failed to requeue sessions");
    }
    if from_live_state {
        if let Err(err) = store.mark_live_state_consumed() {
            warn!(error = %err, "Failed to mark live state as restored");
        }
    }
    info!(
        host = %processed,
        restored = outcome.restored,
        requeued = outcome.unmatched.len(),
        queued = requeue.len(),
        "Restore run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::test_utils::FakeLauncher;
    use crate::storage::StorageConfig;
    use crate::workspace::test_utils::FakeCmux;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        store: StateStore,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let store = StateStore::new(StorageConfig::with_root(temp.path().to_path_buf()));
            Self { temp, store }
        }

        /// Creates a real directory so the entry survives the cwd filter.
        fn dir(&self, name: &str) -> String {
            let path = self.temp.path().join("work").join(name);
            std::fs::create_dir_all(&path).unwrap();
            path.to_string_lossy().to_string()
        }

        fn ghostty(&self, id: &str) -> ResolvedSession {
            ResolvedSession::new(ToolKind::Claude, Some(id.to_string()), self.dir(id))
        }

        fn cmux(
            &self,
            id: &str,
            workspace: &str,
            pane: Option<&str>,
            index: u32,
        ) -> ResolvedSession {
            ResolvedSession::new(ToolKind::Codex, Some(id.to_string()), self.dir(id))
                .in_workspace(workspace, pane, index)
        }
    }

    #[test]
    fn first_tab_is_handed_back_and_rest_are_opened() {
        let fx = Fixture::new();
        let entries = vec![fx.ghostty("a"), fx.ghostty("b"), fx.ghostty("c")];
        fx.store.write_pending(&entries).unwrap();

        let launcher = FakeLauncher::default();
        let outcome = run_tabs(&fx.store, &launcher);

        assert_eq!(outcome.handoff, Some(entries[0].clone()));
        assert_eq!(outcome.restored, 3);
        assert_eq!(launcher.opened.borrow().len(), 2);
        assert!(launcher.opened.borrow()[0].contains("claude --resume b"));
        assert!(!fx.store.storage().restore_file().exists());
    }

    #[test]
    fn tab_failure_requeues_failed_entry_and_everything_after() {
        let fx = Fixture::new();
        let entries = vec![fx.ghostty("a"), fx.ghostty("b"), fx.ghostty("c"), fx.ghostty("d")];
        fx.store.write_pending(&entries).unwrap();

        let launcher = FakeLauncher::failing_from(1);
        let outcome = run_tabs(&fx.store, &launcher);

        assert_eq!(outcome.restored, 2);
        assert_eq!(outcome.unmatched, entries[2..].to_vec());
        assert_eq!(fx.store.load_pending(), entries[2..].to_vec());
    }

    #[test]
    fn tab_run_preserves_cmux_entries_from_both_records() {
        let fx = Fixture::new();
        let g1 = fx.ghostty("g1");
        let g2 = fx.ghostty("g2");
        let c1 = fx.cmux("c1", "ws-1", Some("s-1"), 0);
        let c2 = fx.cmux("c2", "ws-1", Some("s-2"), 1);
        fx.store.write_pending(&[g1.clone(), c1.clone(), g2.clone()]).unwrap();
        fx.store.persist_live_state(&[c1.clone(), c2.clone()]).unwrap();

        let launcher = FakeLauncher::failing_from(0);
        let outcome = run_tabs(&fx.store, &launcher);

        assert_eq!(outcome.handoff, Some(g1));
        assert_eq!(fx.store.load_pending(), vec![g2, c1, c2]);
        // The live-state record is never rewritten by a restore.
        assert_eq!(fx.store.load_live_state().len(), 2);
    }

    #[test]
    fn cmux_only_pending_is_nothing_to_do_for_tabs() {
        let fx = Fixture::new();
        let c1 = fx.cmux("c1", "ws-1", None, 0);
        fx.store.write_pending(&[c1.clone()]).unwrap();
        fx.store.persist_live_state(&[fx.ghostty("live-g"), c1.clone()]).unwrap();

        let outcome = run_tabs(&fx.store, &FakeLauncher::default());
        assert_eq!(outcome, RestoreOutcome::default());
        assert_eq!(fx.store.load_pending(), vec![c1]);
    }

    #[test]
    fn live_state_fallback_is_used_once() {
        let fx = Fixture::new();
        let g = fx.ghostty("g");
        fx.store.persist_live_state(&[g.clone()]).unwrap();

        let first = run_tabs(&fx.store, &FakeLauncher::default());
        assert_eq!(first.handoff, Some(g));
        assert!(fx.store.storage().live_state_file().exists());

        let second = run_tabs(&fx.store, &FakeLauncher::default());
        assert_eq!(second.handoff, None);
    }

    #[test]
    fn missing_directories_are_dropped_and_not_resurrected() {
        let fx = Fixture::new();
        let gone =
            ResolvedSession::new(ToolKind::Claude, Some("gone".into()), "/nonexistent/dir/xyz");
        let a = fx.ghostty("a");
        let b = fx.ghostty("b");
        fx.store.write_pending(&[a.clone(), gone, b.clone()]).unwrap();

        let candidates = load_candidates(&fx.store);
        assert_eq!(candidates.entries, vec![a.clone(), b.clone()]);

        let launcher = FakeLauncher::failing_from(0);
        run_tabs(&fx.store, &launcher);
        assert_eq!(fx.store.load_pending(), vec![b]);
    }

    #[test]
    fn panes_match_by_id_then_name_then_index() {
        let fx = Fixture::new();
        let cmux = FakeCmux::default()
            .workspace("ws-1", "api", "workspace:1", &[("s-1", "surface:1"), ("s-2", "surface:2")])
            .workspace("ws-new", "web", "workspace:2", &[("s-9", "surface:9")]);

        let by_id = fx.cmux("a", "ws-1", Some("s-2"), 0);
        let mut by_name = fx.cmux("b", "ws-stale", Some("s-stale"), 0);
        by_name.workspace_name = Some("web".into());
        let by_index = fx.cmux("c", "ws-1", None, 1);

        let outcome = restore_panes(vec![by_id, by_name, by_index], &cmux);
        assert_eq!(outcome.restored, 3);
        let sent: Vec<String> = cmux.sent.borrow().iter().map(|(r, _)| r.clone()).collect();
        assert_eq!(sent, vec!["surface:2", "surface:9", "surface:2"]);
    }

    #[test]
    fn pane_misses_are_requeued_without_stopping() {
        let fx = Fixture::new();
        let mut cmux = FakeCmux::default()
            .workspace("ws-1", "api", "workspace:1", &[("s-1", "surface:1")]);
        cmux.failing_panes.push("surface:1".into());

        let unknown_ws = fx.cmux("a", "ws-missing", None, 0);
        let out_of_range = fx.cmux("b", "ws-1", None, 5);
        let send_fails = fx.cmux("c", "ws-1", Some("s-1"), 0);
        let outcome = restore_panes(
            vec![unknown_ws.clone(), out_of_range.clone(), send_fails.clone()],
            &cmux,
        );

        assert_eq!(outcome.restored, 0);
        assert_eq!(outcome.unmatched, vec![unknown_ws, out_of_range, send_fails]);
    }

    #[test]
    fn listing_failure_requeues_everything() {
        let fx = Fixture::new();
        let cmux = FakeCmux {
            listing_fails: true,
            ..FakeCmux::default()
        };
        let entries = vec![fx.cmux("a", "ws-1", None, 0), fx.cmux("b", "ws-1", None, 1)];
        let outcome = restore_panes(entries.clone(), &cmux);
        assert_eq!(outcome.unmatched, entries);
    }

    #[test]
    fn pane_listing_failure_requeues_only_that_workspace() {
        let fx = Fixture::new();
        let mut cmux = FakeCmux::default()
            .workspace("ws-1", "api", "workspace:1", &[("s-1", "surface:1")])
            .workspace("ws-2", "web", "workspace:2", &[("s-2", "surface:2")]);
        cmux.failing_listings.push("workspace:1".into());

        let broken = fx.cmux("a", "ws-1", Some("s-1"), 0);
        let healthy = fx.cmux("b", "ws-2", Some("s-2"), 0);
        let outcome = restore_panes(vec![broken.clone(), healthy], &cmux);

        assert_eq!(outcome.restored, 1);
        assert_eq!(outcome.unmatched, vec![broken]);
        let sent: Vec<String> = cmux.sent.borrow().iter().map(|(r, _)| r.clone()).collect();
        assert_eq!(sent, vec!["surface:2"]);
    }

    #[test]
    fn pane_run_preserves_ghostty_from_live_state() {
        let fx = Fixture::new();
        let g = fx.ghostty("g");
        let c = fx.cmux("c", "ws-1", Some("s-1"), 0);
        fx.store.persist_live_state(&[g.clone(), c.clone()]).unwrap();
        let cmux =
            FakeCmux::default().workspace("ws-1", "api", "workspace:1", &[("s-1", "surface:1")]);

        let outcome = run_panes(&fx.store, &cmux);
        assert_eq!(outcome.restored, 1);
        assert_eq!(outcome.handoff, None);
        assert_eq!(fx.store.load_pending(), vec![g]);
    }

    #[test]
    fn handoff_record_carries_shell_command() {
        let entry = ResolvedSession::new(ToolKind::Codex, None, "/tmp/p").with_flags(&["--search"]);
        let handoff = Handoff::from_entry(&entry).unwrap();
        let json = serde_json::to_value(&handoff).unwrap();
        assert_eq!(json["tool"], "codex");
        assert_eq!(json["sessionId"], serde_json::Value::Null);
        assert_eq!(json["command"], "cd /tmp/p && codex resume --last --search");
        assert!(json.get("terminal").is_none());
    }
}
