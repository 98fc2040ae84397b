//! Session identity resolution.
//!
//! Each observation is resolved through a chain of tiers; the first hit wins:
//!
//! 1. **Invocation** - `claude --resume <id>` / `codex resume <id>`.
//! 2. **Live artifact** - the codex rollout journal the process holds open.
//! 3. **History** - the newest unclaimed, non-stub claude transcripts in the
//!    project directory, handed out in order to every unresolved process that
//!    maps to that directory.
//! 4. **Nothing** - the id stays null and restore falls back to the tool's
//!    own "continue most recent" mode.
//!
//! Every id handed out is claimed for the rest of the batch, so two processes
//! never resume the same session.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::history;
use crate::invocation;
use crate::patterns::RE_CODEX_ROLLOUT;
use crate::types::{HostContext, ProcessObservation, ResolvedSession, ToolKind};

/// Source of the open-file listing for a process.
pub trait OpenFileProbe {
    /// Raw listing text; empty when the process is gone or the query failed.
    fn open_files(&self, pid: u32) -> String;
}

/// A probe that never finds anything. Used when resolving from a saved
/// mirror, where the processes no longer exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpenFiles;

impl OpenFileProbe for NoOpenFiles {
    fn open_files(&self, _pid: u32) -> String {
        String::new()
    }
}

/// Pulls a codex session id out of an open-file listing.
pub fn codex_session_from_open_files(text: &str) -> Option<String> {
    RE_CODEX_ROLLOUT
        .captures(text)
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// Session ids already handed out in the current batch, per tool.
#[derive(Debug, Default, Clone)]
pub struct ClaimSet {
    claimed: HashSet<(ToolKind, String)>,
}

impl ClaimSet {
    /// Returns false if the id was already claimed.
    pub fn claim(&mut self, tool: ToolKind, session_id: &str) -> bool {
        self.claimed.insert((tool, session_id.to_string()))
    }

    pub fn is_claimed(&self, tool: ToolKind, session_id: &str) -> bool {
        self.claimed.contains(&(tool, session_id.to_string()))
    }

    fn ids(&self, tool: ToolKind) -> HashSet<String> {
        self.claimed
            .iter()
            .filter(|(t, _)| *t == tool)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

pub struct SessionResolver<'a> {
    projects_dir: PathBuf,
    probe: &'a dyn OpenFileProbe,
    stub_scan_lines: usize,
}

impl<'a> SessionResolver<'a> {
    pub fn new(projects_dir: &Path, probe: &'a dyn OpenFileProbe, stub_scan_lines: usize) -> Self {
        Self {
            projects_dir: projects_dir.to_path_buf(),
            probe,
            stub_scan_lines,
        }
    }

    /// Runs tiers 1 and 2 for a single observation. Ids in `claimed` are
    /// never returned.
    pub fn resolve(&self, observation: &ProcessObservation, claimed: &ClaimSet) -> Option<String> {
        let tool = observation.tool;
        let unclaimed = |id: &String| !claimed.is_claimed(tool, id);

        if let Some(id) =
            invocation::resume_id(tool, &observation.invocation).filter(|id| unclaimed(id))
        {
            return Some(id);
        }
        if let Some(id) = observation.session_id.clone().filter(|id| unclaimed(id)) {
            return Some(id);
        }
        self.live_artifact(observation).filter(|id| unclaimed(id))
    }

    fn live_artifact(&self, observation: &ProcessObservation) -> Option<String> {
        match observation.tool {
            ToolKind::Codex => {
                codex_session_from_open_files(&self.probe.open_files(observation.pid))
            }
            ToolKind::Claude => None,
        }
    }

    /// Records live-artifact ids on the observations themselves so they
    /// survive in the ephemeral mirror after the process exits.
    pub fn annotate_live_artifacts(&self, observations: &mut [ProcessObservation]) {
        for observation in observations.iter_mut() {
            if observation.session_id.is_some()
                || invocation::resume_id(observation.tool, &observation.invocation).is_some()
            {
                continue;
            }
            observation.session_id = self.live_artifact(observation);
        }
    }

    /// Resolves a whole batch, including the shared-history tier.
    pub fn resolve_batch(&self, observations: &[ProcessObservation]) -> Vec<ResolvedSession> {
        let mut claimed = ClaimSet::default();
        let mut ids: Vec<Option<String>> = Vec::with_capacity(observations.len());

        for observation in observations {
            let id = self.resolve(observation, &claimed);
            if let Some(id) = &id {
                claimed.claim(observation.tool, id);
            }
            ids.push(id);
        }

        // Group unresolved claude processes by project directory, keeping
        // first-seen order so assignment follows the observation order.
        let mut groups: Vec<(PathBuf, Vec<usize>)> = Vec::new();
        for (index, observation) in observations.iter().enumerate() {
            if ids[index].is_some() || observation.tool != ToolKind::Claude {
                continue;
            }
            let Some(dir) = history::find_project_dir(&self.projects_dir, &observation.cwd) else {
                continue;
            };
            match groups.iter_mut().find(|(d, _)| *d == dir) {
                Some((_, members)) => members.push(index),
                None => groups.push((dir, vec![index])),
            }
        }

        for (dir, members) in groups {
            let found = history::recent_real_sessions(
                &dir,
                members.len(),
                &claimed.ids(ToolKind::Claude),
                self.stub_scan_lines,
            );
            for (index, id) in members.into_iter().zip(found) {
                claimed.claim(ToolKind::Claude, &id);
                ids[index] = Some(id);
            }
        }

        observations
            .iter()
            .zip(ids)
            .map(|(observation, session_id)| to_resolved(observation, session_id))
            .collect()
    }
}

fn to_resolved(observation: &ProcessObservation, session_id: Option<String>) -> ResolvedSession {
    let host = observation.host_context();
    let mut entry = ResolvedSession::new(observation.tool, session_id, observation.cwd.clone());
    entry.flags = invocation::extract_flags(observation.tool, &observation.invocation);
    entry.host = host;
    if host == HostContext::Cmux {
        entry.workspace_name = observation.workspace_name.clone();
        entry.workspace_id = observation.workspace_id.clone();
        entry.pane_id = observation.pane_id.clone();
        entry.pane_index = Some(observation.pane_index.unwrap_or(0));
    }
    entry
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::collections::HashMap;

    use super::OpenFileProbe;

    /// Canned open-file listings keyed by pid.
    #[derive(Default)]
    pub struct FakeOpenFiles {
        pub listings: HashMap<u32, String>,
    }

    impl OpenFileProbe for FakeOpenFiles {
        fn open_files(&self, pid: u32) -> String {
            self.listings.get(&pid).cloned().unwrap_or_default()
        }
    }
}
