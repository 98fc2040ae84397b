//! Process discovery.
//!
//! Walks the process table once per poll cycle and keeps the claude/codex
//! processes that live inside an active host context. Which context a process
//! belongs to is decided by [`HostClassifier`]s; the first classifier that
//! recognizes a process wins, so more specific classifiers go first.
//!
//! Every data source is behind [`ProcessSource`]. A failed query for one pid
//! drops that candidate only.

mod system;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::RestorePolicy;
use crate::invocation;
use crate::types::{HostContext, ProcessObservation, ToolKind};

pub use system::SystemProcessSource;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub pid: u32,
    pub ppid: u32,
    pub tty: String,
    /// Executable name or path.
    pub command: String,
    /// Full command line.
    pub args: String,
}

/// Black-box process data.
pub trait ProcessSource {
    /// Current process table; empty if it cannot be read.
    fn process_table(&self) -> Vec<ProcessRow>;
    /// Working directory of `pid`, if discoverable.
    fn working_dir(&self, pid: u32) -> Option<String>;
    /// Raw environment dump of `pid`; empty if unavailable.
    fn environment(&self, pid: u32) -> String;
}

/// Pid-indexed view of the process table.
pub type ProcessIndex = HashMap<u32, ProcessRow>;

/// Host context a process was attributed to, with any addressing hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMatch {
    pub context: HostContext,
    pub workspace_id: Option<String>,
    pub pane_id: Option<String>,
}

/// Decides whether a process runs inside one kind of host context.
pub trait HostClassifier {
    fn context(&self) -> HostContext;
    fn classify(
        &self,
        row: &ProcessRow,
        table: &ProcessIndex,
        source: &dyn ProcessSource,
    ) -> Option<HostMatch>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Classifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches processes with a host binary among their ancestors.
pub struct AncestryClassifier {
    context: HostContext,
    host_binaries: Vec<String>,
    max_hops: usize,
}

impl AncestryClassifier {
    pub fn new(context: HostContext, host_binaries: &[String], max_hops: usize) -> Self {
        Self {
            context,
            host_binaries: host_binaries.iter().map(|b| b.to_ascii_lowercase()).collect(),
            max_hops,
        }
    }

    fn is_host(&self, command: &str) -> bool {
        let base = command.rsplit('/').next().unwrap_or(command);
        self.host_binaries.contains(&base.to_ascii_lowercase())
    }
}

impl HostClassifier for AncestryClassifier {
    fn context(&self) -> HostContext {
        self.context
    }

    fn classify(
        &self,
        row: &ProcessRow,
        table: &ProcessIndex,
        _source: &dyn ProcessSource,
    ) -> Option<HostMatch> {
        let mut pid = row.ppid;
        for _ in 0..self.max_hops {
            if pid <= 1 {
                break;
            }
            let parent = table.get(&pid)?;
            if self.is_host(&parent.command) {
                return Some(HostMatch {
                    context: self.context,
                    workspace_id: None,
                    pane_id: None,
                });
            }
            pid = parent.ppid;
        }
        None
    }
}

/// Matches processes whose environment names a cmux workspace and surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceEnvClassifier;

impl HostClassifier for WorkspaceEnvClassifier {
    fn context(&self) -> HostContext {
        HostContext::Cmux
    }

    fn classify(
        &self,
        row: &ProcessRow,
        _table: &ProcessIndex,
        source: &dyn ProcessSource,
    ) -> Option<HostMatch> {
        let (workspace_id, pane_id) = parse_workspace_env(&source.environment(row.pid))?;
        Some(HostMatch {
            context: HostContext::Cmux,
            workspace_id: Some(workspace_id),
            pane_id: Some(pane_id),
        })
    }
}

/// Extracts `CMUX_WORKSPACE_ID` and `CMUX_SURFACE_ID` from an environment
/// dump. Both must be present and non-empty.
pub fn parse_workspace_env(text: &str) -> Option<(String, String)> {
    let mut workspace = None;
    let mut surface = None;
    for token in text.split_whitespace() {
        if let Some(value) = token.strip_prefix("CMUX_WORKSPACE_ID=") {
            workspace = Some(value.to_string());
        } else if let Some(value) = token.strip_prefix("CMUX_SURFACE_ID=") {
            surface = Some(value.to_string());
        }
    }
    match (workspace, surface) {
        (Some(w), Some(s)) if !w.is_empty() && !s.is_empty() => Some((w, s)),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Observer
// ═══════════════════════════════════════════════════════════════════════════════

/// Interpreters that may run either tool as a script.
const SCRIPT_HOSTS: &[&str] = &["node", "bun", "deno"];

/// The tool a row runs and its command line starting at the tool itself.
/// `node /opt/lib/claude --model x` becomes `/opt/lib/claude --model x`.
fn tool_invocation(row: &ProcessRow) -> Option<(ToolKind, String)> {
    if let Some(tool) = ToolKind::from_command_name(&row.command) {
        return Some((tool, row.args.clone()));
    }
    let host = row.command.rsplit('/').next().unwrap_or(&row.command);
    if !SCRIPT_HOSTS.contains(&host) {
        return None;
    }
    let tokens = invocation::tokenize(&row.args);
    let script = tokens.iter().skip(1).position(|t| !t.starts_with('-'))? + 1;
    let tool = ToolKind::from_command_name(&tokens[script])?;
    Some((tool, tokens[script..].join(" ")))
}

pub struct ProcessObserver {
    classifiers: Vec<Box<dyn HostClassifier>>,
}

impl ProcessObserver {
    /// Environment markers first: a cmux pane may itself descend from a
    /// ghostty-named process.
    pub fn new(policy: &RestorePolicy) -> Self {
        Self::with_classifiers(vec![
            Box::new(WorkspaceEnvClassifier),
            Box::new(AncestryClassifier::new(
                HostContext::Ghostty,
                &policy.host_binaries,
                policy.ancestry_hops,
            )),
        ])
    }

    pub fn with_classifiers(classifiers: Vec<Box<dyn HostClassifier>>) -> Self {
        Self { classifiers }
    }

    /// Lists tool processes inside `active` host contexts, ordered by
    /// terminal then pid.
    pub fn observe(
        &self,
        source: &dyn ProcessSource,
        active: &BTreeSet<HostContext>,
    ) -> Vec<ProcessObservation> {
        if active.is_empty() {
            return Vec::new();
        }
        let table: ProcessIndex = source
            .process_table()
            .into_iter()
            .map(|row| (row.pid, row))
            .collect();

        let mut seen = HashSet::new();
        let mut observations = Vec::new();
        for row in table.values() {
            let Some((tool, command_line)) = tool_invocation(row) else {
                continue;
            };
            if tool == ToolKind::Codex && !invocation::codex_is_interactive(&command_line) {
                continue;
            }
            if !seen.insert(row.pid) {
                continue;
            }

            let Some(host) = self
                .classifiers
                .iter()
                .filter(|c| active.contains(&c.context()))
                .find_map(|c| c.classify(row, &table, source))
            else {
                continue;
            };

            let Some(cwd) = source.working_dir(row.pid).filter(|cwd| !cwd.is_empty()) else {
                debug!(pid = row.pid, "Skipping process without working directory");
                continue;
            };

            let mut observation = ProcessObservation::new(row.pid, tool, cwd, command_line);
            observation.terminal_slot = row.tty.clone();
            observation.host = host.context;
            observation.workspace_id = host.workspace_id;
            observation.pane_id = host.pane_id;
            observations.push(observation);
        }

        observations.sort_by(|a, b| {
            a.terminal_slot
                .cmp(&b.terminal_slot)
                .then_with(|| a.pid.cmp(&b.pid))
        });
        observations
    }
}
