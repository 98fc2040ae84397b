//! Core types shared by the watcher and the restorer.
//!
//! Two record shapes cross the process boundary as JSON:
//!
//! - [`ProcessObservation`]: one live tool process, as written to the
//!   ephemeral mirror.
//! - [`ResolvedSession`]: one resumable session, as written to the live-state
//!   record and the pending-restore descriptor.
//!
//! Both are read back through their `from_value` constructors
//! ([`ProcessObservation::from_value`], [`ResolvedSession::from_value`]), which
//! tolerate older field names and loosely typed values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ═══════════════════════════════════════════════════════════════════════════════
// Tools and Host Contexts
// ═══════════════════════════════════════════════════════════════════════════════

/// The interactive CLIs whose sessions are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Claude,
    Codex,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Claude => "claude",
            ToolKind::Codex => "codex",
        }
    }

    /// Matches a process or script name (`/usr/local/bin/claude` → Claude).
    pub fn from_command_name(name: &str) -> Option<Self> {
        let base = name.rsplit('/').next().unwrap_or(name);
        match base.to_ascii_lowercase().as_str() {
            "claude" => Some(ToolKind::Claude),
            "codex" => Some(ToolKind::Codex),
            _ => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal application that hosts a session.
///
/// Ghostty is the primary context: sessions are restored into new tabs.
/// cmux is addressed by workspace and pane.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HostContext {
    #[default]
    Ghostty,
    Cmux,
}

impl HostContext {
    pub fn as_str(self) -> &'static str {
        match self {
            HostContext::Ghostty => "ghostty",
            HostContext::Cmux => "cmux",
        }
    }

    /// The other host-context kind.
    pub fn other(self) -> Self {
        match self {
            HostContext::Ghostty => HostContext::Cmux,
            HostContext::Cmux => HostContext::Ghostty,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, HostContext::Ghostty)
    }

    /// Only the alternate context is tagged on disk; no tag means primary.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("cmux") => HostContext::Cmux,
            _ => HostContext::Ghostty,
        }
    }
}

impl fmt::Display for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Process Observation
// ═══════════════════════════════════════════════════════════════════════════════

/// One live tool process, produced fresh every poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessObservation {
    pub pid: u32,
    /// Controlling terminal, used only for stable ordering.
    pub terminal_slot: String,
    pub cwd: String,
    pub tool: ToolKind,
    /// Full command line as reported by the process table.
    pub invocation: String,
    #[serde(rename = "terminal", skip_serializing_if = "HostContext::is_primary")]
    pub host: HostContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_index: Option<u32>,
    /// Identifier recovered from a live artifact while the process was running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ProcessObservation {
    pub fn new(
        pid: u32,
        tool: ToolKind,
        cwd: impl Into<String>,
        invocation: impl Into<String>,
    ) -> Self {
        Self {
            pid,
            terminal_slot: String::new(),
            cwd: cwd.into(),
            tool,
            invocation: invocation.into(),
            host: HostContext::Ghostty,
            workspace_id: None,
            pane_id: None,
            workspace_name: None,
            pane_index: None,
            session_id: None,
        }
    }

    /// Normalizes one mirror entry.
    ///
    /// Older mirrors may lack `tool` or spell it in any case; a missing or
    /// unknown tool is inferred from the command line (codex if it mentions
    /// codex, otherwise claude). Returns `None` for non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let pid = match obj.get("pid") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .and_then(|pid| u32::try_from(pid).ok())
        .unwrap_or(0);

        let invocation = text(&["invocation", "args"]).unwrap_or_default();
        let tool = match text(&["tool"]).map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("claude") => ToolKind::Claude,
            Some("codex") => ToolKind::Codex,
            _ if invocation.to_ascii_lowercase().contains("codex") => ToolKind::Codex,
            _ => ToolKind::Claude,
        };

        let workspace_id = text(&["workspaceId"]);
        let host = match HostContext::from_tag(obj.get("terminal").and_then(Value::as_str)) {
            HostContext::Ghostty if workspace_id.is_some() => HostContext::Cmux,
            host => host,
        };
        let pane_index = obj
            .get("paneIndex")
            .or_else(|| obj.get("surfaceIndex"))
            .filter(|raw| !raw.is_null())
            .map(|raw| coerce_pane_index(Some(raw)));

        Some(ProcessObservation {
            pid,
            terminal_slot: text(&["terminalSlot", "tty"]).unwrap_or_default(),
            cwd: text(&["cwd"]).unwrap_or_default(),
            tool,
            invocation,
            host,
            workspace_id,
            pane_id: text(&["paneId", "surfaceId"]),
            workspace_name: text(&["workspaceName"]),
            pane_index,
            session_id: text(&["sessionId"]),
        })
    }

    /// An observation carrying a workspace id belongs to cmux even when the
    /// tag itself was lost.
    pub fn host_context(&self) -> HostContext {
        if self.workspace_id.is_some() {
            HostContext::Cmux
        } else {
            self.host
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolved Session
// ═══════════════════════════════════════════════════════════════════════════════

/// A resumable session, ready to be persisted or restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSession {
    pub tool: ToolKind,
    pub session_id: Option<String>,
    pub cwd: String,
    pub flags: Vec<String>,
    #[serde(rename = "terminal", skip_serializing_if = "HostContext::is_primary")]
    pub host: HostContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_index: Option<u32>,
}

impl ResolvedSession {
    pub fn new(tool: ToolKind, session_id: Option<String>, cwd: impl Into<String>) -> Self {
        Self {
            tool,
            session_id,
            cwd: cwd.into(),
            flags: Vec::new(),
            host: HostContext::Ghostty,
            workspace_name: None,
            workspace_id: None,
            pane_id: None,
            pane_index: None,
        }
    }

    pub fn with_flags(mut self, flags: &[&str]) -> Self {
        self.flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Tags the entry as living in a cmux pane.
    pub fn in_workspace(
        mut self,
        workspace_id: &str,
        pane_id: Option<&str>,
        pane_index: u32,
    ) -> Self {
        self.host = HostContext::Cmux;
        self.workspace_id = Some(workspace_id.to_string());
        self.pane_id = pane_id.map(str::to_string);
        self.pane_index = Some(pane_index);
        self
    }

    /// Normalizes one persisted entry.
    ///
    /// Returns `None` only for values that are not JSON objects. Unknown tools
    /// fall back to claude, and string-valued `flags` from older writers are
    /// shell-split.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| -> Option<String> {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let tool = match text("tool").map(|t| t.to_ascii_lowercase()).as_deref() {
            Some("codex") => ToolKind::Codex,
            _ => ToolKind::Claude,
        };

        let flags = match obj.get("flags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(raw)) => crate::invocation::tokenize(raw),
            _ => Vec::new(),
        };

        let host = HostContext::from_tag(obj.get("terminal").and_then(Value::as_str));
        let mut entry = ResolvedSession {
            tool,
            session_id: text("sessionId"),
            cwd: text("cwd").unwrap_or_default(),
            flags,
            host,
            workspace_name: None,
            workspace_id: None,
            pane_id: None,
            pane_index: None,
        };

        if host == HostContext::Cmux {
            entry.workspace_name = text("workspaceName");
            entry.workspace_id = text("workspaceId");
            entry.pane_id = text("paneId").or_else(|| text("surfaceId"));
            let raw_index = obj.get("paneIndex").or_else(|| obj.get("surfaceIndex"));
            entry.pane_index = Some(coerce_pane_index(raw_index));
        }

        Some(entry)
    }

    /// Identity used when combining entries from more than one source.
    pub fn dedup_key(&self) -> DedupKey {
        let mut flags = self.flags.clone();
        flags.sort();
        DedupKey {
            tool: self.tool,
            session_id: self.session_id.clone(),
            cwd: self.cwd.clone(),
            flags,
            host: self.host,
            workspace_id: self.workspace_id.clone(),
            pane_id: self.pane_id.clone(),
            pane_index: self.pane_index,
        }
    }
}

/// Composite identity of a [`ResolvedSession`]. Workspace names are display
/// data and deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    tool: ToolKind,
    session_id: Option<String>,
    cwd: String,
    flags: Vec<String>,
    host: HostContext,
    workspace_id: Option<String>,
    pane_id: Option<String>,
    pane_index: Option<u32>,
}

/// Coerces a loosely typed pane index: numeric strings parse, negatives clamp
/// to zero, and anything unparseable becomes zero.
pub fn coerce_pane_index(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
