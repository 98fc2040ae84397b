//! cmux workspace and pane addressing.
//!
//! cmux exposes its layout through its CLI:
//!
//! ```text
//! cmux --json --id-format both list-workspaces            → {"workspaces":[{id,title,ref}]}
//! cmux --json list-pane-surfaces --workspace <ref>        → {"surfaces":[{id,ref,index}]}
//! cmux send --surface <ref> <text> / send-key ... enter   → type + confirm
//! ```
//!
//! Listings may also come back as a bare JSON array. Unparseable output is an
//! empty listing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RestoreError, Result};
use crate::state::StateStore;
use crate::types::ProcessObservation;

const CMUX_BIN: &str = "cmux";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Handle accepted by other cmux commands.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub id: Option<String>,
    pub reference: String,
}

/// Live workspace/pane layout.
pub trait WorkspaceDirectory {
    fn workspaces(&self) -> Result<Vec<WorkspaceInfo>>;
    fn panes(&self, workspace_ref: &str) -> Result<Vec<PaneInfo>>;
}

/// Types a command into a pane and confirms it. Returns true only if every
/// step succeeded.
pub trait PaneSubmitter {
    fn submit(&self, pane_ref: &str, command: &str) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// cmux CLI
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
pub struct CmuxCli;

impl CmuxCli {
    fn run(args: &[&str]) -> Result<String> {
        let output = Command::new(CMUX_BIN)
            .args(args)
            .output()
            .map_err(|err| RestoreError::CommandFailed {
                command: format!("{CMUX_BIN} {}", args.join(" ")),
                details: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(RestoreError::CommandFailed {
                command: format!("{CMUX_BIN} {}", args.join(" ")),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl WorkspaceDirectory for CmuxCli {
    fn workspaces(&self) -> Result<Vec<WorkspaceInfo>> {
        let raw = Self::run(&["--json", "--id-format", "both", "list-workspaces"])?;
        Ok(parse_workspaces(&raw))
    }

    fn panes(&self, workspace_ref: &str) -> Result<Vec<PaneInfo>> {
        let raw = Self::run(&["--json", "list-pane-surfaces", "--workspace", workspace_ref])?;
        Ok(parse_panes(&raw))
    }
}

impl PaneSubmitter for CmuxCli {
    fn submit(&self, pane_ref: &str, command: &str) -> bool {
        submit_with(pane_ref, command, Self::run)
    }
}

/// Types `command` into the pane, then presses enter. Counts as submitted only
/// when both steps succeed; enter is never sent after a failed send.
fn submit_with<F>(pane_ref: &str, command: &str, mut run: F) -> bool
where
    F: FnMut(&[&str]) -> Result<String>,
{
    if let Err(err) = run(&["send", "--surface", pane_ref, command]) {
        debug!(error = %err, "cmux send failed");
        return false;
    }
    if let Err(err) = run(&["send-key", "--surface", pane_ref, "enter"]) {
        debug!(error = %err, "cmux send-key failed");
        return false;
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns the list stored under `key`, or the top-level list itself.
pub fn parse_cmux_json(raw: &str, key: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut obj)) => match obj.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_workspaces(raw: &str) -> Vec<WorkspaceInfo> {
    parse_cmux_json(raw, "workspaces")
        .iter()
        .filter_map(|item| {
            let id = string_field(item, "id");
            let reference = string_field(item, "ref").or_else(|| id.clone())?;
            Some(WorkspaceInfo {
                id,
                title: string_field(item, "title"),
                reference,
            })
        })
        .collect()
}

fn parse_panes(raw: &str) -> Vec<PaneInfo> {
    let mut panes: Vec<(Option<u64>, PaneInfo)> = parse_cmux_json(raw, "surfaces")
        .iter()
        .filter_map(|item| {
            let id = string_field(item, "id");
            let reference = string_field(item, "ref").or_else(|| id.clone())?;
            let index = item.get("index").and_then(Value::as_u64);
            Some((index, PaneInfo { id, reference }))
        })
        .collect();
    // Listed order unless cmux reports explicit indexes.
    if panes.iter().all(|(index, _)| index.is_some()) {
        panes.sort_by_key(|(index, _)| *index);
    }
    panes.into_iter().map(|(_, pane)| pane).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Workspace Name Map
// ═══════════════════════════════════════════════════════════════════════════════

/// Reads the `{workspaceId: title}` map; missing or corrupt means empty.
pub fn load_workspace_map(path: &Path) -> HashMap<String, String> {
    let Ok(content) = fs_err::read_to_string(path) else {
        return HashMap::new();
    };
    match serde_json::from_str::<HashMap<String, Value>>(&content) {
        Ok(map) => map
            .into_iter()
            .filter_map(|(id, title)| title.as_str().map(|t| (id, t.to_string())))
            .collect(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Corrupt workspace map");
            HashMap::new()
        }
    }
}

/// Refreshes the workspace map from the live directory and returns how many
/// workspaces it names.
pub fn refresh_workspace_map(
    directory: &dyn WorkspaceDirectory,
    store: &StateStore,
) -> Result<usize> {
    let map: BTreeMap<String, String> = directory
        .workspaces()?
        .into_iter()
        .filter_map(|ws| Some((ws.id?, ws.title?)))
        .collect();
    crate::state::write_json_atomic(&store.storage().workspace_map_file(), &map)?;
    Ok(map.len())
}

/// Fills in workspace names from `names` and ranks panes within each
/// workspace by their sorted ids.
pub fn enrich_observations(
    observations: &mut [ProcessObservation],
    names: &HashMap<String, String>,
) {
    let mut panes_by_workspace: HashMap<String, BTreeSet<String>> = HashMap::new();
    for obs in observations.iter() {
        if let (Some(ws), Some(pane)) = (&obs.workspace_id, &obs.pane_id) {
            panes_by_workspace
                .entry(ws.clone())
                .or_default()
                .insert(pane.clone());
        }
    }

    for obs in observations.iter_mut() {
        let Some(ws) = obs.workspace_id.clone() else {
            continue;
        };
        if let Some(name) = names.get(&ws) {
            obs.workspace_name = Some(name.clone());
        }
        let rank = obs.pane_id.as_ref().and_then(|pane| {
            panes_by_workspace
                .get(&ws)
                .and_then(|panes| panes.iter().position(|p| p == pane))
        });
        obs.pane_index = Some(rank.unwrap_or(0) as u32);
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Scripted cmux: a fixed layout plus a log of submissions.
    #[derive(Default)]
    pub struct FakeCmux {
        pub workspaces: Vec<WorkspaceInfo>,
        pub panes: HashMap<String, Vec<PaneInfo>>,
        pub listing_fails: bool,
        /// Workspace refs whose pane listing errors.
        pub failing_listings: Vec<String>,
        pub failing_panes: Vec<String>,
        pub sent: RefCell<Vec<(String, String)>>,
    }

    impl FakeCmux {
        pub fn workspace(
            mut self,
            id: &str,
            title: &str,
            reference: &str,
            panes: &[(&str, &str)],
        ) -> Self {
            self.workspaces.push(WorkspaceInfo {
                id: Some(id.to_string()),
                title: Some(title.to_string()),
                reference: reference.to_string(),
            });
            self.panes.insert(
                reference.to_string(),
                panes
                    .iter()
                    .map(|(id, r)| PaneInfo {
                        id: Some(id.to_string()),
                        reference: r.to_string(),
                    })
                    .collect(),
            );
            self
        }
    }

    impl WorkspaceDirectory for FakeCmux {
        fn workspaces(&self) -> Result<Vec<WorkspaceInfo>> {
            if self.listing_fails {
                return Err(RestoreError::CommandFailed {
                    command: "cmux list-workspaces".into(),
                    details: "not running".into(),
                });
            }
            Ok(self.workspaces.clone())
        }

        fn panes(&self, workspace_ref: &str) -> Result<Vec<PaneInfo>> {
            if self.failing_listings.iter().any(|r| r == workspace_ref) {
                return Err(RestoreError::CommandFailed {
                    command: format!("cmux list-pane-surfaces --workspace {workspace_ref}"),
                    details: "workspace closed".into(),
                });
            }
            Ok(self.panes.get(workspace_ref).cloned().unwrap_or_default())
        }
    }

    impl PaneSubmitter for FakeCmux {
        fn submit(&self, pane_ref: &str, command: &str) -> bool {
            if self.failing_panes.iter().any(|p| p == pane_ref) {
                return false;
            }
            self.sent
                .borrow_mut()
                .push((pane_ref.to_string(), command.to_string()));
            true
        }
    }
}
