//! Storage configuration and path management.
//!
//! `StorageConfig` is the single place that decides where state files live.
//! Production code uses `StorageConfig::from_home()`, which points at
//! `~/.claude/` for durable records and the system temp dir for the
//! ephemeral mirror. Tests use `StorageConfig::with_root(temp_dir)`.

use std::path::{Path, PathBuf};

use crate::error::{RestoreError, Result};
use crate::types::HostContext;

/// Central configuration for all session-restore paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Durable records and claude artifacts (default: ~/.claude)
    claude_root: PathBuf,
    /// Scratch location for the ephemeral mirror (default: system temp dir)
    scratch_dir: PathBuf,
}

impl StorageConfig {
    /// Resolves paths relative to the current user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(RestoreError::HomeDirNotFound)?;
        Ok(Self {
            claude_root: home.join(".claude"),
            scratch_dir: std::env::temp_dir(),
        })
    }

    /// Places every path under `root`. Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            claude_root: root.join(".claude"),
            scratch_dir: root.join("tmp"),
        }
    }

    pub fn claude_root(&self) -> &Path {
        &self.claude_root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // State Records
    // ─────────────────────────────────────────────────────────────────────────────

    /// Last observation list, overwritten every time the signature changes.
    pub fn snapshot_file(&self) -> PathBuf {
        self.scratch_dir.join("ghostty-session-snapshot.json")
    }

    /// Resolved sessions, kept current while a host context is active.
    pub fn live_state_file(&self) -> PathBuf {
        self.claude_root.join("ghostty-live-state.json")
    }

    /// Records which live-state revision a restore already consumed.
    pub fn live_state_marker_file(&self) -> PathBuf {
        self.claude_root.join("ghostty-live-state.consumed")
    }

    /// Entries waiting to be restored on the next host startup.
    pub fn restore_file(&self) -> PathBuf {
        self.claude_root.join("ghostty-restore.json")
    }

    /// `{workspaceId: title}` map refreshed from cmux.
    pub fn workspace_map_file(&self) -> PathBuf {
        self.claude_root.join("cmux-workspace-map.json")
    }

    /// Directory used as the restore gate for one host context.
    pub fn gate_dir(&self, context: HostContext) -> PathBuf {
        self.claude_root
            .join(format!("session-restore-{}.lock", context.as_str()))
    }

    /// Optional toml policy overrides.
    pub fn policy_file(&self) -> PathBuf {
        self.claude_root.join("session-restore.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.claude_root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool Artifacts (Read-Only)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Claude's per-project transcript directories.
    pub fn claude_projects_dir(&self) -> PathBuf {
        self.claude_root.join("projects")
    }

    /// Encodes a filesystem path the way claude names project directories.
    /// Example: `/Users/pete/Code/my-project` -> `-Users-pete-Code-my-project`
    pub fn encode_path(path: &str) -> String {
        path.replace('/', "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_root_keeps_everything_inside_root() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/restore-test"));
        for path in [
            config.snapshot_file(),
            config.live_state_file(),
            config.restore_file(),
            config.workspace_map_file(),
            config.gate_dir(HostContext::Cmux),
            config.claude_projects_dir(),
        ] {
            assert!(path.starts_with("/tmp/restore-test"), "{}", path.display());
        }
    }

    #[test]
    fn test_record_file_names() {
        let config = StorageConfig::with_root(PathBuf::from("/r"));
        assert_eq!(
            config.restore_file(),
            PathBuf::from("/r/.claude/ghostty-restore.json")
        );
        assert_eq!(
            config.live_state_file(),
            PathBuf::from("/r/.claude/ghostty-live-state.json")
        );
        assert_eq!(
            config.gate_dir(HostContext::Ghostty),
            PathBuf::from("/r/.claude/session-restore-ghostty.lock")
        );
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(
            StorageConfig::encode_path("/Users/pete/Code/my-project"),
            "-Users-pete-Code-my-project"
        );
    }
}
