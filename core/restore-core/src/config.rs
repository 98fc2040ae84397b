//! Policy constants for the watcher and restorer.
//!
//! Every field has a built-in default. `~/.claude/session-restore.toml` may
//! override any subset of them:
//!
//! ```toml
//! poll_interval_secs = 2
//! empty_grace_secs = 8
//! gate_stale_secs = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RestoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RestorePolicy {
    /// Seconds between watcher poll cycles.
    pub poll_interval_secs: u64,
    /// How long the live-state record survives an empty observation period.
    pub empty_grace_secs: u64,
    /// Age after which a restore gate is considered abandoned.
    pub gate_stale_secs: u64,
    /// How far up the process tree to look for a host binary.
    pub ancestry_hops: usize,
    /// Lines inspected before a history file is declared a stub.
    pub stub_scan_lines: usize,
    /// Process names that identify the primary host context.
    pub host_binaries: Vec<String>,
    /// Control socket probed to decide whether cmux is running.
    pub cmux_socket: PathBuf,
}

impl Default for RestorePolicy {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            empty_grace_secs: 8,
            gate_stale_secs: 300,
            ancestry_hops: 6,
            stub_scan_lines: 25,
            host_binaries: vec!["ghostty".to_string()],
            cmux_socket: PathBuf::from("/tmp/cmux.sock"),
        }
    }
}

impl RestorePolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn empty_grace(&self) -> Duration {
        Duration::from_secs(self.empty_grace_secs)
    }

    pub fn gate_stale_after(&self) -> Duration {
        Duration::from_secs(self.gate_stale_secs)
    }

    /// Loads the policy file, returning defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs_err::read_to_string(path)
            .map_err(|err| RestoreError::io(format!("read {}", path.display()), err))?;
        toml::from_str::<Self>(&content).map_err(|err| RestoreError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    /// Like [`RestorePolicy::load`], but a broken file only costs a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(policy) => policy,
            Err(err) => {
                tracing::warn!(error = %err, "Using default restore policy");
                Self::default()
            }
        }
    }
}
