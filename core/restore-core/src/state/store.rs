//! File-backed state records.
//!
//! # Defensive Design
//!
//! Both the watcher and the restorer read files the other may be replacing.
//! Loads therefore treat a missing, empty, corrupt or non-array file as an
//! empty list (logging a warning for the latter cases) and normalize every
//! element individually, skipping the ones that don't parse.
//!
//! # Atomic Writes
//!
//! Uses a temp file in the destination directory + rename, so a reader sees
//! either the old content or the new content, never a partial write.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{RestoreError, Result};
use crate::resolver::SessionResolver;
use crate::storage::StorageConfig;
use crate::types::{HostContext, ProcessObservation, ResolvedSession};

use super::merge::{dedupe, merge_scoped};

/// Counts reported after writing the pending-restore record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub total: usize,
    /// Entries with a known session id (`--resume`).
    pub resumed: usize,
    /// Entries that will fall back to "continue most recent".
    pub continued: usize,
}

impl SaveSummary {
    fn of(entries: &[ResolvedSession]) -> Self {
        let resumed = entries.iter().filter(|e| e.session_id.is_some()).count();
        Self {
            total: entries.len(),
            resumed,
            continued: entries.len() - resumed,
        }
    }
}

/// Access to the three state records.
#[derive(Debug, Clone)]
pub struct StateStore {
    storage: StorageConfig,
}

impl StateStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Ephemeral Mirror
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn load_snapshot(&self) -> Vec<ProcessObservation> {
        load_array(&self.storage.snapshot_file())
            .into_iter()
            .filter_map(|value| ProcessObservation::from_value(&value))
            .filter(|obs| !obs.cwd.is_empty())
            .collect()
    }

    pub fn write_snapshot(&self, observations: &[ProcessObservation]) -> Result<()> {
        write_json_atomic(&self.storage.snapshot_file(), &observations)
    }

    pub fn clear_snapshot(&self) {
        remove_if_present(&self.storage.snapshot_file());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Durable Live State
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn load_live_state(&self) -> Vec<ResolvedSession> {
        load_sessions(&self.storage.live_state_file())
    }

    /// Replaces the live-state record and returns how many entries were
    /// written.
    ///
    /// An empty list never overwrites a non-empty record: a host dying mid-query
    /// looks exactly like "no sessions", and the previous list is the one worth
    /// saving. Use [`StateStore::clear_live_state`] once emptiness has persisted.
    pub fn persist_live_state(&self, entries: &[ResolvedSession]) -> Result<usize> {
        if entries.is_empty() {
            if !self.load_live_state().is_empty() {
                debug!("Keeping previous live state over empty resolution");
            }
            return Ok(0);
        }
        write_json_atomic(&self.storage.live_state_file(), &entries)?;
        Ok(entries.len())
    }

    pub fn clear_live_state(&self) {
        remove_if_present(&self.storage.live_state_file());
    }

    /// Modification time of the live-state record, as an opaque revision tag.
    pub fn live_state_revision(&self) -> Option<String> {
        let modified = self
            .storage
            .live_state_file()
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()?;
        Some(DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    /// True if the current live-state revision was already used for a restore.
    pub fn live_state_consumed(&self) -> bool {
        let Some(revision) = self.live_state_revision() else {
            return false;
        };
        fs_err::read_to_string(self.storage.live_state_marker_file())
            .map(|marker| marker.trim() == revision)
            .unwrap_or(false)
    }

    /// Records the current live-state revision as consumed. The live-state
    /// record itself is left untouched.
    pub fn mark_live_state_consumed(&self) -> Result<()> {
        let Some(revision) = self.live_state_revision() else {
            return Ok(());
        };
        let path = self.storage.live_state_marker_file();
        fs_err::write(&path, revision)
            .map_err(|err| RestoreError::io(format!("write {}", path.display()), err))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Pending Restore
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn load_pending(&self) -> Vec<ResolvedSession> {
        load_sessions(&self.storage.restore_file())
    }

    /// Writes the pending-restore record, or removes it when `entries` is empty.
    pub fn write_pending(&self, entries: &[ResolvedSession]) -> Result<()> {
        if entries.is_empty() {
            remove_if_present(&self.storage.restore_file());
            return Ok(());
        }
        write_json_atomic(&self.storage.restore_file(), &entries)
    }

    /// Saves the sessions of `scope` (all contexts when `None`) for the next
    /// restore, preserving queued entries of every other context.
    ///
    /// The live-state record is the source; if it is empty the ephemeral
    /// mirror is resolved on the spot. Nothing is written when neither yields
    /// entries.
    pub fn save_pending(
        &self,
        scope: Option<HostContext>,
        resolver: &SessionResolver<'_>,
    ) -> Result<SaveSummary> {
        let mut source = self.load_live_state();
        if source.is_empty() {
            source = resolver.resolve_batch(&self.load_snapshot());
        }

        let fresh = dedupe(
            source
                .into_iter()
                .filter(|entry| scope.map_or(true, |ctx| entry.host == ctx)),
        );
        if fresh.is_empty() {
            return Ok(SaveSummary::default());
        }

        let merged = merge_scoped(&fresh, &self.load_pending(), scope);
        self.write_pending(&merged)?;

        let summary = SaveSummary::of(&fresh);
        info!(
            scope = scope.map(HostContext::as_str).unwrap_or("all"),
            total = summary.total,
            resumed = summary.resumed,
            continued = summary.continued,
            queued = merged.len(),
            "Saved sessions for restore"
        );
        Ok(summary)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_sessions(path: &Path) -> Vec<ResolvedSession> {
    load_array(path)
        .iter()
        .filter_map(ResolvedSession::from_value)
        .filter(|entry| !entry.cwd.is_empty())
        .collect()
}

fn load_array(path: &Path) -> Vec<Value> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read state file");
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        warn!(path = %path.display(), "Empty state file");
        return Vec::new();
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!(path = %path.display(), "State file is not a list");
            Vec::new()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Corrupt state file");
            Vec::new()
        }
    }
}

/// Serializes `value` to `path` via temp file + rename in the same directory.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        RestoreError::io(
            format!("{} has no parent directory", path.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    fs_err::create_dir_all(parent)
        .map_err(|err| RestoreError::io(format!("create {}", parent.display()), err))?;

    let content = serde_json::to_string_pretty(value)
        .map_err(|err| RestoreError::json(format!("serialize {}", path.display()), err))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|err| RestoreError::io("create temp state file", err))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|err| RestoreError::io("write temp state file", err))?;
    temp_file
        .flush()
        .map_err(|err| RestoreError::io("flush temp state file", err))?;
    temp_file
        .persist(path)
        .map_err(|err| RestoreError::io(format!("replace {}", path.display()), err.error))?;
    Ok(())
}

fn remove_if_present(path: &Path) {
    match fs_err::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(error = %err, "Failed to remove state file"),
    }
}
