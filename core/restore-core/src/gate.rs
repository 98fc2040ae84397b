//! Restore gate: one restorer run per host context at a time.
//!
//! The gate is a bare directory. `mkdir` either creates it or fails because
//! it already exists, which makes acquisition atomic across processes. Its
//! modification time is the only payload: a gate older than the staleness
//! threshold belongs to a crashed holder and is removed before acquiring.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// A held gate. The directory is removed on drop.
#[derive(Debug)]
pub struct RestoreGate {
    path: PathBuf,
}

impl RestoreGate {
    /// Tries to take the gate at `path`. Returns `None` if another live run
    /// holds it or the directory cannot be created.
    pub fn acquire(path: &Path, stale_after: Duration) -> Option<Self> {
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(error = %err, path = %parent.display(), "Failed to create gate parent");
                return None;
            }
        }

        evict_if_stale(path, stale_after);

        match fs::create_dir(path) {
            Ok(()) => Some(Self {
                path: path.to_path_buf(),
            }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Restore gate is held");
                None
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "Failed to create restore gate");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RestoreGate {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(error = %err, path = %self.path.display(), "Failed to release restore gate");
            }
        }
    }
}

/// Removes the gate if its mtime is older than `stale_after`.
fn evict_if_stale(path: &Path, stale_after: Duration) {
    let Ok(modified) = path.metadata().and_then(|meta| meta.modified()) else {
        return;
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age >= stale_after {
        debug!(path = %path.display(), age_secs = age.as_secs(), "Evicting stale restore gate");
        let _ = fs::remove_dir_all(path);
    }
}
