//! # restore-core
//!
//! Shared logic for tracking interactive claude/codex sessions inside Ghostty
//! and cmux, and for restoring them after the host restarts.
//!
//! Two binaries sit on top of this crate:
//!
//! - `session-watcher` polls the process table, resolves every live session to
//!   a resumable identity, and saves the list whenever a host closes.
//! - `session-restore` reads that list when a host starts again and reopens
//!   each session in a tab or pane.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Everything runs on short polling cycles.
//! - **Graceful degradation**: Missing or corrupt files read as empty. A failed
//!   system query reads as "nothing observed".
//! - **Atomic persistence**: Every record is replaced via temp file + rename.
//! - **Seams at the OS**: Process tables, open-file listings, tab launching and
//!   cmux are traits, so the logic is testable without a terminal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restore_core::{SessionResolver, StateStore, StorageConfig, SystemProcessSource};
//!
//! let store = StateStore::new(StorageConfig::from_home()?);
//! let probe = SystemProcessSource::default();
//! let resolver = SessionResolver::new(&store.storage().claude_projects_dir(), &probe, 25);
//! let sessions = resolver.resolve_batch(&store.load_snapshot());
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod invocation;
pub mod launcher;
pub mod observer;
pub mod patterns;
pub mod resolver;
pub mod restorer;
pub mod state;
pub mod storage;
pub mod types;
pub mod workspace;

pub use config::RestorePolicy;
pub use error::{RestoreError, Result};
pub use gate::RestoreGate;
pub use launcher::{GhosttyTabLauncher, TabLauncher};
pub use observer::{ProcessObserver, ProcessSource, SystemProcessSource};
pub use resolver::{OpenFileProbe, SessionResolver};
pub use restorer::{Handoff, RestoreOutcome};
pub use state::{SaveSummary, StateStore};
pub use storage::StorageConfig;
pub use types::*;
pub use workspace::{CmuxCli, PaneSubmitter, WorkspaceDirectory};
