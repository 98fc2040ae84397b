//! Persisted session state.
//!
//! Three JSON records, all replaced atomically (temp file + rename):
//!
//! ```text
//! watcher ──► ephemeral mirror   (observations, scratch dir)
//!        ──► live state          (resolved sessions, ~/.claude)
//!        ──► pending restore     (written at host-close boundaries)
//!                  │
//! restorer ◄───────┘  (reads pending, falls back to live state)
//! ```
//!
//! Ghostty and cmux share the pending-restore file. Writes scoped to one host
//! context go through [`merge::merge_scoped`] so the other context's entries
//! survive.
//!
//! # Module Structure
//!
//! - [`merge`]: pure dedup / scoped-merge functions
//! - [`store`]: file-backed [`StateStore`]

pub mod merge;
mod store;

pub use merge::{dedupe, merge_scoped};
pub use store::{SaveSummary, StateStore};
pub(crate) use store::write_json_atomic;
