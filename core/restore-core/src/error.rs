//! Error types for restore-core operations.
//!
//! Most failures in this crate are transient (a missing binary, a file that
//! vanished between listing and reading) and get converted into skips at the
//! call site. `RestoreError` covers what callers may want to surface.

use std::path::PathBuf;

/// All errors that can occur in restore-core operations.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    // ─────────────────────────────────────────────────────────────────────
    // Setup Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Action Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Cannot build shell command: {0}")]
    UnquotableCommand(String),
}

impl RestoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RestoreError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        RestoreError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using RestoreError.
pub type Result<T> = std::result::Result<T, RestoreError>;
