//! Compiled regex patterns for session identifiers and tool artifacts.
//!
//! Update these when the claude or codex on-disk formats change.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Session Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// A full-string UUID match. Both tools use UUIDs as resumable session ids.
pub static RE_SESSION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

// ═══════════════════════════════════════════════════════════════════════════════
// Codex Rollout Journals
// ═══════════════════════════════════════════════════════════════════════════════

/// Codex keeps `rollout-<timestamp>-<uuid>.jsonl` open for the lifetime of a
/// session, under either the dated sessions tree or the archive.
pub static RE_CODEX_ROLLOUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/\.codex/(?:sessions/\d{4}/\d{2}/\d{2}|archived_sessions)/rollout-[^-\s]+-[0-9]{2}-[0-9]{2}T[0-9]{2}-[0-9]{2}-[0-9]{2}-([0-9a-f-]{36})\.jsonl",
    )
    .unwrap()
});

/// Returns true if `value` has the shape of a resumable session id.
pub fn is_session_id(value: &str) -> bool {
    RE_SESSION_ID.is_match(value)
}
