//! Claude transcript history lookup.
//!
//! Claude writes one `<session-id>.jsonl` per session under
//! `~/.claude/projects/<encoded cwd>/`. A session started and abandoned before
//! the first prompt still leaves a file behind; those stubs never hold a
//! `"type": "user"` entry and must not be mistaken for resumable sessions.

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::storage::StorageConfig;

/// Finds the claude project directory for `cwd`, walking up through parents
/// when the exact directory has none.
pub fn find_project_dir(projects_dir: &Path, cwd: &str) -> Option<PathBuf> {
    if cwd.is_empty() {
        return None;
    }
    let mut current = Some(Path::new(cwd));
    while let Some(path) = current {
        let encoded = StorageConfig::encode_path(&path.to_string_lossy());
        let candidate = projects_dir.join(encoded);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = path.parent();
    }
    None
}

/// True if any of the first `scan_lines` lines is a user transcript entry.
pub fn is_real_session(path: &Path, scan_lines: usize) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    BufReader::new(file)
        .lines()
        .take(scan_lines)
        .map_while(|line| line.ok())
        .any(|line| {
            serde_json::from_str::<serde_json::Value>(&line)
                .ok()
                .and_then(|value| value.get("type").and_then(|t| t.as_str()).map(|t| t == "user"))
                .unwrap_or(false)
        })
}

/// Returns up to `count` unclaimed, non-stub session ids from `project_dir`,
/// most recently modified first.
pub fn recent_real_sessions(
    project_dir: &Path,
    count: usize,
    claimed: &HashSet<String>,
    scan_lines: usize,
) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let Ok(entries) = fs::read_dir(project_dir) else {
        return Vec::new();
    };

    let mut candidates: Vec<(SystemTime, String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .filter_map(|path| {
            let session_id = path.file_stem()?.to_str()?.to_string();
            if claimed.contains(&session_id) {
                return None;
            }
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, session_id, path))
        })
        .collect();

    // Newest first; ties broken by id so the order is stable.
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    candidates
        .into_iter()
        .filter(|(_, _, path)| is_real_session(path, scan_lines))
        .map(|(_, session_id, _)| session_id)
        .take(count)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_utils::write_transcript;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn project_dir_walks_up_to_parent() {
        let temp = TempDir::new().unwrap();
        let projects = temp.path().join("projects");
        fs::create_dir_all(projects.join("-work-repo")).unwrap();

        assert_eq!(
            find_project_dir(&projects, "/work/repo/src/deep"),
            Some(projects.join("-work-repo"))
        );
        assert_eq!(find_project_dir(&projects, "/elsewhere"), None);
        assert_eq!(find_project_dir(&projects, ""), None);
    }

    #[test]
    fn stub_files_are_not_real_sessions() {
        let temp = TempDir::new().unwrap();
        let stub = write_transcript(temp.path(), "stub", "file-history-snapshot", 1);
        let real = write_transcript(temp.path(), "real", "user", 1);
        assert!(!is_real_session(&stub, 25));
        assert!(is_real_session(&real, 25));
    }

    #[test]
    fn user_entry_past_scan_window_is_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("late.jsonl");
        let mut content = "{\"type\":\"summary\"}\n".repeat(3);
        content.push_str("{\"type\":\"user\"}\n");
        fs::write(&path, content).unwrap();
        assert!(!is_real_session(&path, 3));
        assert!(is_real_session(&path, 4));
    }

    #[test]
    fn recent_sessions_skip_stubs_and_claimed() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        write_transcript(dir, "11111111-1111-1111-1111-111111111111", "user", 1);
        write_transcript(dir, "22222222-2222-2222-2222-222222222222", "user", 2);
        write_transcript(dir, "33333333-3333-3333-3333-333333333333", "file-history-snapshot", 3);
        fs::write(dir.join("sessions-index.json"), "{}").unwrap();

        let mut claimed = HashSet::new();
        assert_eq!(
            recent_real_sessions(dir, 5, &claimed, 25),
            vec![
                "22222222-2222-2222-2222-222222222222",
                "11111111-1111-1111-1111-111111111111"
            ]
        );

        claimed.insert("22222222-2222-2222-2222-222222222222".to_string());
        assert_eq!(
            recent_real_sessions(dir, 5, &claimed, 25),
            vec!["11111111-1111-1111-1111-111111111111"]
        );
        assert!(recent_real_sessions(dir, 0, &HashSet::new(), 25).is_empty());
    }
}
