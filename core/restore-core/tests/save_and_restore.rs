use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use restore_core::resolver::NoOpenFiles;
use restore_core::restorer::run_tabs;
use restore_core::{
    HostContext, ProcessObservation, SessionResolver, StateStore, StorageConfig, TabLauncher,
    ToolKind,
};
use tempfile::TempDir;

const PINNED: &str = "aaaaaaaa-0000-4000-8000-000000000001";
const NEWER: &str = "bbbbbbbb-0000-4000-8000-000000000002";
const OLDER: &str = "cccccccc-0000-4000-8000-000000000003";
const STUB: &str = "dddddddd-0000-4000-8000-000000000004";

#[derive(Default)]
struct RecordingLauncher {
    opened: RefCell<Vec<String>>,
}

impl TabLauncher for RecordingLauncher {
    fn open_tab(&self, command: &str) -> bool {
        self.opened.borrow_mut().push(command.to_string());
        true
    }
}

fn write_history(dir: &Path, session_id: &str, first_line: &str, age_secs: u64) {
    let path = dir.join(format!("{session_id}.jsonl"));
    let mut file = File::create(&path).unwrap();
    writeln!(file, "{first_line}").unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}

#[test]
fn mirror_resolves_saves_and_restores_in_order() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(StorageConfig::with_root(temp.path().to_path_buf()));

    let project = temp.path().join("work").join("app");
    std::fs::create_dir_all(&project).unwrap();
    let cwd = project.to_string_lossy().to_string();

    let history = store
        .storage()
        .claude_projects_dir()
        .join(StorageConfig::encode_path(&cwd));
    std::fs::create_dir_all(&history).unwrap();
    write_history(&history, STUB, r#"{"type":"summary"}"#, 10);
    write_history(&history, NEWER, r#"{"type":"user","message":"hi"}"#, 20);
    write_history(&history, OLDER, r#"{"type":"user","message":"hi"}"#, 30);

    let mut pinned =
        ProcessObservation::new(1, ToolKind::Claude, &cwd, format!("claude -r {PINNED}"));
    pinned.terminal_slot = "ttys001".into();
    let mut first = ProcessObservation::new(2, ToolKind::Claude, &cwd, "claude --model opus");
    first.terminal_slot = "ttys002".into();
    let mut second = ProcessObservation::new(3, ToolKind::Claude, &cwd, "claude");
    second.terminal_slot = "ttys003".into();
    let mut codex = ProcessObservation::new(4, ToolKind::Codex, &cwd, "codex --search");
    codex.terminal_slot = "ttys004".into();
    store
        .write_snapshot(&[pinned, first, second, codex])
        .unwrap();

    let probe = NoOpenFiles;
    let resolver = SessionResolver::new(&store.storage().claude_projects_dir(), &probe, 25);
    let summary = store.save_pending(None, &resolver).unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.resumed, 3);
    assert_eq!(summary.continued, 1);

    let pending = store.load_pending();
    let ids: Vec<Option<&str>> = pending.iter().map(|e| e.session_id.as_deref()).collect();
    assert_eq!(ids, vec![Some(PINNED), Some(NEWER), Some(OLDER), None]);
    assert!(pending.iter().all(|e| e.host == HostContext::Ghostty));

    let launcher = RecordingLauncher::default();
    let outcome = run_tabs(&store, &launcher);
    assert_eq!(outcome.restored, 4);
    assert_eq!(
        outcome.handoff.and_then(|e| e.session_id).as_deref(),
        Some(PINNED)
    );

    let opened = launcher.opened.borrow();
    assert_eq!(opened.len(), 3);
    assert!(opened[0].ends_with(&format!("claude --resume {NEWER} --model opus")));
    assert!(opened[1].ends_with(&format!("claude --resume {OLDER}")));
    assert!(opened[2].ends_with("codex resume --last --search"));
    assert!(!store.storage().restore_file().exists());
}
