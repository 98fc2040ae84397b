use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct WatcherGuard {
    child: Child,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_watcher(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_session-watcher"))
        .env("HOME", home)
        .env("CMUX_SOCKET_PATH", home.join("no-cmux.sock"))
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn session-watcher")
}

fn read_logs(dir: &Path) -> String {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return String::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_to_string(entry.path()).ok())
        .collect()
}

fn wait_for_log(dir: &Path, needle: &str, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if read_logs(dir).contains(needle) {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for {needle:?} in {}", dir.display());
}

#[test]
fn watcher_stops_cleanly_on_sigterm() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let logs = home.path().join(".claude").join("logs");
    let mut guard = WatcherGuard {
        child: spawn_watcher(home.path()),
    };

    wait_for_log(&logs, "Session watcher started", Duration::from_secs(5));

    let pid = guard.child.id() as libc::pid_t;
    assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = guard.child.try_wait().expect("Failed to poll watcher") {
            break status;
        }
        assert!(Instant::now() < deadline, "Watcher did not exit after SIGTERM");
        sleep(Duration::from_millis(25));
    };

    assert!(status.success());
    wait_for_log(&logs, "Session watcher stopped", Duration::from_secs(2));
}
