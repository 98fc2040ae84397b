//! Opening Ghostty tabs.
//!
//! Ghostty has no tab-scripting API, so a new tab is opened by sending ⌘T
//! through System Events and typing the command into it.

use std::process::Command;

use tracing::debug;

/// Opens a new tab in the primary host and runs `command` in it.
pub trait TabLauncher {
    fn open_tab(&self, command: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GhosttyTabLauncher;

impl TabLauncher for GhosttyTabLauncher {
    fn open_tab(&self, command: &str) -> bool {
        let script = new_tab_script(command);
        match Command::new("osascript").arg("-e").arg(&script).output() {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                debug!(
                    status = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "osascript failed"
                );
                false
            }
            Err(err) => {
                debug!(error = %err, "osascript unavailable");
                false
            }
        }
    }
}

fn new_tab_script(command: &str) -> String {
    format!(
        r#"tell application "Ghostty" to activate
tell application "System Events"
    keystroke "t" using command down
    delay 0.4
    keystroke "{}"
    key code 36
end tell"#,
        applescript_escape(command)
    )
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
