//! Host-context detection.

use std::collections::BTreeSet;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::Command;

use restore_core::{HostContext, RestorePolicy};
use tracing::debug;

const CMUX_SOCKET_ENV: &str = "CMUX_SOCKET_PATH";

/// Reports which host contexts are running right now.
pub trait HostDetector {
    fn active_contexts(&self) -> BTreeSet<HostContext>;
}

pub struct SystemHostDetector {
    host_binaries: Vec<String>,
    cmux_socket: PathBuf,
}

impl SystemHostDetector {
    pub fn new(policy: &RestorePolicy) -> Self {
        let cmux_socket = std::env::var_os(CMUX_SOCKET_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| policy.cmux_socket.clone());
        Self {
            host_binaries: policy.host_binaries.clone(),
            cmux_socket,
        }
    }

    fn primary_running(&self) -> bool {
        self.host_binaries.iter().any(|name| {
            match Command::new("pgrep").arg("-x").arg(name).output() {
                Ok(output) => {
                    output.status.success()
                        && output.stdout.iter().any(|byte| !byte.is_ascii_whitespace())
                }
                Err(err) => {
                    debug!(error = %err, "pgrep unavailable");
                    false
                }
            }
        })
    }

    fn cmux_running(&self) -> bool {
        UnixStream::connect(&self.cmux_socket).is_ok()
    }
}

impl HostDetector for SystemHostDetector {
    fn active_contexts(&self) -> BTreeSet<HostContext> {
        let mut active = BTreeSet::new();
        if self.primary_running() {
            active.insert(HostContext::Ghostty);
        }
        if self.cmux_running() {
            active.insert(HostContext::Cmux);
        }
        active
    }
}
