//! `ps`/`lsof`-backed process data.
//!
//! Every query is a synchronous subprocess. A missing binary, non-zero exit
//! or unreadable output yields empty text, which callers treat as "unknown".

use std::process::Command;

use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};

use crate::resolver::OpenFileProbe;

use super::{ProcessRow, ProcessSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessSource;

impl ProcessSource for SystemProcessSource {
    fn process_table(&self) -> Vec<ProcessRow> {
        parse_process_table(&run_command(
            "ps",
            &["-axo", "pid=,ppid=,tty=,comm=,args="],
        ))
    }

    fn working_dir(&self, pid: u32) -> Option<String> {
        let pid_arg = pid.to_string();
        let output = run_command("lsof", &["-a", "-p", &pid_arg, "-d", "cwd", "-Fn"]);
        parse_lsof_cwd(&output).or_else(|| sysinfo_cwd(pid))
    }

    fn environment(&self, pid: u32) -> String {
        let pid_arg = pid.to_string();
        run_command("ps", &["eww", "-o", "command=", "-p", &pid_arg])
    }
}

impl OpenFileProbe for SystemProcessSource {
    fn open_files(&self, pid: u32) -> String {
        let pid_arg = pid.to_string();
        run_command("lsof", &["-p", &pid_arg])
    }
}

fn run_command(program: &str, args: &[&str]) -> String {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).to_string()
        }
        Ok(_) => String::new(),
        Err(_) => String::new(),
    }
}

/// Parses `pid ppid tty comm args...` rows. The command column is taken as a
/// single token.
fn parse_process_table(output: &str) -> Vec<ProcessRow> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            let tty = fields.next()?.to_string();
            let command = fields.next()?.to_string();
            let args = fields.collect::<Vec<_>>().join(" ");
            let args = if args.is_empty() { command.clone() } else { args };
            Some(ProcessRow {
                pid,
                ppid,
                tty,
                command,
                args,
            })
        })
        .collect()
}

/// `lsof -Fn` prints the path on a line prefixed with `n`.
fn parse_lsof_cwd(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix('n'))
        .filter(|path| path.starts_with('/'))
        .map(str::to_string)
}

fn sysinfo_cwd(pid: u32) -> Option<String> {
    let mut sys = System::new();
    let sys_pid = Pid::from(pid as usize);
    sys.refresh_process_specifics(
        sys_pid,
        ProcessRefreshKind::new().with_cwd(UpdateKind::Always),
    );
    let cwd = sys.process(sys_pid)?.cwd()?.to_str()?.to_string();
    if cwd.is_empty() {
        None
    } else {
        Some(cwd)
    }
}
