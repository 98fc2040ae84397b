//! Command-line inspection and reconstruction for the tracked tools.
//!
//! Invocations come from the process table as a single string. They are split
//! POSIX-style; anything with unbalanced quoting falls back to whitespace
//! splitting so a weird prompt never hides a session.

use crate::error::{RestoreError, Result};
use crate::patterns::is_session_id;
use crate::types::{ResolvedSession, ToolKind};

const CODEX_INTERACTIVE_SUBCOMMANDS: &[&str] = &["resume", "fork"];

const CODEX_NON_INTERACTIVE_SUBCOMMANDS: &[&str] = &[
    "exec",
    "review",
    "login",
    "logout",
    "mcp",
    "mcp-server",
    "app-server",
    "app",
    "completion",
    "sandbox",
    "debug",
    "apply",
    "cloud",
    "features",
    "help",
];

const CLAUDE_OPTS_WITH_VALUE: &[&str] = &[
    "--add-dir",
    "--agent",
    "--agents",
    "--allowedTools",
    "--allowed-tools",
    "--append-system-prompt",
    "--betas",
    "--debug",
    "--debug-file",
    "--disallowedTools",
    "--disallowed-tools",
    "--effort",
    "--fallback-model",
    "--file",
    "--from-pr",
    "--input-format",
    "--json-schema",
    "--max-budget-usd",
    "--mcp-config",
    "--model",
    "--output-format",
    "--permission-mode",
    "--plugin-dir",
    "--session-id",
    "--setting-sources",
    "--settings",
    "--system-prompt",
    "--tools",
    "-r",
];

const CODEX_OPTS_WITH_VALUE: &[&str] = &[
    "-c",
    "--config",
    "--enable",
    "--disable",
    "-i",
    "--image",
    "-m",
    "--model",
    "--local-provider",
    "-p",
    "--profile",
    "-s",
    "--sandbox",
    "-a",
    "--ask-for-approval",
    "-C",
    "--cd",
    "--add-dir",
];

/// Tokens describing the previous resume target. They are replaced by the
/// restore command and never carried over.
const CLAUDE_RESUME_TOKENS: &[&str] = &["--resume", "-r", "--continue", "-c"];
const CODEX_RESUME_TOKENS: &[&str] = &["--last", "--all"];

/// Splits an invocation string into tokens.
pub fn tokenize(invocation: &str) -> Vec<String> {
    shlex::split(invocation)
        .unwrap_or_else(|| invocation.split_whitespace().map(str::to_string).collect())
}

fn opts_with_value(tool: ToolKind) -> &'static [&'static str] {
    match tool {
        ToolKind::Claude => CLAUDE_OPTS_WITH_VALUE,
        ToolKind::Codex => CODEX_OPTS_WITH_VALUE,
    }
}

fn is_option(token: &str) -> bool {
    token.starts_with('-')
}

/// Drops a leading argv0 that names the tool itself.
fn strip_argv0(tokens: &[String], tool: ToolKind) -> &[String] {
    match tokens.first() {
        Some(first) if ToolKind::from_command_name(first) == Some(tool) => &tokens[1..],
        _ => tokens,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Ids Named on the Command Line
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns the id passed to `--resume`/`-r`, if it has the session-id shape.
pub fn claude_resume_id(invocation: &str) -> Option<String> {
    let tokens = tokenize(invocation);
    tokens
        .windows(2)
        .find(|pair| matches!(pair[0].as_str(), "--resume" | "-r") && is_session_id(&pair[1]))
        .map(|pair| pair[1].clone())
}

/// Returns the id following the `resume`/`fork` subcommand.
pub fn codex_resume_id(invocation: &str) -> Option<String> {
    let tokens = tokenize(invocation);
    tokens
        .windows(2)
        .find(|pair| {
            CODEX_INTERACTIVE_SUBCOMMANDS.contains(&pair[0].as_str()) && is_session_id(&pair[1])
        })
        .map(|pair| pair[1].clone())
}

pub fn resume_id(tool: ToolKind, invocation: &str) -> Option<String> {
    match tool {
        ToolKind::Claude => claude_resume_id(invocation),
        ToolKind::Codex => codex_resume_id(invocation),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Interactivity
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether a codex invocation is an interactive session.
///
/// The first bare token is the subcommand. Known batch subcommands (`exec`,
/// `login`, ...) are not sessions; anything else, including a prompt, is.
pub fn codex_is_interactive(invocation: &str) -> bool {
    let tokens = tokenize(invocation);
    let tokens = strip_argv0(&tokens, ToolKind::Codex);

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        if is_option(token) {
            if CODEX_OPTS_WITH_VALUE.contains(&token.as_str()) {
                iter.next();
            }
            continue;
        }
        if CODEX_INTERACTIVE_SUBCOMMANDS.contains(&token.as_str()) {
            return true;
        }
        return !CODEX_NON_INTERACTIVE_SUBCOMMANDS.contains(&token.as_str());
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// Flag Preservation
// ═══════════════════════════════════════════════════════════════════════════════

/// Extracts the flags worth replaying on restore.
///
/// Options (with their values) survive; prompts, subcommands and the previous
/// resume target do not.
pub fn extract_flags(tool: ToolKind, invocation: &str) -> Vec<String> {
    let tokens = tokenize(invocation);
    let tokens = strip_argv0(&tokens, tool);
    let with_value = opts_with_value(tool);
    let skip = match tool {
        ToolKind::Claude => CLAUDE_RESUME_TOKENS,
        ToolKind::Codex => CODEX_RESUME_TOKENS,
    };

    let mut flags = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let next = tokens.get(i + 1).map(String::as_str);
        let value_follows =
            with_value.contains(&token) && next.is_some_and(|n| !is_option(n));

        if skip.contains(&token) {
            // `--resume <id>` and friends: drop the value too when it is one.
            let consumes = value_follows
                || (matches!(token, "--resume" | "-r") && next.is_some_and(is_session_id));
            i += if consumes { 2 } else { 1 };
            continue;
        }

        if tool == ToolKind::Codex && CODEX_INTERACTIVE_SUBCOMMANDS.contains(&token) {
            i += if next.is_some_and(is_session_id) { 2 } else { 1 };
            continue;
        }

        if is_option(token) {
            flags.push(token.to_string());
            if value_follows {
                if let Some(value) = next {
                    flags.push(value.to_string());
                }
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        i += 1;
    }
    flags
}

// ═══════════════════════════════════════════════════════════════════════════════
// Reconstruction
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds the argv that resumes `entry`, or continues the most recent
/// session when no id is known.
pub fn restore_argv(entry: &ResolvedSession) -> Vec<String> {
    let mut argv: Vec<String> = match (entry.tool, entry.session_id.as_deref()) {
        (ToolKind::Claude, Some(id)) => vec!["claude".into(), "--resume".into(), id.into()],
        (ToolKind::Claude, None) => vec!["claude".into(), "--continue".into()],
        (ToolKind::Codex, Some(id)) => vec!["codex".into(), "resume".into(), id.into()],
        (ToolKind::Codex, None) => vec!["codex".into(), "resume".into(), "--last".into()],
    };
    argv.extend(entry.flags.iter().cloned());
    argv
}

/// Builds `cd <cwd> && <argv>` with shell quoting.
pub fn shell_command(entry: &ResolvedSession) -> Result<String> {
    let cwd = if entry.cwd.is_empty() { "." } else { entry.cwd.as_str() };
    let quoted_cwd =
        shlex::try_quote(cwd).map_err(|err| RestoreError::UnquotableCommand(err.to_string()))?;
    let argv = restore_argv(entry);
    let joined = shlex::try_join(argv.iter().map(String::as_str))
        .map_err(|err| RestoreError::UnquotableCommand(err.to_string()))?;
    Ok(format!("cd {} && {}", quoted_cwd, joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostContext;

    const SID: &str = "904135b4-8584-42dd-aeb9-08b920d0e02e";
    const CODEX_SID: &str = "019c5bce-a952-7380-b204-bfe40bf783b6";

    #[test]
    fn tokenize_falls_back_on_unbalanced_quotes() {
        assert_eq!(tokenize("claude --model 'sonnet"), vec!["claude", "--model", "'sonnet"]);
        assert_eq!(tokenize("claude -p \"a b\""), vec!["claude", "-p", "a b"]);
    }

    #[test]
    fn claude_flags_preserve_value_pairs() {
        let args = format!(
            "claude --resume {SID} --model sonnet --verbose --setting-sources user,project --dangerously-skip-permissions"
        );
        assert_eq!(
            extract_flags(ToolKind::Claude, &args),
            vec![
                "--model",
                "sonnet",
                "--verbose",
                "--setting-sources",
                "user,project",
                "--dangerously-skip-permissions",
            ]
        );
    }

    #[test]
    fn claude_flags_drop_continue_and_prompt() {
        assert_eq!(
            extract_flags(ToolKind::Claude, "claude -c --model opus \"fix the tests\""),
            vec!["--model", "opus"]
        );
    }

    #[test]
    fn codex_flags_strip_resume_bits() {
        let args = format!(
            "codex --model gpt-5 resume {CODEX_SID} --search --config reasoning_level=xhigh --last"
        );
        assert_eq!(
            extract_flags(ToolKind::Codex, &args),
            vec!["--model", "gpt-5", "--search", "--config", "reasoning_level=xhigh"]
        );
    }

    #[test]
    fn codex_interactivity() {
        assert!(codex_is_interactive("codex --yolo resume"));
        assert!(codex_is_interactive("codex --model gpt-5"));
        assert!(codex_is_interactive("codex \"refactor the parser\""));
        assert!(codex_is_interactive("/usr/local/bin/codex -m exec"));
        assert!(!codex_is_interactive("codex exec \"echo hi\""));
        assert!(!codex_is_interactive("codex --profile work mcp-server"));
    }

    #[test]
    fn resume_ids_require_uuid_shape() {
        assert_eq!(claude_resume_id(&format!("claude -r {SID}")), Some(SID.to_string()));
        assert_eq!(claude_resume_id("claude --resume latest"), None);
        assert_eq!(
            codex_resume_id(&format!("codex fork {CODEX_SID}")),
            Some(CODEX_SID.to_string())
        );
        assert_eq!(codex_resume_id("codex resume --last"), None);
    }

    #[test]
    fn restore_argv_for_each_tool() {
        let codex = ResolvedSession::new(ToolKind::Codex, None, "/tmp/project")
            .with_flags(&["--model", "gpt-5"]);
        assert_eq!(
            restore_argv(&codex),
            vec!["codex", "resume", "--last", "--model", "gpt-5"]
        );

        let claude = ResolvedSession::new(ToolKind::Claude, Some(SID.to_string()), "/tmp");
        assert_eq!(restore_argv(&claude), vec!["claude", "--resume", SID]);

        let fresh = ResolvedSession::new(ToolKind::Claude, None, "/tmp");
        assert_eq!(restore_argv(&fresh), vec!["claude", "--continue"]);
    }

    #[test]
    fn shell_command_quotes_cwd_and_omits_addressing() {
        let entry = ResolvedSession::new(ToolKind::Claude, None, "/tmp/my project")
            .with_flags(&["--append-system-prompt", "be brief"])
            .in_workspace("ws-1", Some("surface-1"), 0);
        assert_eq!(entry.host, HostContext::Cmux);
        let command = shell_command(&entry).unwrap();
        assert_eq!(
            command,
            "cd '/tmp/my project' && claude --continue --append-system-prompt 'be brief'"
        );
        assert!(!command.contains("ws-1"));
    }

    #[test]
    fn shell_command_defaults_cwd() {
        let entry = ResolvedSession::new(ToolKind::Codex, None, "");
        assert_eq!(shell_command(&entry).unwrap(), "cd . && codex resume --last");
    }
}
