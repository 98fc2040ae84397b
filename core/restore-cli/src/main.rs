//! session-restore: reopens saved claude/codex sessions after a host restart.
//!
//! Called from the shell startup of a fresh Ghostty tab or cmux pane.
//!
//! ## Subcommands
//!
//! - `auto`: Ghostty restore; prints the session for the calling tab as one
//!   JSON line and opens the rest in new tabs
//! - `interactive` (default): list, confirm, restore, then run the first
//!   session in place
//! - `auto-cmux`: restore cmux sessions into their workspace panes
//! - `update-map`: refresh the cmux workspace-name map
//!
//! Exit status is 0 whenever there is nothing to do.

mod cmux;
mod logging;
mod primary;

use clap::{Parser, Subcommand};
use restore_core::{RestorePolicy, StateStore, StorageConfig};

#[derive(Parser)]
#[command(name = "session-restore")]
#[command(about = "Restore claude/codex sessions after a terminal restart")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore Ghostty sessions; print the one for this tab as JSON
    Auto,

    /// List Ghostty sessions and restore them after confirmation
    Interactive,

    /// Restore cmux sessions into their workspace panes
    AutoCmux,

    /// Refresh the cmux workspace-name map
    UpdateMap,
}

fn main() {
    let cli = Cli::parse();

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("session-restore: {err}");
            std::process::exit(1);
        }
    };
    let _logging_guard = logging::init(&storage.logs_dir());
    let policy = RestorePolicy::load_or_default(&storage.policy_file());
    let store = StateStore::new(storage);

    let result = match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Auto => primary::run_auto(&store, &policy),
        Commands::Interactive => primary::run_interactive(&store, &policy),
        Commands::AutoCmux => cmux::run_auto(&store, &policy),
        Commands::UpdateMap => cmux::update_map(&store),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "session-restore failed");
        eprintln!("session-restore: {err}");
        std::process::exit(1);
    }
}
