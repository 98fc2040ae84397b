//! cmux modes.

use restore_core::restorer::run_panes;
use restore_core::workspace::refresh_workspace_map;
use restore_core::{CmuxCli, HostContext, RestoreGate, RestorePolicy, StateStore};
use tracing::{debug, info};

/// Refreshes the workspace map, then restores every queued cmux session.
pub fn run_auto(store: &StateStore, policy: &RestorePolicy) -> Result<(), String> {
    let gate_dir = store.storage().gate_dir(HostContext::Cmux);
    let Some(_gate) = RestoreGate::acquire(&gate_dir, policy.gate_stale_after()) else {
        info!("cmux restore already running");
        return Ok(());
    };

    refresh_map_quietly(store);
    let outcome = run_panes(store, &CmuxCli);
    if outcome.restored > 0 || !outcome.unmatched.is_empty() {
        info!(
            restored = outcome.restored,
            requeued = outcome.unmatched.len(),
            "cmux restore finished"
        );
    }
    Ok(())
}

/// Missing or unreachable cmux is a no-op, not a failure.
pub fn update_map(store: &StateStore) -> Result<(), String> {
    refresh_map_quietly(store);
    Ok(())
}

fn refresh_map_quietly(store: &StateStore) {
    match refresh_workspace_map(&CmuxCli, store) {
        Ok(count) => debug!(workspaces = count, "Workspace map refreshed"),
        Err(err) => debug!(error = %err, "Workspace map not refreshed"),
    }
}
