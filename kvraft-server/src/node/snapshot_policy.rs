//! Snapshot policy driven by the state machine.
//!
//! OpenRaft's own policy is disabled; this task watches the engine metrics and
//! asks [`StateMachine::need_snapshot`] whether the log has grown enough since
//! the last snapshot.

use crate::state::StateMachine;
use crate::types::KvRaft;
use openraft::ServerState;
use std::sync::Arc;

/// Run until the engine shuts down.
pub(crate) async fn run(raft: Arc<KvRaft>, fsm: Arc<dyn StateMachine>) {
    let mut metrics = raft.metrics();
    let mut last_trigger: Option<u64> = None;

    while metrics.changed().await.is_ok() {
        let (state, applied, snapshot) = {
            let m = metrics.borrow();
            (
                m.state,
                m.last_applied.map(|log_id| log_id.index),
                m.snapshot.map(|log_id| log_id.index),
            )
        };

        if state == ServerState::Shutdown {
            break;
        }
        let Some(applied) = applied else {
            continue;
        };

        let log_size = entries_since_snapshot(applied, snapshot, last_trigger);
        if !fsm.need_snapshot(log_size) {
            continue;
        }

        tracing::debug!(applied, log_size, "requesting snapshot");
        if let Err(e) = raft.trigger().snapshot().await {
            tracing::warn!(error = %e, "failed to trigger snapshot");
            break;
        }
        last_trigger = Some(applied);
    }

    tracing::debug!("snapshot policy stopped");
}

/// Entries applied since the later of the last snapshot and the last trigger.
pub(crate) fn entries_since_snapshot(
    applied: u64,
    snapshot: Option<u64>,
    last_trigger: Option<u64>,
) -> u64 {
    match snapshot.max(last_trigger) {
        Some(base) => applied.saturating_sub(base),
        // Log indexes start at 0.
        None => applied + 1,
    }
}
