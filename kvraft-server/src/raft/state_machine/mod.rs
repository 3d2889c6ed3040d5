//! OpenRaft state machine adapter.
//!
//! Feeds committed log entries to a [`StateMachine`] and tracks what OpenRaft
//! needs around it: the last applied log ID, the last membership, and the
//! current snapshot. Snapshots are persisted through [`SnapshotStore`] and
//! restored on open, so a restarted node only replays the log suffix.

mod store;

pub use store::{SnapshotStore, StoredSnapshot};

use crate::error::StoreError;
use crate::state::StateMachine;
use crate::types::{
    KvEntry, KvLogId, KvSnapshot, KvSnapshotMeta, KvStorageError, KvStoredMembership,
    SnapshotData, TypeConfig,
};
use kvraft_core::proto::Response;
use openraft::storage::RaftStateMachine;
use openraft::{EntryPayload, RaftSnapshotBuilder, StorageIOError, StoredMembership};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct AppliedState {
    last_applied_log: Option<KvLogId>,
    last_membership: KvStoredMembership,
}

/// The state machine as seen by OpenRaft.
///
/// The applied-state lock is taken before the state machine's own lock, so a
/// captured snapshot always matches the log ID recorded with it.
pub struct ReplicatedStateMachine {
    fsm: Arc<dyn StateMachine>,
    applied: Mutex<AppliedState>,
    snapshot_idx: AtomicU64,
    current_snapshot: RwLock<Option<StoredSnapshot>>,
    store: SnapshotStore,
}

impl ReplicatedStateMachine {
    /// Wrap `fsm`, restoring it from the snapshot persisted in `snapshot_dir`.
    pub fn open(
        fsm: Arc<dyn StateMachine>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Result<Arc<Self>, StoreError> {
        let store = SnapshotStore::open(snapshot_dir)?;
        let mut applied = AppliedState::default();

        let current = store.load()?;
        if let Some(snapshot) = &current {
            fsm.restore(&mut snapshot.data.as_slice())?;
            applied.last_applied_log = snapshot.meta.last_log_id;
            applied.last_membership = snapshot.meta.last_membership.clone();

            tracing::info!(
                snapshot_id = %snapshot.meta.snapshot_id,
                last_log_id = ?snapshot.meta.last_log_id,
                "restored persisted snapshot"
            );
        }

        Ok(Arc::new(Self {
            fsm,
            applied: Mutex::new(applied),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: RwLock::new(current),
            store,
        }))
    }

    /// Log ID of the last applied entry.
    pub fn last_applied(&self) -> Option<KvLogId> {
        self.applied.lock().last_applied_log
    }

    fn apply_entry(&self, entry: KvEntry) -> Result<Response, KvStorageError> {
        let mut applied = self.applied.lock();
        applied.last_applied_log = Some(entry.log_id);

        match entry.payload {
            EntryPayload::Blank => Ok(Response::default()),
            EntryPayload::Normal(operation) => self.fsm.apply(&operation).map_err(|e| {
                tracing::error!(log_id = %entry.log_id, error = %e, "failed to apply log entry");
                StorageIOError::write_state_machine(&e).into()
            }),
            EntryPayload::Membership(membership) => {
                applied.last_membership = StoredMembership::new(Some(entry.log_id), membership);
                Ok(Response::default())
            }
        }
    }

    fn capture(&self) -> Result<StoredSnapshot, StoreError> {
        let applied = self.applied.lock();

        let mut data = Vec::new();
        self.fsm.snapshot(&mut data)?;

        let snapshot_idx = self.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = match applied.last_applied_log {
            Some(last) => format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx),
            None => format!("--{}", snapshot_idx),
        };

        Ok(StoredSnapshot {
            meta: KvSnapshotMeta {
                last_log_id: applied.last_applied_log,
                last_membership: applied.last_membership.clone(),
                snapshot_id,
            },
            data,
        })
    }

    fn install(&self, snapshot: &StoredSnapshot) -> Result<(), StoreError> {
        let mut applied = self.applied.lock();
        self.fsm.restore(&mut snapshot.data.as_slice())?;
        applied.last_applied_log = snapshot.meta.last_log_id;
        applied.last_membership = snapshot.meta.last_membership.clone();
        Ok(())
    }

    /// Persist `snapshot` and make it current, unless a newer one already is.
    async fn publish(&self, snapshot: StoredSnapshot) -> Result<(), KvStorageError> {
        let mut current = self.current_snapshot.write().await;

        let stale = current
            .as_ref()
            .is_some_and(|c| c.meta.last_log_id > snapshot.meta.last_log_id);
        if stale {
            tracing::debug!(snapshot_id = %snapshot.meta.snapshot_id, "discarding stale snapshot");
            return Ok(());
        }

        self.store
            .save(&snapshot)
            .map_err(|e| StorageIOError::write_snapshot(Some(snapshot.meta.signature()), &e))?;
        *current = Some(snapshot);
        Ok(())
    }
}

impl RaftSnapshotBuilder<TypeConfig> for Arc<ReplicatedStateMachine> {
    async fn build_snapshot(&mut self) -> Result<KvSnapshot, KvStorageError> {
        let snapshot = self
            .capture()
            .map_err(|e| StorageIOError::read_state_machine(&e))?;

        tracing::info!(
            snapshot_id = %snapshot.meta.snapshot_id,
            last_log_id = ?snapshot.meta.last_log_id,
            size = snapshot.data.len(),
            "built snapshot"
        );

        let result = KvSnapshot {
            meta: snapshot.meta.clone(),
            snapshot: Box::new(Cursor::new(snapshot.data.clone())),
        };
        self.publish(snapshot).await?;
        Ok(result)
    }
}

impl RaftStateMachine<TypeConfig> for Arc<ReplicatedStateMachine> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<KvLogId>, KvStoredMembership), KvStorageError> {
        let applied = self.applied.lock().clone();
        Ok((applied.last_applied_log, applied.last_membership))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<Response>, KvStorageError>
    where
        I: IntoIterator<Item = KvEntry> + Send,
    {
        let mut responses = Vec::new();
        for entry in entries {
            tracing::debug!(%entry.log_id, "applying to state machine");
            responses.push(self.apply_entry(entry)?);
        }
        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        Arc::clone(self)
    }

    async fn begin_receiving_snapshot(&mut self) -> Result<Box<SnapshotData>, KvStorageError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &KvSnapshotMeta,
        snapshot: Box<SnapshotData>,
    ) -> Result<(), KvStorageError> {
        let snapshot = StoredSnapshot {
            meta: meta.clone(),
            data: snapshot.into_inner(),
        };

        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            size = snapshot.data.len(),
            "installing snapshot"
        );

        self.install(&snapshot)
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;
        self.publish(snapshot).await
    }

    async fn get_current_snapshot(&mut self) -> Result<Option<KvSnapshot>, KvStorageError> {
        Ok(self
            .current_snapshot
            .read()
            .await
            .as_ref()
            .map(|snapshot| KvSnapshot {
                meta: snapshot.meta.clone(),
                snapshot: Box::new(Cursor::new(snapshot.data.clone())),
            }))
    }
}
