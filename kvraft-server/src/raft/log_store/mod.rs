//! Raft log storage with segmented log files.
//!
//! ## Storage Layout
//!
//! ```text
//! raft/
//! ├── hard_state.json    # vote, committed log ID, purge point
//! └── segments/
//!     ├── seg_00000000000000000000.log  # closed
//!     └── seg_00000000000000001000.log  # active
//! ```
//!
//! All entries are also kept in memory. Appends go to the active segment;
//! purges delete whole segments and record the purge point in the hard state,
//! so entries left in a partially purged segment are skipped on reload.

mod hard_state;
mod segment;

use crate::types::{KvEntry, KvLogId, KvStorageError, KvVote, TypeConfig};
use hard_state::HardState;
use openraft::storage::{LogFlushed, RaftLogStorage};
use openraft::{LogState, RaftLogReader, StorageIOError};
use segment::{ActiveSegment, SEGMENT_MAX_ENTRIES};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::ops::RangeBounds;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

fn invalid_data(e: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

/// Persistent storage for Raft logs and hard state.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<RwLock<LogStoreInner>>,
}

struct LogStoreInner {
    dir: PathBuf,
    segments_dir: PathBuf,
    /// Live entries by index.
    logs: BTreeMap<u64, KvEntry>,
    /// Segment first index -> last index written to it.
    segments: BTreeMap<u64, u64>,
    hard_state: HardState,
    active: Option<ActiveSegment>,
}

impl LogStore {
    /// Create or open log storage in the given directory.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        let segments_dir = dir.join("segments");
        fs::create_dir_all(&segments_dir)?;

        let inner = LogStoreInner::load(dir, segments_dir)?;
        tracing::debug!(
            entries = inner.logs.len(),
            segments = inner.segments.len(),
            "opened log store"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }
}

impl LogStoreInner {
    fn load(dir: PathBuf, segments_dir: PathBuf) -> std::io::Result<Self> {
        let hard_state = HardState::load(&dir)?;
        let purged_index = hard_state.last_purged.map(|log_id| log_id.index);

        let mut logs = BTreeMap::new();
        let mut segments = BTreeMap::new();
        let mut tail_count = 0;

        for (first_index, path) in segment::list_segments(&segments_dir)? {
            let contents = segment::read_segment(&path)?;

            let Some(last_index) = contents.entries.last().map(|e| e.log_id.index) else {
                fs::remove_file(&path)?;
                continue;
            };
            if contents.torn {
                segment::write_segment(&segments_dir, first_index, &contents.entries)?;
            }

            segments.insert(first_index, last_index);
            tail_count = contents.entries.len();

            for entry in contents.entries {
                if purged_index.map_or(true, |purged| entry.log_id.index > purged) {
                    logs.insert(entry.log_id.index, entry);
                }
            }
        }

        let active = match segments.keys().next_back() {
            Some(&first_index) if tail_count < SEGMENT_MAX_ENTRIES => Some(ActiveSegment::open(
                &segments_dir,
                first_index,
                tail_count,
            )?),
            _ => None,
        };

        Ok(Self {
            dir,
            segments_dir,
            logs,
            segments,
            hard_state,
            active,
        })
    }

    fn append_entries(&mut self, entries: Vec<KvEntry>) -> std::io::Result<()> {
        for entry in entries {
            let index = entry.log_id.index;

            let mut segment = match self.active.take() {
                Some(segment) if !segment.is_full() => segment,
                previous => {
                    if let Some(mut full) = previous {
                        full.sync()?;
                    }
                    ActiveSegment::open(&self.segments_dir, index, 0)?
                }
            };

            let written = segment.append(&entry);
            let first_index = segment.first_index;
            self.active = Some(segment);
            written?;

            self.segments.insert(first_index, index);
            self.logs.insert(index, entry);
        }

        if let Some(active) = &mut self.active {
            active.sync()?;
        }
        Ok(())
    }

    /// Remove entries at and after `log_id`.
    fn truncate_entries(&mut self, log_id: KvLogId) -> std::io::Result<()> {
        let index = log_id.index;
        let _ = self.logs.split_off(&index);

        // Segments starting at or after the cut go entirely.
        let doomed: Vec<u64> = self
            .segments
            .range(index..)
            .map(|(first, _)| *first)
            .collect();
        for first_index in doomed {
            self.remove_segment(first_index)?;
        }

        // The segment straddling the cut keeps its head.
        let straddling = self
            .segments
            .range(..index)
            .next_back()
            .map(|(first, last)| (*first, *last));
        if let Some((first_index, last_index)) = straddling {
            if last_index >= index {
                self.active = None;

                let kept: Vec<KvEntry> = self
                    .logs
                    .range(first_index..)
                    .map(|(_, e)| e.clone())
                    .collect();
                match kept.last().map(|e| e.log_id.index) {
                    Some(new_last) => {
                        segment::write_segment(&self.segments_dir, first_index, &kept)?;
                        self.segments.insert(first_index, new_last);
                        self.active = Some(ActiveSegment::open(
                            &self.segments_dir,
                            first_index,
                            kept.len(),
                        )?);
                    }
                    None => self.remove_segment(first_index)?,
                }
            }
        }

        Ok(())
    }

    /// Drop entries up to and including `log_id`.
    fn purge_entries(&mut self, log_id: KvLogId) -> std::io::Result<()> {
        // Record the purge point first; reload skips anything at or below it.
        self.hard_state.last_purged = Some(log_id);
        self.hard_state.save(&self.dir)?;

        self.logs = self.logs.split_off(&(log_id.index + 1));

        let doomed: Vec<u64> = self
            .segments
            .iter()
            .filter(|(_, last)| **last <= log_id.index)
            .map(|(first, _)| *first)
            .collect();
        for first_index in doomed {
            self.remove_segment(first_index)?;
        }

        Ok(())
    }

    fn remove_segment(&mut self, first_index: u64) -> std::io::Result<()> {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.first_index == first_index)
        {
            self.active = None;
        }
        self.segments.remove(&first_index);

        let path = self
            .segments_dir
            .join(segment::segment_file_name(first_index));
        match fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl RaftLogReader<TypeConfig> for LogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug>(
        &mut self,
        range: RB,
    ) -> Result<Vec<KvEntry>, KvStorageError> {
        let inner = self.inner.read().await;
        Ok(inner.logs.range(range).map(|(_, e)| e.clone()).collect())
    }
}

impl RaftLogStorage<TypeConfig> for LogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, KvStorageError> {
        let inner = self.inner.read().await;

        let last_purged_log_id = inner.hard_state.last_purged;
        let last_log_id = inner
            .logs
            .values()
            .next_back()
            .map(|e| e.log_id)
            .or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn save_committed(&mut self, committed: Option<KvLogId>) -> Result<(), KvStorageError> {
        let mut inner = self.inner.write().await;
        inner.hard_state.committed = committed;
        inner
            .hard_state
            .save(&inner.dir)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<KvLogId>, KvStorageError> {
        Ok(self.inner.read().await.hard_state.committed)
    }

    async fn save_vote(&mut self, vote: &KvVote) -> Result<(), KvStorageError> {
        let mut inner = self.inner.write().await;
        inner.hard_state.vote = Some(*vote);
        inner
            .hard_state
            .save(&inner.dir)
            .map_err(|e| StorageIOError::write_vote(&e))?;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<KvVote>, KvStorageError> {
        Ok(self.inner.read().await.hard_state.vote)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), KvStorageError>
    where
        I: IntoIterator<Item = KvEntry>,
    {
        let mut inner = self.inner.write().await;
        inner
            .append_entries(entries.into_iter().collect())
            .map_err(|e| StorageIOError::write_logs(&e))?;

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: KvLogId) -> Result<(), KvStorageError> {
        tracing::debug!(%log_id, "truncating log");
        let mut inner = self.inner.write().await;
        inner
            .truncate_entries(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn purge(&mut self, log_id: KvLogId) -> Result<(), KvStorageError> {
        tracing::debug!(%log_id, "purging log");
        let mut inner = self.inner.write().await;
        inner
            .purge_entries(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}
