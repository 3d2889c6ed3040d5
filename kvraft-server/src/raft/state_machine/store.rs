//! Snapshot persistence.
//!
//! ```text
//! snapshot/
//! ├── current.json      # metadata of the latest snapshot + blob file name
//! └── <snapshot_id>.bin # state machine blob
//! ```
//!
//! Both files are written to a temporary path and renamed into place, blob
//! first. `current.json` is the commit point: a crash before its rename leaves
//! the previous snapshot in effect.

use crate::error::StoreError;
use crate::types::KvSnapshotMeta;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

const CURRENT_FILE: &str = "current.json";

/// A snapshot held in memory: metadata plus the state machine blob.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    /// Snapshot metadata.
    pub meta: KvSnapshotMeta,
    /// Serialized state machine.
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CurrentSnapshot {
    meta: KvSnapshotMeta,
    file: String,
}

/// Directory holding the latest persisted snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open (creating if needed) the snapshot directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Load the latest persisted snapshot, if any.
    pub fn load(&self) -> Result<Option<StoredSnapshot>, StoreError> {
        let current_path = self.dir.join(CURRENT_FILE);
        if !current_path.exists() {
            return Ok(None);
        }

        let current: CurrentSnapshot =
            serde_json::from_reader(BufReader::new(File::open(&current_path)?))?;
        let data = fs::read(self.dir.join(&current.file))?;

        Ok(Some(StoredSnapshot {
            meta: current.meta,
            data,
        }))
    }

    /// Persist `snapshot` as the latest one and drop older blobs.
    pub fn save(&self, snapshot: &StoredSnapshot) -> Result<(), StoreError> {
        let file = blob_file_name(&snapshot.meta.snapshot_id);
        write_atomic(&self.dir.join(&file), &snapshot.data)?;

        let current = CurrentSnapshot {
            meta: snapshot.meta.clone(),
            file: file.clone(),
        };
        write_atomic(&self.dir.join(CURRENT_FILE), &serde_json::to_vec(&current)?)?;

        self.remove_stale(&file)?;
        Ok(())
    }

    fn remove_stale(&self, keep: &str) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name != keep && name != CURRENT_FILE {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Blob file name for a snapshot ID, restricted to filesystem-safe characters.
fn blob_file_name(snapshot_id: &str) -> String {
    let stem: String = snapshot_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.bin", stem)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)
}
