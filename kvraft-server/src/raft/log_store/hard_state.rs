//! Hard state: vote, committed log ID and purge point in one file.

use crate::types::{KvLogId, KvVote};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const HARD_STATE_FILE: &str = "hard_state.json";

/// State that must survive restarts apart from the entries themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardState {
    /// Latest vote.
    pub vote: Option<KvVote>,
    /// Latest committed log ID reported by the engine.
    pub committed: Option<KvLogId>,
    /// Entries up to and including this ID have been purged.
    pub last_purged: Option<KvLogId>,
}

impl HardState {
    /// Load from `dir`, or the default when nothing has been saved yet.
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        let path = dir.join(HARD_STATE_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let reader = BufReader::new(File::open(&path)?);
        serde_json::from_reader(reader).map_err(super::invalid_data)
    }

    /// Atomically replace the file in `dir`.
    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let path = dir.join(HARD_STATE_FILE);
        let temp_path = dir.join(format!("{}.tmp", HARD_STATE_FILE));

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(super::invalid_data)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&temp_path, &path)
    }
}
