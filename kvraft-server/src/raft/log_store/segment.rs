//! Segment files.
//!
//! Each segment is newline-delimited JSON, one entry per line, named after
//! the index of its first entry.

use crate::types::KvEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Maximum entries per segment before rotating to a new one.
pub const SEGMENT_MAX_ENTRIES: usize = 1000;

/// File name of the segment starting at `first_index`.
pub fn segment_file_name(first_index: u64) -> String {
    format!("seg_{:020}.log", first_index)
}

/// First index encoded in a segment file name.
pub fn parse_segment_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("seg_")?.strip_suffix(".log")?.parse().ok()
}

/// All segment files in `dir`, sorted by first index.
pub fn list_segments(dir: &Path) -> std::io::Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let first_index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_segment_file_name);
        if let Some(first_index) = first_index {
            segments.push((first_index, path));
        }
    }

    segments.sort_by_key(|(first_index, _)| *first_index);
    Ok(segments)
}

/// Entries read from one segment file.
pub struct SegmentContents {
    /// Entries in file order.
    pub entries: Vec<KvEntry>,
    /// The last line was cut short by a crash and has been dropped.
    pub torn: bool,
}

/// Read a segment file.
///
/// A final line that does not parse is treated as a torn write and dropped;
/// a bad line anywhere else is an error.
pub fn read_segment(path: &Path) -> std::io::Result<SegmentContents> {
    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    let last_line = lines.len().saturating_sub(1);

    let mut entries = Vec::with_capacity(lines.len());
    let mut torn = false;

    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<KvEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if i == last_line => {
                tracing::warn!(path = %path.display(), error = %e, "dropping torn log entry");
                torn = true;
            }
            Err(e) => return Err(super::invalid_data(e)),
        }
    }

    Ok(SegmentContents { entries, torn })
}

/// Write a complete segment file, replacing any existing one.
pub fn write_segment(dir: &Path, first_index: u64, entries: &[KvEntry]) -> std::io::Result<()> {
    let path = dir.join(segment_file_name(first_index));
    let temp_path = dir.join(format!("{}.tmp", segment_file_name(first_index)));

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    let mut writer = BufWriter::new(file);
    for entry in entries {
        serde_json::to_writer(&mut writer, entry).map_err(super::invalid_data)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;

    fs::rename(&temp_path, &path)
}

/// The segment currently open for appends.
pub struct ActiveSegment {
    /// Index the segment is named after.
    pub first_index: u64,
    /// Lines already in the file.
    pub entry_count: usize,
    writer: BufWriter<File>,
}

impl ActiveSegment {
    /// Open (creating if needed) the segment starting at `first_index` for appending.
    pub fn open(dir: &Path, first_index: u64, entry_count: usize) -> std::io::Result<Self> {
        let path = dir.join(segment_file_name(first_index));
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            first_index,
            entry_count,
            writer: BufWriter::new(file),
        })
    }

    /// Whether the segment has reached its rotation size.
    pub fn is_full(&self) -> bool {
        self.entry_count >= SEGMENT_MAX_ENTRIES
    }

    /// Buffer one entry.
    pub fn append(&mut self, entry: &KvEntry) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry).map_err(super::invalid_data)?;
        self.writer.write_all(b"\n")?;
        self.entry_count += 1;
        Ok(())
    }

    /// Flush buffered entries to stable storage.
    pub fn sync(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_name_roundtrip() {
        let name = segment_file_name(1234);
        assert_eq!(name, "seg_00000000000000001234.log");
        assert_eq!(parse_segment_file_name(&name), Some(1234));
    }

    #[test]
    fn test_foreign_file_names_are_ignored() {
        assert_eq!(parse_segment_file_name("hard_state.json"), None);
        assert_eq!(parse_segment_file_name("seg_12.log.tmp"), None);
        assert_eq!(parse_segment_file_name("seg_abc.log"), None);
    }
}
