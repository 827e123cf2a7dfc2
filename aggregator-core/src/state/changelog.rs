use super::*;

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Append-only log of state-store mutations, one per input partition.
///
/// The changelog exists solely for recovery: replaying it from the start
/// onto a fresh store reconstructs every live entry. Appends must be durable
/// before the store's index is updated.
pub trait Changelog: Send {
    /// Append one entry. Blocks the owning partition's pipeline until the
    /// write is acknowledged.
    fn append(&mut self, entry: &ChangelogEntry) -> Result<()>;

    /// Read back every entry in append order.
    ///
    /// Fails with [`AggregateError::Replay`] when the log is corrupt or
    /// unreadable, which is fatal for the owning partition only.
    fn replay(&mut self) -> Result<Vec<ChangelogEntry>>;
}

/// Fold replayed entries into their compacted form: the latest entry per key
/// wins and a tombstone removes the key.
pub fn compact(entries: Vec<ChangelogEntry>) -> HashMap<AggregateKey, AggregateState> {
    let mut compacted = HashMap::new();
    for entry in entries {
        match entry.op {
            ChangelogOp::Upsert(state) => {
                compacted.insert(entry.key, state);
            }
            ChangelogOp::Tombstone => {
                compacted.remove(&entry.key);
            }
        }
    }
    compacted
}

// ── MemoryChangelog ───────────────────────────────────────────────────────────

/// In-memory changelog for tests and single-process demos.
///
/// Clones share the same underlying log, so a test can keep a handle and
/// replay it into a fresh store after "crashing" the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangelog {
    entries: Arc<Mutex<Vec<ChangelogEntry>>>,
}

impl MemoryChangelog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Changelog for MemoryChangelog {
    fn append(&mut self, entry: &ChangelogEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| AggregateError::StoreIo("changelog lock poisoned".into()))?
            .push(entry.clone());
        Ok(())
    }

    fn replay(&mut self) -> Result<Vec<ChangelogEntry>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| AggregateError::Replay("changelog lock poisoned".into()))?
            .clone())
    }
}

// ── FsChangelog ───────────────────────────────────────────────────────────────

/// File-backed changelog: one append-only file per partition.
///
/// Entries are written as bincode frames with a u32 length prefix and the
/// writer is flushed on every append. A truncated or undecodable frame makes
/// replay fail for the whole partition.
pub struct FsChangelog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FsChangelog {
    /// Open (or create) the changelog file for one partition under `dir`.
    pub fn open(dir: impl AsRef<Path>, partition: i32) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| AggregateError::StoreIo(format!("create {}: {e}", dir.display())))?;
        let path = dir.join(format!("partition-{partition}.changelog"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AggregateError::StoreIo(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Changelog for FsChangelog {
    fn append(&mut self, entry: &ChangelogEntry) -> Result<()> {
        let frame =
            bincode::serialize(entry).map_err(|e| AggregateError::StoreIo(e.to_string()))?;
        let len = frame.len() as u32;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }

    fn replay(&mut self) -> Result<Vec<ChangelogEntry>> {
        let mut bytes = Vec::new();
        File::open(&self.path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(|e| AggregateError::Replay(format!("read {}: {e}", self.path.display())))?;

        let mut entries = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            if pos + 4 > bytes.len() {
                return Err(AggregateError::Replay(format!(
                    "truncated frame header at byte {pos} in {}",
                    self.path.display()
                )));
            }
            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&bytes[pos..pos + 4]);
            let len = u32::from_le_bytes(len_bytes) as usize;
            pos += 4;
            if pos + len > bytes.len() {
                return Err(AggregateError::Replay(format!(
                    "truncated frame body at byte {pos} in {}",
                    self.path.display()
                )));
            }
            let entry: ChangelogEntry = bincode::deserialize(&bytes[pos..pos + len])
                .map_err(|e| AggregateError::Replay(format!("undecodable frame: {e}")))?;
            entries.push(entry);
            pos += len;
        }
        Ok(entries)
    }
}
