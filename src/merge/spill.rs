//! Spill store
//!
//! Append-only overflow file for merge map entries evicted from memory.
//! Each frame is `[len: u32][crc: u32][bincode bytes]`. A key owns a chain
//! of frames: `put` starts a new chain, `append` adds a frame to it, so
//! updating a spilled key writes only the new data. Frames of replaced or
//! taken chains are garbage; the file is rewritten once garbage dominates.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempDir;

use crate::error::{MorError, Result};

/// Frame header: Len (4) + CRC32 (4)
const FRAME_HEADER_SIZE: u64 = 8;

/// Files smaller than this are never compacted
const COMPACT_MIN_BYTES: u64 = 64 * 1024;

const SPILL_FILE_NAME: &str = "spill.bin";
const COMPACT_FILE_NAME: &str = "spill.compact";

#[derive(Debug, Clone, Copy)]
struct SpillSlot {
    /// Offset of the frame payload
    offset: u64,
    len: u32,
    crc: u32,
}

impl SpillSlot {
    fn frame_size(&self) -> u64 {
        FRAME_HEADER_SIZE + self.len as u64
    }
}

/// Frames of one key plus caller metadata kept in memory
struct Chain<M> {
    slots: Vec<SpillSlot>,
    meta: M,
}

/// Overflow storage scoped to one merge map.
///
/// `M` is a small per-key summary the owner needs without reading frames.
pub(crate) struct SpillStore<M> {
    /// Owns the directory; removed on drop
    dir: Option<TempDir>,
    path: PathBuf,
    /// Behind a mutex so lookups can take `&self`
    file: Mutex<File>,
    /// Sorted so keys can be walked in order without collecting them
    index: BTreeMap<String, Chain<M>>,
    /// Append position (file length)
    end: u64,
    /// Bytes of frames still referenced by the index
    live_bytes: u64,
    frames_written: u64,
    bytes_written: u64,
    compactions: u64,
}

impl<M> SpillStore<M> {
    /// Create a spill file in a fresh temporary directory under `parent`
    /// (system temp dir when `None`)
    pub(crate) fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("morread-spill-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let path = dir.path().join(SPILL_FILE_NAME);
        let file = open_rw(&path)?;

        tracing::debug!("Created spill file {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
            file: Mutex::new(file),
            index: BTreeMap::new(),
            end: 0,
            live_bytes: 0,
            frames_written: 0,
            bytes_written: 0,
            compactions: 0,
        })
    }

    /// Store `value` as the only frame of `key`, replacing any earlier chain
    pub(crate) fn put<V: Serialize>(&mut self, key: &str, meta: M, value: &V) -> Result<()> {
        let slot = self.write_frame(key, value)?;
        let old = self.index.insert(
            key.to_string(),
            Chain {
                slots: vec![slot],
                meta,
            },
        );
        if let Some(old) = old {
            self.release(&old.slots);
        }
        self.maybe_compact()
    }

    /// Add a frame to the chain of `key` (starting one if needed) and
    /// replace its metadata
    pub(crate) fn append<V: Serialize>(&mut self, key: &str, meta: M, value: &V) -> Result<()> {
        let slot = self.write_frame(key, value)?;
        match self.index.get_mut(key) {
            Some(chain) => {
                chain.slots.push(slot);
                chain.meta = meta;
            }
            None => {
                self.index.insert(
                    key.to_string(),
                    Chain {
                        slots: vec![slot],
                        meta,
                    },
                );
            }
        }
        Ok(())
    }

    /// Every frame of `key`, in append order
    pub(crate) fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<Vec<V>>> {
        match self.index.get(key) {
            Some(chain) => self.read_chain(key, &chain.slots).map(Some),
            None => Ok(None),
        }
    }

    /// Remove `key` and return its frames
    pub(crate) fn take<V: DeserializeOwned>(&mut self, key: &str) -> Result<Option<Vec<V>>> {
        let values = match self.index.get(key) {
            Some(chain) => self.read_chain(key, &chain.slots)?,
            None => return Ok(None),
        };
        if let Some(chain) = self.index.remove(key) {
            self.release(&chain.slots);
        }
        Ok(Some(values))
    }

    pub(crate) fn meta(&self, key: &str) -> Option<&M> {
        self.index.get(key).map(|chain| &chain.meta)
    }

    pub(crate) fn meta_mut(&mut self, key: &str) -> Option<&mut M> {
        self.index.get_mut(key).map(|chain| &mut chain.meta)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of keys currently held
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Smallest key strictly greater than `after` (or the first key)
    pub(crate) fn next_key_after(&self, after: Option<&str>) -> Option<&String> {
        next_key(&self.index, after)
    }

    /// Total frames appended over the store's lifetime
    pub(crate) fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Bytes appended over the store's lifetime (compaction rewrites excluded)
    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Current size of the spill file
    pub(crate) fn file_len(&self) -> u64 {
        self.end
    }

    pub(crate) fn compactions(&self) -> u64 {
        self.compactions
    }

    /// Remove the spill file and its directory
    pub(crate) fn close(mut self) -> Result<()> {
        self.index.clear();
        if let Some(dir) = self.dir.take() {
            tracing::debug!("Removing spill file {}", self.path.display());
            dir.close()?;
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_frame<V: Serialize>(&mut self, key: &str, value: &V) -> Result<SpillSlot> {
        let bytes = bincode::serialize(value)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| MorError::Spill(format!("entry for {:?} too large to spill", key)))?;
        let crc = crc32fast::hash(&bytes);

        {
            let file = self.file.get_mut();
            file.seek(SeekFrom::Start(self.end))
                .and_then(|_| file.write_all(&len.to_le_bytes()))
                .and_then(|_| file.write_all(&crc.to_le_bytes()))
                .and_then(|_| file.write_all(&bytes))
                .map_err(|e| MorError::io_at(&self.path, self.end, e))?;
        }

        let slot = SpillSlot {
            offset: self.end + FRAME_HEADER_SIZE,
            len,
            crc,
        };
        self.end += slot.frame_size();
        self.live_bytes += slot.frame_size();
        self.bytes_written += slot.frame_size();
        self.frames_written += 1;
        Ok(slot)
    }

    fn release(&mut self, slots: &[SpillSlot]) {
        for slot in slots {
            self.live_bytes -= slot.frame_size();
        }
    }

    fn read_chain<V: DeserializeOwned>(&self, key: &str, slots: &[SpillSlot]) -> Result<Vec<V>> {
        let mut file = self.file.lock();
        slots
            .iter()
            .map(|slot| {
                let buf = read_slot(&mut file, &self.path, key, *slot)?;
                Ok(bincode::deserialize(&buf)?)
            })
            .collect()
    }

    /// Rewrite live frames into a fresh file once more than half is garbage
    fn maybe_compact(&mut self) -> Result<()> {
        if self.end < COMPACT_MIN_BYTES || self.live_bytes * 2 >= self.end {
            return Ok(());
        }

        let compact_path = self.path.with_file_name(COMPACT_FILE_NAME);
        let before = self.end;
        let mut out = BufWriter::new(open_rw(&compact_path)?);
        let mut offset = 0u64;

        {
            let file = self.file.get_mut();
            for (key, chain) in self.index.iter_mut() {
                for slot in chain.slots.iter_mut() {
                    let buf = read_slot(file, &self.path, key, *slot)?;
                    out.write_all(&slot.len.to_le_bytes())
                        .and_then(|_| out.write_all(&slot.crc.to_le_bytes()))
                        .and_then(|_| out.write_all(&buf))
                        .map_err(|e| MorError::io_at(&compact_path, offset, e))?;
                    slot.offset = offset + FRAME_HEADER_SIZE;
                    offset += slot.frame_size();
                }
            }
        }

        out.flush()?;
        let compacted = out
            .into_inner()
            .map_err(|e| MorError::io_at(&compact_path, offset, e.into_error()))?;
        std::fs::rename(&compact_path, &self.path)?;
        *self.file.get_mut() = compacted;

        self.end = offset;
        self.live_bytes = offset;
        self.compactions += 1;

        tracing::debug!(
            "Compacted spill file {}: {} -> {} bytes",
            self.path.display(),
            before,
            offset
        );
        Ok(())
    }
}

/// Smallest key of `map` strictly greater than `after` (or its first key)
pub(crate) fn next_key<'a, V>(map: &'a BTreeMap<String, V>, after: Option<&str>) -> Option<&'a String> {
    match after {
        Some(after) => map
            .range::<str, _>((Bound::Excluded(after), Bound::Unbounded))
            .next()
            .map(|(k, _)| k),
        None => map.keys().next(),
    }
}

fn open_rw(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}

fn read_slot(file: &mut File, path: &Path, key: &str, slot: SpillSlot) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; slot.len as usize];
    file.seek(SeekFrom::Start(slot.offset))
        .and_then(|_| file.read_exact(&mut buf))
        .map_err(|e| MorError::io_at(path, slot.offset, e))?;

    if crc32fast::hash(&buf) != slot.crc {
        return Err(MorError::Spill(format!(
            "checksum mismatch for spilled key {:?} at offset {}",
            key, slot.offset
        )));
    }
    Ok(buf)
}
