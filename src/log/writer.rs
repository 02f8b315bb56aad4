//! Log Writer
//!
//! Appends encoded blocks to a log file. Used to produce log files for the
//! reader; it knows nothing about commits or compaction.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::LogBlock;

/// Writes blocks to a log file
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Bytes written so far (offset of the next block)
    offset: u64,
    checksums: bool,
    blocks_written: u64,
}

impl LogWriter {
    /// Create a new log file, truncating any existing one
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            offset: 0,
            checksums: true,
            blocks_written: 0,
        })
    }

    /// Open an existing log file and append after its current end
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            offset,
            checksums: true,
            blocks_written: 0,
        })
    }

    /// Write payload checksums (on by default)
    pub fn with_checksums(mut self, checksums: bool) -> Self {
        self.checksums = checksums;
        self
    }

    /// Append a block, returning the offset it was written at
    pub fn append(&mut self, block: &LogBlock) -> Result<u64> {
        let bytes = block.encode_with(self.checksums)?;
        let at = self.offset;
        self.writer.write_all(&bytes)?;
        self.offset += bytes.len() as u64;
        self.blocks_written += 1;
        Ok(at)
    }

    /// Flush buffers and fsync
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Sync and close the file
    pub fn finish(mut self) -> Result<()> {
        self.sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }
}
