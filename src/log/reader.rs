//! Log Reader
//!
//! Reads blocks from a log file, front to back.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use bytes::Buf;

use crate::error::{MorError, Result};

use super::block::{BlockType, LogBlock, FLAG_CHECKSUM, FOOTER_SIZE, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE};

/// Reads blocks from a single log file
pub struct LogReader {
    path: PathBuf,
    file: BufReader<File>,
    /// Byte offset of the next unread block
    offset: u64,
    verify_checksums: bool,
    /// No more blocks will be returned
    finished: bool,
    /// The file ended in an incomplete block
    truncated: bool,
}

impl LogReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| MorError::io_at(path, 0, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            offset: 0,
            verify_checksums: true,
            finished: false,
            truncated: false,
        })
    }

    /// Enable or disable checksum verification (on by default)
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Read the next block.
    ///
    /// Returns:
    /// - `Ok(Some(block))`: a complete, size-verified block
    /// - `Ok(None)`: end of valid data (clean EOF or truncated tail)
    /// - `Err(CorruptBlock)`: malformed block; nothing further is read from this file
    /// - `Err(IoAt)`: the file could not be read
    pub fn read_next_block(&mut self) -> Result<Option<LogBlock>> {
        if self.finished {
            return Ok(None);
        }

        let start = self.offset;

        // Header
        let mut header = [0u8; HEADER_SIZE];
        let n = self.fill(&mut header, start)?;
        if n == 0 {
            self.finished = true;
            return Ok(None);
        }
        if n < HEADER_SIZE {
            return Ok(self.truncated_tail(start, "partial header"));
        }

        if &header[0..4] != MAGIC {
            return Err(self.corrupt(start, format!("bad magic {:?}", &header[0..4])));
        }

        let mut cursor = &header[4..];
        let tag = cursor.get_u8();
        let flags = cursor.get_u8();
        let instant = cursor.get_u64_le();
        let payload_len = cursor.get_u32_le();

        let block_type = match BlockType::try_from(tag) {
            Ok(t) => t,
            Err(tag) => return Err(self.corrupt(start, format!("unknown block type 0x{:02x}", tag))),
        };

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(self.corrupt(
                start,
                format!("payload too large: {} bytes (max {})", payload_len, MAX_PAYLOAD_SIZE),
            ));
        }

        // Payload
        let payload_start = start + HEADER_SIZE as u64;
        let mut payload = vec![0u8; payload_len as usize];
        if self.fill(&mut payload, payload_start)? < payload.len() {
            return Ok(self.truncated_tail(start, "partial payload"));
        }

        // Footer
        let footer_start = payload_start + payload_len as u64;
        let mut footer = [0u8; FOOTER_SIZE];
        if self.fill(&mut footer, footer_start)? < FOOTER_SIZE {
            return Ok(self.truncated_tail(start, "partial footer"));
        }

        let mut cursor = &footer[..];
        let stored_crc = cursor.get_u32_le();
        let footer_len = cursor.get_u32_le();

        if footer_len != payload_len {
            return Ok(self.truncated_tail(start, "footer size disagrees with header"));
        }

        if self.verify_checksums && flags & FLAG_CHECKSUM != 0 {
            let computed = crc32fast::hash(&payload);
            if computed != stored_crc {
                return Err(self.corrupt(
                    start,
                    format!("checksum mismatch: stored {:08x}, computed {:08x}", stored_crc, computed),
                ));
            }
        }

        let block = match LogBlock::decode_payload(block_type, instant, &payload) {
            Ok(block) => block,
            Err(e) => return Err(self.corrupt(start, format!("undecodable {:?} payload: {}", block_type, e))),
        };

        self.offset = footer_start + FOOTER_SIZE as u64;

        tracing::trace!(
            "Read {:?} block at {}:{} (instant {}, {} bytes)",
            block_type,
            self.path.display(),
            start,
            instant,
            payload_len
        );

        Ok(Some(block))
    }

    /// Iterate over all valid blocks
    pub fn blocks(self) -> LogBlockIter {
        LogBlockIter { reader: self }
    }

    /// Byte offset of the next unread block (end of valid data once finished)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether reading stopped at an incomplete trailing block
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Read until `buf` is full or EOF; returns the number of bytes read
    fn fill(&mut self, buf: &mut [u8], at: u64) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MorError::io_at(&self.path, at + filled as u64, e)),
            }
        }
        Ok(filled)
    }

    fn truncated_tail(&mut self, at: u64, what: &str) -> Option<LogBlock> {
        tracing::warn!(
            "Truncated block in {} at offset {} ({}), ignoring the rest of the file",
            self.path.display(),
            at,
            what
        );
        self.finished = true;
        self.truncated = true;
        None
    }

    fn corrupt(&mut self, at: u64, reason: String) -> MorError {
        self.finished = true;
        MorError::CorruptBlock {
            path: self.path.clone(),
            offset: at,
            reason,
        }
    }
}

/// Iterator over log blocks. Ends after the first error.
pub struct LogBlockIter {
    reader: LogReader,
}

impl LogBlockIter {
    pub fn reader(&self) -> &LogReader {
        &self.reader
    }
}

impl Iterator for LogBlockIter {
    type Item = Result<LogBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_next_block().transpose()
    }
}
