//! Row File Reader
//!
//! Streams records out of a row file in write order.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::base::BaseRecordSource;
use crate::error::{MorError, Result};
use crate::record::{Record, Schema, Value};

use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Sequential reader for row files
pub struct RowFileReader {
    path: PathBuf,
    /// `None` once closed
    file: Option<BufReader<File>>,
    schema: Arc<Schema>,
    row_count: u64,
    rows_read: u64,
    /// Stop reading when we reach this offset (start of footer)
    rows_end: u64,
    current_offset: u64,
    expected_crc: u32,
    row_hasher: crc32fast::Hasher,
}

impl RowFileReader {
    /// Open a row file; validates header and footer and loads the schema
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| MorError::io_at(path, 0, e))?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(MorError::Storage(format!(
                "Row file {} too short: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)
            .map_err(|e| MorError::io_at(path, 0, e))?;

        if &header[0..4] != MAGIC {
            return Err(MorError::Storage(format!(
                "Invalid row file magic in {}: expected MORW, got {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(MorError::Storage(format!(
                "Unsupported row file version: {}",
                version
            )));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[6..14]);
        let row_count = u64::from_le_bytes(count_bytes);

        // Read footer
        let footer_start = file_size - FOOTER_SIZE;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.seek(SeekFrom::Start(footer_start))
            .and_then(|_| file.read_exact(&mut footer))
            .map_err(|e| MorError::io_at(path, footer_start, e))?;

        let mut end_bytes = [0u8; 8];
        end_bytes.copy_from_slice(&footer[0..8]);
        let rows_end = u64::from_le_bytes(end_bytes);
        let expected_crc = u32::from_le_bytes([footer[8], footer[9], footer[10], footer[11]]);

        if rows_end != footer_start {
            return Err(MorError::Storage(format!(
                "Row file {} footer points at {}, expected {}",
                path.display(),
                rows_end,
                footer_start
            )));
        }

        // Schema block
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut file = BufReader::new(file);
        let schema_bytes = read_frame(&mut file, path, HEADER_SIZE, rows_end)?;
        let schema: Schema = bincode::deserialize(&schema_bytes)?;
        let current_offset = HEADER_SIZE + 4 + schema_bytes.len() as u64;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            schema: Arc::new(schema),
            row_count,
            rows_read: 0,
            rows_end,
            current_offset,
            expected_crc,
            row_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Rows declared in the header
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Rows returned so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BaseRecordSource for RowFileReader {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        if self.current_offset >= self.rows_end {
            return Ok(None);
        }

        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Ok(None),
        };

        let bytes = read_frame(file, &self.path, self.current_offset, self.rows_end)?;
        self.row_hasher.update(&(bytes.len() as u32).to_le_bytes());
        self.row_hasher.update(&bytes);
        self.current_offset += 4 + bytes.len() as u64;

        let values: Vec<Value> = bincode::deserialize(&bytes)?;
        self.rows_read += 1;

        if self.current_offset == self.rows_end {
            let crc = self.row_hasher.clone().finalize();
            if crc != self.expected_crc {
                return Err(MorError::Storage(format!(
                    "Row file {} checksum mismatch: stored {:08x}, computed {:08x}",
                    self.path.display(),
                    self.expected_crc,
                    crc
                )));
            }
        }

        Ok(Some(Record::new(Arc::clone(&self.schema), values)))
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.row_count)
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}

/// Read one `[len: u32][bytes]` frame starting at `offset`, which must end by `limit`
fn read_frame(file: &mut BufReader<File>, path: &Path, offset: u64, limit: u64) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    file.read_exact(&mut len_bytes)
        .map_err(|e| MorError::io_at(path, offset, e))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if offset + 4 + len as u64 > limit {
        return Err(MorError::Storage(format!(
            "Frame in {} at offset {} ({} bytes) runs past {}",
            path.display(),
            offset,
            len,
            limit
        )));
    }

    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes)
        .map_err(|e| MorError::io_at(path, offset + 4, e))?;
    Ok(bytes)
}
