//! Row File Writer
//!
//! Writes records to a new row file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{MorError, Result};
use crate::record::{Record, Schema};

use super::{HEADER_SIZE, MAGIC, VERSION};

/// Writer for row files
pub struct RowFileWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    schema: Arc<Schema>,
    row_count: u64,
    /// Current write position
    current_offset: u64,
    /// Running CRC over the row block
    row_hasher: crc32fast::Hasher,
}

impl RowFileWriter {
    /// Create a row file for records of `schema`
    ///
    /// Writes header and schema immediately; call `add()` per record, then
    /// `finish()` to write the footer.
    pub fn create(path: &Path, schema: Arc<Schema>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // Placeholder for row count

        let schema_bytes = bincode::serialize(schema.as_ref())?;
        writer.write_all(&(schema_bytes.len() as u32).to_le_bytes())?;
        writer.write_all(&schema_bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            schema,
            row_count: 0,
            current_offset: HEADER_SIZE + 4 + schema_bytes.len() as u64,
            row_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append a record, projected onto the file schema
    pub fn add(&mut self, record: &Record) -> Result<()> {
        let row = record.project(&self.schema).into_values();
        let bytes = bincode::serialize(&row)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| MorError::Storage(format!("row too large: {} bytes", bytes.len())))?;
        let len_bytes = len.to_le_bytes();

        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(&bytes)?;
        self.row_hasher.update(&len_bytes);
        self.row_hasher.update(&bytes);

        self.current_offset += 4 + bytes.len() as u64;
        self.row_count += 1;
        Ok(())
    }

    /// Write the footer, patch the row count and sync
    pub fn finish(mut self) -> Result<u64> {
        let rows_end = self.current_offset;
        let crc = self.row_hasher.clone().finalize();

        self.writer.write_all(&rows_end.to_le_bytes())?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?; // Padding

        self.writer.seek(SeekFrom::Start(6))?;
        self.writer.write_all(&self.row_count.to_le_bytes())?;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        tracing::debug!(
            "Wrote row file {} ({} rows, {} bytes)",
            self.path.display(),
            self.row_count,
            rows_end + super::FOOTER_SIZE
        );

        Ok(self.row_count)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }
}
