//! Log block definitions
//!
//! Defines the block kinds and their byte encoding.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{MorError, Result};
use crate::record::{OrderingValue, Record, Schema, Value};

// =============================================================================
// Format Constants
// =============================================================================

/// Magic bytes opening every block
pub const MAGIC: &[u8; 4] = b"MORB";

/// Header size: Magic (4) + Type (1) + Flags (1) + Instant (8) + PayloadLen (4) = 18 bytes
pub const HEADER_SIZE: usize = 18;

/// Footer size: CRC32 (4) + PayloadLen (4) = 8 bytes
pub const FOOTER_SIZE: usize = 8;

/// Header flag: footer CRC32 covers the payload
pub const FLAG_CHECKSUM: u8 = 0x01;

/// Largest payload a reader will allocate for (256 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

// =============================================================================
// Block Types
// =============================================================================

/// Type tag stored in the block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    Data = 0x01,
    Delete = 0x02,
    Rollback = 0x03,
    Command = 0x04,
}

impl TryFrom<u8> for BlockType {
    type Error = u8;

    fn try_from(tag: u8) -> std::result::Result<Self, u8> {
        match tag {
            0x01 => Ok(BlockType::Data),
            0x02 => Ok(BlockType::Delete),
            0x03 => Ok(BlockType::Rollback),
            0x04 => Ok(BlockType::Command),
            other => Err(other),
        }
    }
}

/// A key tombstoned by a delete block, with the ordering value of the delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteKey {
    pub key: String,
    pub ordering: OrderingValue,
}

impl DeleteKey {
    pub fn new(key: impl Into<String>, ordering: impl Into<OrderingValue>) -> Self {
        Self {
            key: key.into(),
            ordering: ordering.into(),
        }
    }
}

/// Control markers carried by command blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    /// All blocks of the instant have been written
    EndOfCommit,
    /// Any other marker; preserved and ignored by the scanner
    Marker(String),
}

/// A decoded log block
#[derive(Debug, Clone, PartialEq)]
pub enum LogBlock {
    /// Inserts/updates
    Data { instant: u64, records: Vec<Record> },

    /// Tombstones
    Delete { instant: u64, keys: Vec<DeleteKey> },

    /// Retracts every block previously written for `target_instant`
    Rollback { instant: u64, target_instant: u64 },

    /// Control marker, no data
    Command { instant: u64, command: CommandKind },
}

// =============================================================================
// Payload Bodies (bincode)
// =============================================================================

/// Data block payload: schema written once, then rows
#[derive(Serialize, Deserialize)]
struct DataBody {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

/// Borrowed form of [`DataBody`] for encoding; same wire layout
#[derive(Serialize)]
struct DataBodyRef<'a> {
    schema: &'a Schema,
    rows: Vec<&'a [Value]>,
}

#[derive(Serialize, Deserialize)]
struct RollbackBody {
    target_instant: u64,
}

impl LogBlock {
    pub fn block_type(&self) -> BlockType {
        match self {
            LogBlock::Data { .. } => BlockType::Data,
            LogBlock::Delete { .. } => BlockType::Delete,
            LogBlock::Rollback { .. } => BlockType::Rollback,
            LogBlock::Command { .. } => BlockType::Command,
        }
    }

    /// Instant (commit time) the block was written under
    pub fn instant(&self) -> u64 {
        match self {
            LogBlock::Data { instant, .. }
            | LogBlock::Delete { instant, .. }
            | LogBlock::Rollback { instant, .. }
            | LogBlock::Command { instant, .. } => *instant,
        }
    }

    /// Encode with a payload checksum
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(true)
    }

    /// Encode the block; `checksum` controls whether the footer CRC is set
    pub fn encode_with(&self, checksum: bool) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;
        let payload_len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_PAYLOAD_SIZE)
            .ok_or_else(|| payload_too_large(payload.len() as u64))?;

        let (flags, crc) = if checksum {
            (FLAG_CHECKSUM, crc32fast::hash(&payload))
        } else {
            (0, 0)
        };

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + FOOTER_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u8(self.block_type() as u8);
        buf.put_u8(flags);
        buf.put_u64_le(self.instant());
        buf.put_u32_le(payload_len);
        buf.put_slice(&payload);
        buf.put_u32_le(crc);
        buf.put_u32_le(payload_len);

        Ok(buf.to_vec())
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        match self {
            LogBlock::Data { records, .. } => {
                // The schema is written once, so every row must share it
                let empty = Schema::new(Vec::<String>::new());
                let schema = records.first().map_or(&empty, |r| r.schema().as_ref());
                if let Some(pos) = records.iter().position(|r| r.schema().as_ref() != schema) {
                    return Err(MorError::Serialization(format!(
                        "data block mixes schemas: record {} does not match record 0",
                        pos
                    )));
                }
                serialize_bounded(&DataBodyRef {
                    schema,
                    rows: records.iter().map(Record::values).collect(),
                })
            }
            LogBlock::Delete { keys, .. } => serialize_bounded(keys),
            LogBlock::Rollback { target_instant, .. } => serialize_bounded(&RollbackBody {
                target_instant: *target_instant,
            }),
            LogBlock::Command { command, .. } => serialize_bounded(command),
        }
    }

    /// Decode a payload for the given header fields
    pub(crate) fn decode_payload(
        block_type: BlockType,
        instant: u64,
        payload: &[u8],
    ) -> std::result::Result<LogBlock, bincode::Error> {
        let block = match block_type {
            BlockType::Data => {
                let body: DataBody = bincode::deserialize(payload)?;
                let schema = Arc::new(body.schema);
                let records = body
                    .rows
                    .into_iter()
                    .map(|row| Record::new(Arc::clone(&schema), row))
                    .collect();
                LogBlock::Data { instant, records }
            }
            BlockType::Delete => LogBlock::Delete {
                instant,
                keys: bincode::deserialize(payload)?,
            },
            BlockType::Rollback => {
                let body: RollbackBody = bincode::deserialize(payload)?;
                LogBlock::Rollback {
                    instant,
                    target_instant: body.target_instant,
                }
            }
            BlockType::Command => LogBlock::Command {
                instant,
                command: bincode::deserialize(payload)?,
            },
        };
        Ok(block)
    }
}

/// Serialize a payload, refusing anything a reader would reject as oversized
fn serialize_bounded<T: Serialize + ?Sized>(body: &T) -> Result<Vec<u8>> {
    let size = bincode::serialized_size(body)?;
    if size > MAX_PAYLOAD_SIZE as u64 {
        return Err(payload_too_large(size));
    }
    Ok(bincode::serialize(body)?)
}

fn payload_too_large(size: u64) -> MorError {
    MorError::Serialization(format!(
        "block payload of {} bytes exceeds the {} byte limit",
        size, MAX_PAYLOAD_SIZE
    ))
}
