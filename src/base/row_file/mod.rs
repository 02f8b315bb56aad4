//! Row File Module
//!
//! Minimal base-file container: a schema followed by length-prefixed rows.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "MORW" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Schema Block                                            │
//! │   [Len: u32][bincode Schema]                            │
//! ├─────────────────────────────────────────────────────────┤
//! │ Row Block (variable)                                    │
//! │   [Len: u32][bincode Vec<Value>]                        │
//! │   ... repeated for each row ...                         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   RowsEnd: u64 (8) | RowCRC: u32 (4) | Padding (4)      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! RowCRC covers every byte of the row block.

mod reader;
mod writer;

pub use reader::RowFileReader;
pub use writer::RowFileWriter;

/// Magic bytes identifying a row file
pub(crate) const MAGIC: &[u8; 4] = b"MORW";

/// Current row file format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + RowCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: RowsEnd (8) + RowCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;
