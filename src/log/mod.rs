//! Log Module
//!
//! Append-only log files holding the changes made since the base file was
//! written, organised as self-describing typed blocks.
//!
//! ## Responsibilities
//! - Encode/decode the four block kinds (data, delete, rollback, command)
//! - CRC32 checksums for corruption detection
//! - Forward-only reading with truncated-tail tolerance
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Block 1                                                      │
//! │ ┌───────────────────────────────────────────────────────────┐│
//! │ │ Header (18)                                               ││
//! │ │  Magic "MORB" (4) | Type (1) | Flags (1) | Instant (8)    ││
//! │ │  PayloadLen (4)                                           ││
//! │ ├───────────────────────────────────────────────────────────┤│
//! │ │ Payload (PayloadLen) - bincode block body                 ││
//! │ ├───────────────────────────────────────────────────────────┤│
//! │ │ Footer (8)                                                ││
//! │ │  CRC32 of payload (4) | PayloadLen repeated (4)           ││
//! │ └───────────────────────────────────────────────────────────┘│
//! ├──────────────────────────────────────────────────────────────┤
//! │ Block 2 ...                                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A block whose footer length disagrees with its header, or that is cut
//! short by end-of-file, marks the end of valid data in that file.

mod block;
mod reader;
mod writer;

pub use block::{
    BlockType, CommandKind, DeleteKey, LogBlock, FLAG_CHECKSUM, FOOTER_SIZE, HEADER_SIZE, MAGIC,
    MAX_PAYLOAD_SIZE,
};
pub use reader::{LogBlockIter, LogReader};
pub use writer::LogWriter;
