//! Merge Module
//!
//! Replays log files into a key → latest-value map.
//!
//! ## Responsibilities
//! - Apply data/delete blocks with precombine conflict resolution
//! - Retract rolled-back instants through an applied-block log
//! - Bound memory by spilling entries to an append-only overflow file
//!
//! ## Conflict Resolution
//! ```text
//! existing (ord_a, seq_a)  vs  incoming (ord_b, seq_b)   seq = replay order
//!
//!   ord_b >  ord_a            → incoming wins
//!   ord_b == ord_a            → incoming wins (read later)
//!   ord_b <  ord_a            → existing stays
//! ```
//! Deletes compete under the same rule as tombstones.
//!
//! ## Memory Layout
//! ```text
//!   ┌──────────────────────────┐      ┌──────────────────────────────┐
//!   │ memory: BTreeMap         │      │ spill: append-only file      │
//!   │   key → version history  │ ───▶ │   [len][crc][bincode history]│
//!   │ (insertion-ordered evict)│      │ index: key → (offset, len)   │
//!   └──────────────────────────┘      └──────────────────────────────┘
//! ```
//! A key lives in exactly one of the two.

mod map;
mod scanner;
mod spill;

pub use map::{Lookup, MergeMap};
pub use scanner::{LogFile, LogScanner, ScanStats};
