//! Reader Module
//!
//! Record iteration over one file split (base file + log files).
//!
//! ## Strategies
//! ```text
//!                    ┌────────────────────┐
//!   JobConf ───────▶ │   RealtimeReader   │  hoodie.realtime.merge.skip
//!                    └─────────┬──────────┘
//!               false ┌────────┴────────┐ true
//!                     ▼                 ▼
//!           ┌──────────────────┐ ┌──────────────────┐
//!           │ CompactedReader  │ │  UnmergedReader  │
//!           │ base ⋈ merge map │ │ base, then log   │
//!           │ latest per key   │ │ no dedup         │
//!           └──────────────────┘ └──────────────────┘
//! ```

mod compacted;
mod realtime;
mod unmerged;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::base::BaseRecordSource;
use crate::error::Result;
use crate::merge::{LogFile, Lookup, MergeMap};
use crate::record::{Record, Schema};

pub use compacted::CompactedReader;
pub use realtime::RealtimeReader;
pub use unmerged::UnmergedReader;

/// Sequential record iteration shared by every reader strategy
pub trait RecordIterator {
    /// Move to the next record. `false` once exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Record produced by the last successful `advance()`
    fn current(&self) -> Option<&Record>;

    /// Number of records delivered so far
    fn position(&self) -> u64;

    /// Estimated fraction of the split consumed, in `[0, 1]`
    fn progress(&self) -> f32;

    /// Release files and spill storage. Idempotent.
    fn close(&mut self) -> Result<()>;
}

// =============================================================================
// File Split
// =============================================================================

/// One base file (optional) and its log files, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSplit {
    base_file: Option<PathBuf>,
    base_instant: Option<u64>,
    log_files: Vec<LogFile>,
}

impl FileSplit {
    /// Split with a base file written at `base_instant`
    pub fn new(base_file: impl Into<PathBuf>, base_instant: u64, log_files: Vec<LogFile>) -> Self {
        Self {
            base_file: Some(base_file.into()),
            base_instant: Some(base_instant),
            log_files,
        }
    }

    /// Split of a file group that has no base file yet
    pub fn log_only(log_files: Vec<LogFile>) -> Self {
        Self {
            base_file: None,
            base_instant: None,
            log_files,
        }
    }

    pub fn base_file(&self) -> Option<&Path> {
        self.base_file.as_deref()
    }

    pub fn base_instant(&self) -> Option<u64> {
        self.base_instant
    }

    pub fn log_files(&self) -> &[LogFile] {
        &self.log_files
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Position / estimated total, clamped to `[0, 1]`
fn progress_fraction(position: u64, estimated_total: u64, exhausted: bool) -> f32 {
    if exhausted {
        return 1.0;
    }
    if estimated_total == 0 {
        return 0.0;
    }
    (position as f32 / estimated_total as f32).min(1.0)
}

/// Next live log record after `cursor` in key order, skipping keys
/// already consumed by a base pass. Advances `cursor`.
fn next_live_entry(log: &MergeMap, cursor: &mut Option<String>) -> Result<Option<Record>> {
    while let Some(key) = log.next_key_after(cursor.as_deref()) {
        let lookup = if log.is_merged(&key) {
            Lookup::Absent
        } else {
            log.lookup(&key)?
        };
        *cursor = Some(key);
        if let Lookup::Record(record) = lookup {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Project onto the reader schema when one is set
fn reshape(record: Record, schema: Option<&Arc<Schema>>) -> Record {
    match schema {
        Some(schema) => record.project(schema),
        None => record,
    }
}

/// Close base and log, reporting the first failure
fn close_sources(base: &mut Option<Box<dyn BaseRecordSource>>, log: &mut MergeMap) -> Result<()> {
    let base_result = match base.take() {
        Some(mut source) => source.close(),
        None => Ok(()),
    };
    let log_result = log.close();
    base_result.and(log_result)
}
