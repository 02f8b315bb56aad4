//! Unmerged Reader
//!
//! Base records and log records as two independent streams, no dedup.

use std::sync::Arc;

use crate::base::BaseRecordSource;
use crate::error::Result;
use crate::merge::MergeMap;
use crate::record::{KeyExtractor, Record, Schema};

use super::{close_sources, next_live_entry, progress_fraction, reshape, RecordIterator};

/// Which stream `advance()` is pulling from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Base,
    Log,
    Done,
}

/// Reads the base stream to the end, then every live log entry in
/// ascending key order.
///
/// Keys are never cross-referenced: a key updated in the log appears twice
/// (base version, then log version), and a key deleted in the log still
/// appears with its base version. Tombstones themselves are never emitted.
/// Emitted count = base records + live log keys.
pub struct UnmergedReader {
    base: Option<Box<dyn BaseRecordSource>>,
    schema: Option<Arc<Schema>>,
    extractor: Arc<dyn KeyExtractor>,
    log: MergeMap,
    /// Last key visited by the log stream
    log_cursor: Option<String>,
    stream: Stream,

    current: Option<Record>,
    position: u64,
    base_records: u64,
    estimated_total: u64,
    closed: bool,
}

impl UnmergedReader {
    pub fn new(
        base: Option<Box<dyn BaseRecordSource>>,
        log: MergeMap,
        extractor: Arc<dyn KeyExtractor>,
    ) -> Self {
        let schema = base.as_ref().map(|b| Arc::clone(b.schema()));
        let base_len = base.as_ref().and_then(|b| b.len_hint()).unwrap_or(0);
        let estimated_total = base_len + log.live_count() as u64;

        Self {
            base,
            schema,
            extractor,
            log,
            log_cursor: None,
            stream: Stream::Base,
            current: None,
            position: 0,
            base_records: 0,
            estimated_total,
            closed: false,
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    pub fn merge_map(&self) -> &MergeMap {
        &self.log
    }

    pub(crate) fn extractor(&self) -> &Arc<dyn KeyExtractor> {
        &self.extractor
    }

    /// Records delivered from the base stream so far
    pub fn base_records(&self) -> u64 {
        self.base_records
    }

    /// Records delivered from the log stream so far
    pub fn log_records(&self) -> u64 {
        self.position - self.base_records
    }
}

impl RecordIterator for UnmergedReader {
    fn advance(&mut self) -> Result<bool> {
        if self.closed {
            self.current = None;
            return Ok(false);
        }

        if self.stream == Stream::Base {
            let next = match self.base.as_mut() {
                Some(base) => base.next_record()?,
                None => None,
            };
            match next {
                Some(record) => {
                    self.current = Some(record);
                    self.position += 1;
                    self.base_records += 1;
                    return Ok(true);
                }
                None => {
                    if let Some(mut base) = self.base.take() {
                        base.close()?;
                    }
                    self.stream = Stream::Log;
                }
            }
        }

        if self.stream == Stream::Log {
            if let Some(record) = next_live_entry(&self.log, &mut self.log_cursor)? {
                self.current = Some(reshape(record, self.schema.as_ref()));
                self.position += 1;
                return Ok(true);
            }
            self.stream = Stream::Done;
        }

        self.current = None;
        Ok(false)
    }

    fn current(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn progress(&self) -> f32 {
        progress_fraction(self.position, self.estimated_total, self.stream == Stream::Done)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        self.log_cursor = None;
        close_sources(&mut self.base, &mut self.log)
    }
}
