//! Compacted Reader
//!
//! Merged (merge-on-read) view of a split: every key at most once, with its
//! latest value.

use std::sync::Arc;

use crate::base::BaseRecordSource;
use crate::error::Result;
use crate::merge::{Lookup, MergeMap};
use crate::record::{KeyExtractor, Record, Schema};

use super::{close_sources, next_live_entry, progress_fraction, reshape, RecordIterator};

/// Merges the base record stream with a scanned [`MergeMap`].
///
/// Base pass, per record:
/// - key absent from the log → base record as is
/// - key live in the log → log record (projected onto the base schema)
/// - key tombstoned → dropped
///
/// Then every live log key never seen in the base, in ascending key order.
/// Log entries always replace base records, whatever their ordering values:
/// the base file is the older snapshot.
pub struct CompactedReader {
    /// `None` for log-only splits and once the base pass is done
    base: Option<Box<dyn BaseRecordSource>>,
    schema: Option<Arc<Schema>>,
    extractor: Arc<dyn KeyExtractor>,
    log: MergeMap,

    /// Base records replaced or suppressed by the log
    matched: u64,
    /// Last key visited by the log pass
    log_cursor: Option<String>,

    current: Option<Record>,
    position: u64,
    estimated_total: u64,
    exhausted: bool,
    closed: bool,
}

impl CompactedReader {
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
            matched: 0,
            log_cursor: None,
            current: None,
            position: 0,
            estimated_total,
            exhausted: false,
            closed: false,
        }
    }

    /// Reader schema (the base file's), if there is a base file
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    pub fn merge_map(&self) -> &MergeMap {
        &self.log
    }

    pub(crate) fn extractor(&self) -> &Arc<dyn KeyExtractor> {
        &self.extractor
    }

    /// Next record of the base pass, `None` once the base is drained
    fn next_from_base(&mut self) -> Result<Option<Record>> {
        let base = match self.base.as_mut() {
            Some(base) => base,
            None => return Ok(None),
        };

        while let Some(record) = base.next_record()? {
            let key = self.extractor.extract(&record)?.key;
            let lookup = self.log.lookup(&key)?;
            if lookup != Lookup::Absent {
                self.log.mark_merged(&key);
                self.matched += 1;
            }
            match lookup {
                Lookup::Absent => return Ok(Some(record)),
                Lookup::Record(latest) => return Ok(Some(reshape(latest, self.schema.as_ref()))),
                Lookup::Tombstone => {}
            }
        }

        tracing::debug!(
            "Base pass done after {} records, {} log keys merged",
            self.position,
            self.matched
        );
        if let Some(mut base) = self.base.take() {
            base.close()?;
        }
        Ok(None)
    }

    fn next_from_log(&mut self) -> Result<Option<Record>> {
        let record = next_live_entry(&self.log, &mut self.log_cursor)?;
        Ok(record.map(|r| reshape(r, self.schema.as_ref())))
    }
}

impl RecordIterator for CompactedReader {
    fn advance(&mut self) -> Result<bool> {
        if self.exhausted || self.closed {
            self.current = None;
            return Ok(false);
        }

        let next = match self.next_from_base()? {
            Some(record) => Some(record),
            None => self.next_from_log()?,
        };

        match next {
            Some(record) => {
                self.current = Some(record);
                self.position += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    fn current(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn progress(&self) -> f32 {
        progress_fraction(self.position, self.estimated_total, self.exhausted)
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
