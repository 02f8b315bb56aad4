//! Realtime Reader
//!
//! The reader callers construct. Picks compacted or unmerged reading from
//! the job configuration and forwards everything to the chosen strategy.

use std::sync::Arc;

use crate::base::{BaseRecordSource, RowFileReader};
use crate::config::{JobConf, ReaderConfig};
use crate::error::Result;
use crate::merge::{LogScanner, MergeMap, ScanStats};
use crate::record::{KeyExtractor, Record, Schema};

use super::{CompactedReader, FileSplit, RecordIterator, UnmergedReader};

/// Merge-on-read reader over one file split
pub enum RealtimeReader {
    /// Latest value per key
    Compacted(CompactedReader),
    /// Base then log, no dedup
    Unmerged(UnmergedReader),
}

impl RealtimeReader {
    /// Build a reader over `split` with an already opened base decoder.
    ///
    /// The log files are scanned here, so configuration errors and I/O
    /// failures on the split surface from the constructor rather than from
    /// the first `advance()`.
    pub fn new(
        split: &FileSplit,
        job: &JobConf,
        config: ReaderConfig,
        base: Option<Box<dyn BaseRecordSource>>,
        extractor: Arc<dyn KeyExtractor>,
    ) -> Result<Self> {
        let skip_merge = job.skip_merge()?;
        Self::construct(split, skip_merge, config, base, extractor).map_err(|e| {
            tracing::error!("Got error when constructing record reader: {}", e);
            e
        })
    }

    /// Build a reader, opening the split's base file as a row file
    pub fn open(
        split: &FileSplit,
        job: &JobConf,
        config: ReaderConfig,
        extractor: Arc<dyn KeyExtractor>,
    ) -> Result<Self> {
        // Parse configuration before touching any file
        let skip_merge = job.skip_merge()?;

        let base = match split.base_file() {
            Some(path) => {
                let reader = RowFileReader::open(path).map_err(|e| {
                    tracing::error!("Failed to open base file {}: {}", path.display(), e);
                    e
                })?;
                Some(Box::new(reader) as Box<dyn BaseRecordSource>)
            }
            None => None,
        };

        Self::construct(split, skip_merge, config, base, extractor).map_err(|e| {
            tracing::error!("Got error when constructing record reader: {}", e);
            e
        })
    }

    fn construct(
        split: &FileSplit,
        skip_merge: bool,
        config: ReaderConfig,
        base: Option<Box<dyn BaseRecordSource>>,
        extractor: Arc<dyn KeyExtractor>,
    ) -> Result<Self> {
        let scanner = LogScanner::new(config, Arc::clone(&extractor));
        let log = scanner.scan(split.log_files(), split.base_instant())?;

        if skip_merge {
            tracing::info!("Enabling un-merged reading of realtime records");
            Ok(RealtimeReader::Unmerged(UnmergedReader::new(base, log, extractor)))
        } else {
            tracing::debug!("Using compacted reading of realtime records");
            Ok(RealtimeReader::Compacted(CompactedReader::new(base, log, extractor)))
        }
    }

    // =========================================================================
    // Placeholder API
    // =========================================================================

    /// Reusable key buffer for `advance_into`
    pub fn create_key_placeholder(&self) -> String {
        String::new()
    }

    /// Reusable row buffer for `advance_into`
    pub fn create_value_placeholder(&self) -> Record {
        let schema = self
            .schema()
            .cloned()
            .unwrap_or_else(|| Arc::new(Schema::new(Vec::<String>::new())));
        Record::empty(schema)
    }

    /// Advance and copy the record into the supplied placeholders.
    /// Returns whether a record was produced; on `false` both are untouched.
    pub fn advance_into(&mut self, key: &mut String, value: &mut Record) -> Result<bool> {
        if !self.advance()? {
            return Ok(false);
        }
        if let Some(record) = self.current() {
            let record_key = self.extractor().extract(record)?;
            key.clear();
            key.push_str(&record_key.key);
            record.copy_into(value);
        }
        Ok(true)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether this reader merges base and log
    pub fn is_merging(&self) -> bool {
        matches!(self, RealtimeReader::Compacted(_))
    }

    /// Reader schema (the base file's), if the split has a base file
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            RealtimeReader::Compacted(r) => r.schema(),
            RealtimeReader::Unmerged(r) => r.schema(),
        }
    }

    pub fn merge_map(&self) -> &MergeMap {
        match self {
            RealtimeReader::Compacted(r) => r.merge_map(),
            RealtimeReader::Unmerged(r) => r.merge_map(),
        }
    }

    /// Counters from the log scan
    pub fn scan_stats(&self) -> &ScanStats {
        self.merge_map().stats()
    }

    fn inner(&self) -> &dyn RecordIterator {
        match self {
            RealtimeReader::Compacted(r) => r,
            RealtimeReader::Unmerged(r) => r,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn RecordIterator {
        match self {
            RealtimeReader::Compacted(r) => r,
            RealtimeReader::Unmerged(r) => r,
        }
    }

    fn extractor(&self) -> &Arc<dyn KeyExtractor> {
        match self {
            RealtimeReader::Compacted(r) => r.extractor(),
            RealtimeReader::Unmerged(r) => r.extractor(),
        }
    }
}

impl RecordIterator for RealtimeReader {
    fn advance(&mut self) -> Result<bool> {
        self.inner_mut().advance()
    }

    fn current(&self) -> Option<&Record> {
        self.inner().current()
    }

    fn position(&self) -> u64 {
        self.inner().position()
    }

    fn progress(&self) -> f32 {
        self.inner().progress()
    }

    fn close(&mut self) -> Result<()> {
        self.inner_mut().close()
    }
}
