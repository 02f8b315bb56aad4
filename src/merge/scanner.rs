//! Log Scanner
//!
//! Replays the log files of a split, in write order, into a [`MergeMap`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::log::{CommandKind, LogBlock, LogReader};
use crate::record::{KeyExtractor, RecordKey};

use super::MergeMap;

/// A log file of a split and the instant of the file slice it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub instant: u64,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>, instant: u64) -> Self {
        Self {
            path: path.into(),
            instant,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Counters collected while scanning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Log files fully or partially replayed
    pub files_scanned: u64,
    /// Log files from an older file slice, not opened
    pub files_skipped: u64,
    /// Log files abandoned at a corrupt block
    pub corrupt_files: u64,
    /// Log files ending in an incomplete block
    pub truncated_files: u64,

    pub data_blocks: u64,
    pub delete_blocks: u64,
    pub rollback_blocks: u64,
    pub command_blocks: u64,
    /// Data/delete blocks already covered by the base file
    pub blocks_skipped: u64,
    /// Applied blocks later retracted by a rollback
    pub blocks_rolled_back: u64,
    /// End-of-commit markers seen
    pub commits_seen: u64,

    pub records_read: u64,
    pub deletes_read: u64,

    pub spilled_entries: u64,
    pub spill_frames: u64,
    /// Bytes appended to the spill file, compaction rewrites excluded
    pub spill_bytes: u64,
    /// Spill file size at the end of the scan
    pub spill_file_bytes: u64,
    pub spill_compactions: u64,
}

/// Builds a [`MergeMap`] from log files
pub struct LogScanner {
    config: ReaderConfig,
    extractor: Arc<dyn KeyExtractor>,
}

impl LogScanner {
    pub fn new(config: ReaderConfig, extractor: Arc<dyn KeyExtractor>) -> Self {
        Self { config, extractor }
    }

    /// Replay `log_files` in order.
    ///
    /// `base_instant` is the commit instant of the base file, if any:
    /// - log files with an older instant belong to a previous file slice and are skipped
    /// - data/delete blocks at or before it are already in the base file and are skipped
    ///
    /// A corrupt block ends the current file only; I/O failures abort the scan.
    pub fn scan(&self, log_files: &[LogFile], base_instant: Option<u64>) -> Result<MergeMap> {
        let mut map = MergeMap::new(&self.config);
        let mut stats = ScanStats::default();

        for file in log_files {
            if base_instant.is_some_and(|base| file.instant < base) {
                tracing::debug!(
                    "Skipping log file {} from older file slice {}",
                    file.path.display(),
                    file.instant
                );
                stats.files_skipped += 1;
                continue;
            }

            match self.scan_file(file, base_instant, &mut map, &mut stats) {
                Ok(()) => {}
                Err(e) if e.is_corrupt_block() => {
                    tracing::warn!("{}; continuing with next log file", e);
                    stats.corrupt_files += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Scanned {} log files: {} records, {} deletes, {} rollbacks, {} keys ({} live), {} spilled",
            stats.files_scanned,
            stats.records_read,
            stats.deletes_read,
            stats.rollback_blocks,
            map.len(),
            map.live_count(),
            map.spilled_count()
        );

        map.set_stats(stats);
        Ok(map)
    }

    fn scan_file(
        &self,
        file: &LogFile,
        base_instant: Option<u64>,
        map: &mut MergeMap,
        stats: &mut ScanStats,
    ) -> Result<()> {
        tracing::debug!("Scanning log file {}", file.path.display());

        let mut reader = LogReader::open(&file.path)?.verify_checksums(self.config.verify_checksums);
        stats.files_scanned += 1;

        while let Some(block) = reader.read_next_block()? {
            self.apply_block(block, base_instant, map, stats)?;
        }

        if reader.was_truncated() {
            stats.truncated_files += 1;
        }
        Ok(())
    }

    fn apply_block(
        &self,
        block: LogBlock,
        base_instant: Option<u64>,
        map: &mut MergeMap,
        stats: &mut ScanStats,
    ) -> Result<()> {
        let in_base = |instant: u64| base_instant.is_some_and(|base| instant <= base);

        match block {
            LogBlock::Data { instant, records } => {
                stats.data_blocks += 1;
                if in_base(instant) {
                    stats.blocks_skipped += 1;
                    return Ok(());
                }
                let seq = map.begin_block(instant);
                for record in records {
                    let RecordKey { key, ordering } = self.extractor.extract(&record)?;
                    map.upsert(seq, key, ordering, Some(record))?;
                    stats.records_read += 1;
                }
            }
            LogBlock::Delete { instant, keys } => {
                stats.delete_blocks += 1;
                if in_base(instant) {
                    stats.blocks_skipped += 1;
                    return Ok(());
                }
                let seq = map.begin_block(instant);
                for delete in keys {
                    map.upsert(seq, delete.key, delete.ordering, None)?;
                    stats.deletes_read += 1;
                }
            }
            LogBlock::Rollback {
                instant,
                target_instant,
            } => {
                stats.rollback_blocks += 1;
                let retracted = map.retract_instant(target_instant)?;
                if retracted == 0 {
                    tracing::debug!(
                        "Rollback at {} targets instant {} with no applied blocks",
                        instant,
                        target_instant
                    );
                } else {
                    tracing::debug!(
                        "Rollback at {} retracted {} blocks of instant {}",
                        instant,
                        retracted,
                        target_instant
                    );
                }
                stats.blocks_rolled_back += retracted as u64;
            }
            LogBlock::Command { command, .. } => {
                stats.command_blocks += 1;
                if command == CommandKind::EndOfCommit {
                    stats.commits_seen += 1;
                }
            }
        }
        Ok(())
    }
}
