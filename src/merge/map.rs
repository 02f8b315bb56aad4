//! Merge Map
//!
//! Key → latest record (or tombstone), backed by memory and a spill store.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::record::{OrderingValue, Record};

use super::scanner::ScanStats;
use super::spill::{next_key, SpillStore};

/// Fixed per-key bookkeeping charged against the memory budget
const SLOT_OVERHEAD: usize = 64;

/// Charge for one key recorded in an applied block's key set
const APPLIED_KEY_OVERHEAD: usize = 32;

/// Result of a merge map lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Latest version is a live record
    Record(Record),
    /// Latest version is a delete
    Tombstone,
    /// Key never appeared in the log
    Absent,
}

// =============================================================================
// Version History
// =============================================================================

/// One version of a key, contributed by an applied block
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Version {
    /// Sequence number of the applied block (replay order)
    seq: u64,
    /// Instant of the applied block; rollbacks retract by instant
    instant: u64,
    ordering: OrderingValue,
    /// `None` = tombstone
    record: Option<Record>,
}

/// Surviving versions of a key, at most one per instant, sorted by
/// `(ordering, seq)`. The last element is the winner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct History {
    versions: Vec<Version>,
}

impl History {
    fn push(&mut self, version: Version) {
        // Versions of one instant are always retracted together, so only
        // the best of them can ever be observed. Later reads win ties.
        if let Some(i) = self.versions.iter().position(|v| v.instant == version.instant) {
            if version.ordering < self.versions[i].ordering {
                return;
            }
            self.versions.remove(i);
        }

        let at = self
            .versions
            .partition_point(|v| (&v.ordering, v.seq) <= (&version.ordering, version.seq));
        self.versions.insert(at, version);
    }

    /// Rebuild from the frames of a spill chain
    fn merge(frames: Vec<History>) -> Self {
        let mut history = History::default();
        for version in frames.into_iter().flat_map(|f| f.versions) {
            history.push(version);
        }
        history
    }

    /// Drop the versions written under `instant`
    fn retract(&mut self, instant: u64) {
        self.versions.retain(|v| v.instant != instant);
    }

    fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn is_live(&self) -> bool {
        matches!(self.versions.last(), Some(Version { record: Some(_), .. }))
    }

    fn winner(&self) -> Option<Winner> {
        self.versions.last().map(|v| Winner {
            ordering: v.ordering.clone(),
            live: v.record.is_some(),
            merged: false,
        })
    }

    fn lookup(&self) -> Lookup {
        match self.versions.last() {
            Some(Version { record: Some(r), .. }) => Lookup::Record(r.clone()),
            Some(Version { record: None, .. }) => Lookup::Tombstone,
            None => Lookup::Absent,
        }
    }

    fn approx_size(&self) -> usize {
        self.versions
            .iter()
            .map(|v| {
                24 + v.ordering.approx_size() + v.record.as_ref().map_or(0, Record::approx_size)
            })
            .sum()
    }
}

/// Summary of a spilled key kept in memory, so updates can be appended to
/// its chain without reading it back
#[derive(Debug, Clone)]
struct Winner {
    ordering: OrderingValue,
    live: bool,
    /// Consumed by a base pass
    merged: bool,
}

/// In-memory entry
struct Slot {
    history: History,
    /// Insertion tick; matches the eviction queue entry that is still current
    tick: u64,
    size: usize,
    merged: bool,
}

/// A block applied to the map, kept so it can be rolled back
#[derive(Debug)]
struct AppliedBlock {
    instant: u64,
    keys: BTreeSet<String>,
    retracted: bool,
}

// =============================================================================
// Merge Map
// =============================================================================

/// Key → latest value, built by [`LogScanner`](super::LogScanner).
///
/// Read-only once returned from the scan. Spilled entries are read back
/// transparently by [`lookup`](Self::lookup).
pub struct MergeMap {
    memory: BTreeMap<String, Slot>,
    /// Eviction queue, oldest insert first. Entries whose tick no longer
    /// matches the slot are stale and skipped.
    insertion_order: VecDeque<(u64, String)>,
    next_tick: u64,
    memory_bytes: usize,
    max_memory_bytes: usize,

    spill: Option<SpillStore<Winner>>,
    spill_dir: Option<PathBuf>,
    spilled_entries: u64,

    /// Indexed by block sequence number
    applied: Vec<AppliedBlock>,
    /// Bytes held by the applied blocks' key sets
    applied_bytes: usize,

    total_keys: usize,
    live_keys: usize,

    stats: ScanStats,
}

impl MergeMap {
    pub(crate) fn new(config: &ReaderConfig) -> Self {
        Self {
            memory: BTreeMap::new(),
            insertion_order: VecDeque::new(),
            next_tick: 0,
            memory_bytes: 0,
            max_memory_bytes: config.max_memory_bytes,
            spill: None,
            spill_dir: config.spill_dir.clone(),
            spilled_entries: 0,
            applied: Vec::new(),
            applied_bytes: 0,
            total_keys: 0,
            live_keys: 0,
            stats: ScanStats::default(),
        }
    }

    // =========================================================================
    // Read API
    // =========================================================================

    /// Look up the latest value of a key
    pub fn lookup(&self, key: &str) -> Result<Lookup> {
        if let Some(slot) = self.memory.get(key) {
            return Ok(slot.history.lookup());
        }
        if let Some(spill) = &self.spill {
            match spill.meta(key) {
                Some(winner) if !winner.live => return Ok(Lookup::Tombstone),
                Some(_) => {
                    if let Some(frames) = spill.get::<History>(key)? {
                        return Ok(History::merge(frames).lookup());
                    }
                }
                None => {}
            }
        }
        Ok(Lookup::Absent)
    }

    /// Whether the key appeared in the log (live or tombstone)
    pub fn contains_key(&self, key: &str) -> bool {
        self.memory.contains_key(key) || self.spill.as_ref().is_some_and(|s| s.contains(key))
    }

    /// All keys in ascending order, memory and spill merged.
    ///
    /// Walks both sorted indexes one key at a time.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::successors(self.next_key_after(None), move |prev| {
            self.next_key_after(Some(prev.as_str()))
        })
    }

    /// Smallest key strictly greater than `after`, or the first key when
    /// `after` is `None`
    pub fn next_key_after(&self, after: Option<&str>) -> Option<String> {
        let in_memory = next_key(&self.memory, after);
        let in_spill = self.spill.as_ref().and_then(|s| s.next_key_after(after));
        match (in_memory, in_spill) {
            (Some(a), Some(b)) => Some(a.min(b).clone()),
            (a, b) => a.or(b).cloned(),
        }
    }

    /// Number of keys (live and tombstoned)
    pub fn len(&self) -> usize {
        self.total_keys
    }

    pub fn is_empty(&self) -> bool {
        self.total_keys == 0
    }

    /// Number of keys whose latest version is a live record
    pub fn live_count(&self) -> usize {
        self.live_keys
    }

    /// Number of keys currently held in the spill store
    pub fn spilled_count(&self) -> usize {
        self.spill.as_ref().map_or(0, SpillStore::len)
    }

    /// Approximate bytes held in memory: resident entries plus rollback
    /// bookkeeping
    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes + self.applied_bytes
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Release the spill store. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(spill) = self.spill.take() {
            spill.close()?;
        }
        Ok(())
    }

    // =========================================================================
    // Merge API (crate-internal, used by the compacted reader)
    // =========================================================================

    /// Flag a key as consumed by the base pass
    pub(crate) fn mark_merged(&mut self, key: &str) {
        if let Some(slot) = self.memory.get_mut(key) {
            slot.merged = true;
        } else if let Some(winner) = self.spill.as_mut().and_then(|s| s.meta_mut(key)) {
            winner.merged = true;
        }
    }

    pub(crate) fn is_merged(&self, key: &str) -> bool {
        match self.memory.get(key) {
            Some(slot) => slot.merged,
            None => self
                .spill
                .as_ref()
                .and_then(|s| s.meta(key))
                .is_some_and(|w| w.merged),
        }
    }

    // =========================================================================
    // Scan API (crate-internal, used while replaying)
    // =========================================================================

    /// Register a block about to be applied; returns its sequence number
    pub(crate) fn begin_block(&mut self, instant: u64) -> u64 {
        let seq = self.applied.len() as u64;
        self.applied.push(AppliedBlock {
            instant,
            keys: BTreeSet::new(),
            retracted: false,
        });
        seq
    }

    /// Add a version of `key` from block `seq`. `None` is a delete.
    pub(crate) fn upsert(
        &mut self,
        seq: u64,
        key: String,
        ordering: OrderingValue,
        record: Option<Record>,
    ) -> Result<()> {
        let instant = match self.applied.get_mut(seq as usize) {
            Some(block) => {
                if !block.keys.contains(&key) {
                    self.applied_bytes += APPLIED_KEY_OVERHEAD + key.len();
                    block.keys.insert(key.clone());
                }
                block.instant
            }
            None => 0,
        };
        let version = Version {
            seq,
            instant,
            ordering,
            record,
        };

        if let Some(slot) = self.memory.get_mut(&key) {
            let was_live = slot.history.is_live();
            slot.history.push(version);
            let is_live = slot.history.is_live();
            let size = SLOT_OVERHEAD + key.len() + slot.history.approx_size();
            self.memory_bytes = self.memory_bytes - slot.size + size;
            slot.size = size;
            slot.tick = self.next_tick;
            self.insertion_order.push_back((self.next_tick, key));
            self.next_tick += 1;
            self.adjust_counts(true, was_live, true, is_live);
            return self.maybe_spill();
        }

        if let Some(spill) = self.spill.as_mut() {
            if let Some(top) = spill.meta(&key).cloned() {
                // Appended without reading the chain back
                let was_live = top.live;
                let winner = if version.ordering >= top.ordering {
                    Winner {
                        ordering: version.ordering.clone(),
                        live: version.record.is_some(),
                        merged: top.merged,
                    }
                } else {
                    top
                };
                let is_live = winner.live;
                spill.append(
                    &key,
                    winner,
                    &History {
                        versions: vec![version],
                    },
                )?;
                self.adjust_counts(true, was_live, true, is_live);
                return Ok(());
            }
        }

        let history = History {
            versions: vec![version],
        };
        self.adjust_counts(false, false, true, history.is_live());
        self.put_history(key, history, false);
        self.maybe_spill()
    }

    /// Retract every applied block written under `instant`.
    /// Returns the number of blocks retracted; zero means nothing matched.
    pub(crate) fn retract_instant(&mut self, instant: u64) -> Result<usize> {
        let mut retracted = 0;
        let mut keys = BTreeSet::new();
        for block in self
            .applied
            .iter_mut()
            .filter(|b| b.instant == instant && !b.retracted)
        {
            block.retracted = true;
            retracted += 1;
            for key in std::mem::take(&mut block.keys) {
                self.applied_bytes -= APPLIED_KEY_OVERHEAD + key.len();
                keys.insert(key);
            }
        }

        for key in keys {
            let (mut history, merged) = match self.take_history(&key)? {
                Some(taken) => taken,
                None => continue,
            };
            let was_live = history.is_live();
            history.retract(instant);
            let is_present = !history.is_empty();
            self.adjust_counts(true, was_live, is_present, history.is_live());
            if is_present {
                self.put_history(key, history, merged);
            }
            self.maybe_spill()?;
        }

        Ok(retracted)
    }

    pub(crate) fn set_stats(&mut self, mut stats: ScanStats) {
        stats.spilled_entries = self.spilled_entries;
        stats.spill_bytes = self.spill.as_ref().map_or(0, SpillStore::bytes_written);
        stats.spill_frames = self.spill.as_ref().map_or(0, SpillStore::frames_written);
        stats.spill_file_bytes = self.spill.as_ref().map_or(0, SpillStore::file_len);
        stats.spill_compactions = self.spill.as_ref().map_or(0, SpillStore::compactions);
        self.stats = stats;
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Remove a key's history from wherever it lives
    fn take_history(&mut self, key: &str) -> Result<Option<(History, bool)>> {
        if let Some(slot) = self.memory.remove(key) {
            self.memory_bytes -= slot.size;
            return Ok(Some((slot.history, slot.merged)));
        }
        let spill = match self.spill.as_mut() {
            Some(spill) => spill,
            None => return Ok(None),
        };
        let merged = spill.meta(key).is_some_and(|w| w.merged);
        Ok(spill
            .take::<History>(key)?
            .map(|frames| (History::merge(frames), merged)))
    }

    /// Insert a history into memory as the most recent insert
    fn put_history(&mut self, key: String, history: History, merged: bool) {
        let size = SLOT_OVERHEAD + key.len() + history.approx_size();
        let tick = self.next_tick;
        self.next_tick += 1;

        self.memory_bytes += size;
        self.insertion_order.push_back((tick, key.clone()));
        self.memory.insert(
            key,
            Slot {
                history,
                tick,
                size,
                merged,
            },
        );
    }

    fn adjust_counts(&mut self, was_present: bool, was_live: bool, is_present: bool, is_live: bool) {
        match (was_present, is_present) {
            (false, true) => self.total_keys += 1,
            (true, false) => self.total_keys -= 1,
            _ => {}
        }
        match (was_live, is_live) {
            (false, true) => self.live_keys += 1,
            (true, false) => self.live_keys -= 1,
            _ => {}
        }
    }

    /// Evict least-recently-inserted entries until under the memory budget
    fn maybe_spill(&mut self) -> Result<()> {
        while self.memory_bytes() > self.max_memory_bytes {
            let (tick, key) = match self.insertion_order.pop_front() {
                Some(entry) => entry,
                None => break,
            };

            let current = self.memory.get(&key).is_some_and(|slot| slot.tick == tick);
            if !current {
                continue;
            }

            let slot = match self.memory.remove(&key) {
                Some(slot) => slot,
                None => continue,
            };
            self.memory_bytes -= slot.size;

            let winner = match slot.history.winner() {
                Some(mut winner) => {
                    winner.merged = slot.merged;
                    winner
                }
                None => continue,
            };

            if self.spill.is_none() {
                tracing::debug!(
                    "Merge map over budget ({} > {} bytes), spilling",
                    self.memory_bytes() + slot.size,
                    self.max_memory_bytes
                );
                self.spill = Some(SpillStore::create(self.spill_dir.as_deref())?);
            }
            if let Some(spill) = self.spill.as_mut() {
                spill.put(&key, winner, &slot.history)?;
            }
            self.spilled_entries += 1;
        }

        // Keep the queue from growing without bound on update-heavy logs
        if self.insertion_order.len() > 2 * self.memory.len() + 1024 {
            let memory = &self.memory;
            self.insertion_order
                .retain(|(tick, key)| memory.get(key).is_some_and(|s| s.tick == *tick));
        }

        Ok(())
    }
}

impl Drop for MergeMap {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to remove spill file: {}", e);
        }
    }
}
