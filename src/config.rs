//! Configuration for morread
//!
//! Two layers:
//! - [`ReaderConfig`]: typed knobs for the merge engine (spill threshold,
//!   spill directory, checksum verification), built with [`ReaderConfigBuilder`].
//! - [`JobConf`]: the string map handed over by the execution framework.
//!   Only [`REALTIME_SKIP_MERGE_PROP`] is read from it.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{MorError, Result};

/// Job property selecting unmerged (parallel base + log) reading
pub const REALTIME_SKIP_MERGE_PROP: &str = "hoodie.realtime.merge.skip";

/// Merged reading unless the job asks otherwise
pub const DEFAULT_REALTIME_SKIP_MERGE: &str = "false";

/// Main configuration for the merge engine
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    // -------------------------------------------------------------------------
    // Merge Map Configuration
    // -------------------------------------------------------------------------
    /// Approximate in-memory footprint (bytes) of the merge map before
    /// entries are spilled. `usize::MAX` disables spilling.
    pub max_memory_bytes: usize,

    /// Directory for spill files. `None` uses the system temp directory.
    /// Internal structure:
    ///   {spill_dir}/
    ///     └── .tmpXXXXXX/spill.bin   (one per merge map, removed on drop)
    pub spill_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Log Reader Configuration
    // -------------------------------------------------------------------------
    /// Verify block checksums when the block carries one
    pub verify_checksums: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024, // 64 MB
            spill_dir: None,
            verify_checksums: true,
        }
    }
}

impl ReaderConfig {
    /// Create a new config builder
    pub fn builder() -> ReaderConfigBuilder {
        ReaderConfigBuilder::default()
    }
}

/// Builder for ReaderConfig
#[derive(Default)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    /// Set the merge map memory threshold (in bytes)
    pub fn max_memory_bytes(mut self, bytes: usize) -> Self {
        self.config.max_memory_bytes = bytes;
        self
    }

    /// Set the memory threshold in megabytes, saturating at `usize::MAX`
    pub fn max_memory_mb(self, mb: usize) -> Self {
        self.max_memory_bytes(mb.saturating_mul(1024 * 1024))
    }

    /// Never spill, keep the whole merge map in memory
    pub fn unbounded_memory(mut self) -> Self {
        self.config.max_memory_bytes = usize::MAX;
        self
    }

    /// Set the directory used for spill files
    pub fn spill_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.spill_dir = Some(path.into());
        self
    }

    /// Enable or disable block checksum verification
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    pub fn build(self) -> ReaderConfig {
        self.config
    }
}

// =============================================================================
// Job Configuration
// =============================================================================

/// String-keyed job configuration passed in by the execution framework
#[derive(Debug, Clone, Default)]
pub struct JobConf {
    props: HashMap<String, String>,
}

impl JobConf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, returning self for chaining
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Parse a boolean property. Accepts `true`/`false` in any case,
    /// anything else is a configuration error.
    pub fn get_bool(&self, key: &str, default: &str) -> Result<bool> {
        let raw = self.get(key).unwrap_or(default).trim();
        if raw.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(MorError::Config(format!(
                "{} must be true or false, got {:?}",
                key, raw
            )))
        }
    }

    /// Whether the job asked for unmerged reading
    pub fn skip_merge(&self) -> Result<bool> {
        self.get_bool(REALTIME_SKIP_MERGE_PROP, DEFAULT_REALTIME_SKIP_MERGE)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobConf {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            props: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
