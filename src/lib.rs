//! # morread
//!
//! Read path of a merge-on-read table format:
//! - Log block protocol with checksums and truncated-tail tolerance
//! - Log scanner building a spillable key → latest-record merge map
//! - Compacted (merged) and unmerged record readers
//! - One dispatching reader selected from job configuration
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RealtimeReader                          │
//! │          (hoodie.realtime.merge.skip → strategy)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Compacted  │          │  Unmerged   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                         │
//!          ├─────────────┬───────────┘
//!          ▼             ▼
//!   ┌─────────────┐ ┌─────────────┐      ┌─────────────┐
//!   │ Base Source │ │  MergeMap   │ ───▶ │ Spill Store │
//!   │ (row file)  │ │             │      │ (tempfile)  │
//!   └─────────────┘ └──────▲──────┘      └─────────────┘
//!                          │
//!                   ┌──────┴──────┐
//!                   │ LogScanner  │
//!                   │ (LogReader) │
//!                   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod log;
pub mod merge;
pub mod base;
pub mod reader;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MorError, Result};
pub use config::{JobConf, ReaderConfig, REALTIME_SKIP_MERGE_PROP};
pub use merge::{LogFile, LogScanner, Lookup, MergeMap};
pub use reader::{FileSplit, RealtimeReader, RecordIterator};
pub use record::{FieldKeyExtractor, KeyExtractor, OrderingValue, Record, Schema, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of morread
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
