//! Error types for morread
//!
//! Provides a unified error type for all read-path operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using MorError
pub type Result<T> = std::result::Result<T, MorError>;

/// Unified error type for merge-on-read operations
#[derive(Debug, Error)]
pub enum MorError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {} at offset {offset}: {source}", .path.display())]
    IoAt {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    /// Malformed block content in a log file. Scoped to that file only.
    #[error("Corrupt log block in {} at offset {offset}: {reason}", .path.display())]
    CorruptBlock {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Merge Errors
    // -------------------------------------------------------------------------
    #[error("Key extraction failed: {0}")]
    KeyExtraction(String),

    #[error("Spill storage error: {0}")]
    Spill(String),

    // -------------------------------------------------------------------------
    // Base File Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MorError {
    /// Wrap an I/O error with the file and byte offset it happened at
    pub fn io_at(path: impl Into<PathBuf>, offset: u64, source: std::io::Error) -> Self {
        MorError::IoAt {
            path: path.into(),
            offset,
            source,
        }
    }

    /// True for errors that only invalidate the current log file
    pub fn is_corrupt_block(&self) -> bool {
        matches!(self, MorError::CorruptBlock { .. })
    }
}

impl From<bincode::Error> for MorError {
    fn from(err: bincode::Error) -> Self {
        MorError::Serialization(err.to_string())
    }
}
