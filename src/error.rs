//! Error types for mod-ingest
//!
//! This module provides the error taxonomy for the library:
//! - Archive problems (unrecognized/corrupt containers, entry extraction)
//! - File relocation problems (copy failures, exhausted delete retries)
//! - Persisted-state problems (corrupt queue-state file)
//! - Watcher and configuration errors
//!
//! None of these are fatal to a host process: the ingestion loop catches,
//! logs, and continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mod-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mod-ingest
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "mod_dir")
        key: Option<String>,
    },

    /// Archive could not be opened as a recognized container
    ///
    /// Raised for unknown extensions and for files that fail to parse as the
    /// format their extension claims. Treated as "nothing to extract" by the
    /// processor, never retried.
    #[error("unsupported archive {path}: {reason}")]
    UnsupportedArchive {
        /// The file that could not be opened as an archive
        path: PathBuf,
        /// Why the container was rejected
        reason: String,
    },

    /// Archive opened but extraction of its entries failed
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// The archive being extracted
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// File copy/relocation failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The source path of the file being moved
        source_path: PathBuf,
        /// The destination path where the file should land
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// Delete failed after the bounded retry budget was exhausted
    ///
    /// Surfaced (not swallowed) so the host can see it, but it never blocks
    /// the ingestion loop.
    #[error("failed to delete {path} after {attempts} attempts")]
    DeleteFailed {
        /// The path that could not be deleted
        path: PathBuf,
        /// How many delete attempts were made
        attempts: u32,
    },

    /// Persisted queue-state file unreadable
    ///
    /// The store discards the file and starts empty; this variant never fails
    /// startup.
    #[error("queue state file {path} is corrupt: {reason}")]
    StateCorruption {
        /// The state file that failed to parse
        path: PathBuf,
        /// The parse failure
        reason: String,
    },

    /// Directory watching error
    #[error("directory watch error: {0}")]
    Watch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress")]
    ShuttingDown,
}
