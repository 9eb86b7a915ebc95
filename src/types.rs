//! Core types and events for mod-ingest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classification of a discovered file, decided by extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Standalone mod package file (e.g. `.pmp`, `.ttmp2`)
    ModFile,
    /// Compressed container that may hold zero or more mod files
    Archive,
    /// Anything else - logged and dropped without retry
    Unsupported,
}

/// A file being tracked by the ingestion queue
///
/// Unique by absolute path. `retry_count` resets to zero when the file becomes
/// ready or when a rename re-keys the entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    /// Absolute path of the tracked file
    pub path: PathBuf,
    /// When the file was first discovered (survives restarts)
    pub first_seen: DateTime<Utc>,
    /// How many readiness checks have failed so far
    pub retry_count: u32,
}

impl PendingFile {
    /// Track a freshly discovered path
    pub fn discovered(path: PathBuf) -> Self {
        Self {
            path,
            first_seen: Utc::now(),
            retry_count: 0,
        }
    }

    /// Resume a path loaded from the persisted queue state
    ///
    /// The retry counter always restarts at zero: persisted counters would
    /// only skew the log-verbosity decay, not behavior.
    pub fn resumed(path: PathBuf, first_seen: DateTime<Utc>) -> Self {
        Self {
            path,
            first_seen,
            retry_count: 0,
        }
    }
}

/// One row of an archive listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Entry path relative to the archive root
    pub relative_name: PathBuf,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Whether the entry is a directory
    pub is_directory: bool,
}

impl ArchiveEntry {
    /// Lowercased extension of the entry, if any
    pub fn extension(&self) -> Option<String> {
        self.relative_name
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Events broadcast to subscribers as artifacts become ready
///
/// Consumers (the downstream mod installer, a UI relay) subscribe via
/// [`crate::queue::IngestionQueue::subscribe`]. Each processed file yields at
/// most one event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A standalone mod file was relocated and is ready for installation
    FileMoved {
        /// File name of the moved mod file (no directory components)
        file_name: String,
        /// Full path the file now lives at
        destination: PathBuf,
        /// Base name without extension, used as the mod's display name
        mod_name: String,
    },

    /// Matching entries were extracted from an archive
    ///
    /// Ownership of the listed files passes to the subscriber.
    FilesExtracted {
        /// File name of the source archive (no directory components)
        archive_name: String,
        /// Full paths of every extracted file
        extracted_paths: Vec<PathBuf>,
    },
}

/// What the processor decided about one file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Mod file moved to its destination
    Moved(PathBuf),
    /// Archive relocated and matching entries extracted
    Extracted(Vec<PathBuf>),
    /// Archive contained nothing relevant - left untouched in place
    Ignored,
    /// File failed to open as a valid container - deleted or skipped
    Invalid,
    /// Extension not recognized - dropped without retry
    Unsupported,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_entry_extension_is_lowercased() {
        let entry = ArchiveEntry {
            relative_name: PathBuf::from("folder/Mod.PMP"),
            size: 10,
            is_directory: false,
        };
        assert_eq!(entry.extension().as_deref(), Some("pmp"));
    }

    #[test]
    fn archive_entry_without_extension_has_none() {
        let entry = ArchiveEntry {
            relative_name: PathBuf::from("README"),
            size: 0,
            is_directory: false,
        };
        assert_eq!(entry.extension(), None);
    }

    #[test]
    fn resumed_pending_file_resets_retry_counter() {
        let ts = Utc::now();
        let pending = PendingFile::resumed(PathBuf::from("/d/mod.pmp"), ts);
        assert_eq!(pending.retry_count, 0);
        assert_eq!(pending.first_seen, ts);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::FileMoved {
            file_name: "mod.pmp".into(),
            destination: PathBuf::from("/mods/mod/mod.pmp"),
            mod_name: "mod".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "file_moved");
        assert_eq!(json["mod_name"], "mod");
    }
}
