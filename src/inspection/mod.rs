//! Archive inspection and filtered extraction
//!
//! This module answers three questions about a downloaded archive: what is
//! inside it, does any of it matter (mod files, optionally excluding
//! pre-release marker folders), and - if so - extract exactly the matching
//! entries. ZIP, 7z and RAR containers are supported, detected by extension.
//!
//! All functions here are synchronous and blocking; callers hop through
//! `spawn_blocking` (the processor does this).

mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use rar::RarInspector;
pub use sevenz::SevenZipInspector;
pub use shared::{
    ArchiveKind, detect_archive_kind, has_mod_extension, has_pre_release_component,
    is_pre_release_segment, sanitize_entry_path,
};
pub use zip::ZipInspector;

use crate::error::{Error, Result};
use crate::types::ArchiveEntry;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opens archives, filters their entries, extracts the matching ones
///
/// Holds the mod-file extension list so relevance decisions are consistent
/// across enumeration and extraction.
#[derive(Clone, Debug)]
pub struct ArchiveInspector {
    mod_extensions: Vec<String>,
}

impl ArchiveInspector {
    /// Create an inspector recognizing the given mod-file extensions
    pub fn new(mod_extensions: Vec<String>) -> Self {
        Self { mod_extensions }
    }

    /// List all entries of an archive
    ///
    /// # Errors
    /// [`Error::UnsupportedArchive`] for unrecognized extensions and for
    /// files that fail to open as the container their extension claims.
    pub fn entries(&self, path: &Path) -> Result<Vec<ArchiveEntry>> {
        let kind = detect_archive_kind(path).ok_or_else(|| Error::UnsupportedArchive {
            path: path.to_path_buf(),
            reason: "unrecognized archive extension".to_string(),
        })?;

        debug!(?path, ?kind, "listing archive");
        match kind {
            ArchiveKind::Zip => ZipInspector::entries(path),
            ArchiveKind::SevenZip => SevenZipInspector::entries(path),
            ArchiveKind::Rar => RarInspector::entries(path),
        }
    }

    /// Whether an entry qualifies for extraction under the pre-release policy
    pub fn is_relevant(&self, entry: &ArchiveEntry, skip_pre_release: bool) -> bool {
        if entry.is_directory || !has_mod_extension(entry, &self.mod_extensions) {
            return false;
        }
        if skip_pre_release && has_pre_release_component(&entry.relative_name) {
            return false;
        }
        true
    }

    /// Whether the archive holds at least one relevant entry
    pub fn contains_relevant_entry(&self, path: &Path, skip_pre_release: bool) -> Result<bool> {
        let entries = self.entries(path)?;
        Ok(entries.iter().any(|e| self.is_relevant(e, skip_pre_release)))
    }

    /// Extract all entries matching `predicate` into `dest_dir`
    ///
    /// Relative subpaths are preserved. A single entry's write failure is
    /// logged and that entry omitted; it does not abort extraction of the
    /// remaining entries.
    pub fn extract_matching(
        &self,
        path: &Path,
        dest_dir: &Path,
        predicate: &dyn Fn(&ArchiveEntry) -> bool,
    ) -> Result<Vec<PathBuf>> {
        let kind = detect_archive_kind(path).ok_or_else(|| Error::UnsupportedArchive {
            path: path.to_path_buf(),
            reason: "unrecognized archive extension".to_string(),
        })?;

        debug!(?path, ?kind, ?dest_dir, "extracting matching entries");
        match kind {
            ArchiveKind::Zip => ZipInspector::extract_matching(path, dest_dir, predicate),
            ArchiveKind::SevenZip => SevenZipInspector::extract_matching(path, dest_dir, predicate),
            ArchiveKind::Rar => RarInspector::extract_matching(path, dest_dir, predicate),
        }
    }

    /// Extract every relevant entry under the pre-release policy
    pub fn extract_relevant(
        &self,
        path: &Path,
        dest_dir: &Path,
        skip_pre_release: bool,
    ) -> Result<Vec<PathBuf>> {
        self.extract_matching(path, dest_dir, &|entry| {
            self.is_relevant(entry, skip_pre_release)
        })
    }
}
