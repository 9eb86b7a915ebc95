use crate::error::{Error, Result};
use crate::types::ArchiveEntry;
use sevenz_rust::Password;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::shared::sanitize_entry_path;

/// Archive inspector for 7z files
pub struct SevenZipInspector;

impl SevenZipInspector {
    fn open(path: &Path) -> Result<sevenz_rust::SevenZReader<std::fs::File>> {
        sevenz_rust::SevenZReader::open(path, Password::empty()).map_err(|e| {
            Error::UnsupportedArchive {
                path: path.to_path_buf(),
                reason: format!("failed to read 7z archive: {}", e),
            }
        })
    }

    /// List all entries of a 7z archive
    pub fn entries(path: &Path) -> Result<Vec<ArchiveEntry>> {
        let reader = Self::open(path)?;

        let rows: Vec<ArchiveEntry> = reader
            .archive()
            .files
            .iter()
            .map(|entry| ArchiveEntry {
                relative_name: PathBuf::from(entry.name()),
                size: entry.size(),
                is_directory: entry.is_directory(),
            })
            .collect();

        debug!(?path, entries = rows.len(), "listed 7z archive");
        Ok(rows)
    }

    /// Extract entries matching `predicate` into `dest_dir`
    ///
    /// Relative subpaths are preserved and parent directories created as
    /// needed. A single entry's write failure is logged and that entry
    /// omitted; remaining entries still extract.
    pub fn extract_matching(
        path: &Path,
        dest_dir: &Path,
        predicate: &dyn Fn(&ArchiveEntry) -> bool,
    ) -> Result<Vec<PathBuf>> {
        let mut reader = Self::open(path)?;
        std::fs::create_dir_all(dest_dir).map_err(Error::Io)?;

        let mut extracted = Vec::new();
        reader
            .for_each_entries(|entry, entry_reader| {
                if entry.is_directory() {
                    return Ok(true);
                }

                let row = ArchiveEntry {
                    relative_name: PathBuf::from(entry.name()),
                    size: entry.size(),
                    is_directory: false,
                };
                if !predicate(&row) {
                    return Ok(true);
                }

                let sanitized = sanitize_entry_path(&row.relative_name);
                if sanitized.as_os_str().is_empty() {
                    warn!(?path, entry = %row.relative_name.display(), "skipping entry with unsafe path");
                    return Ok(true);
                }

                let target = dest_dir.join(sanitized);
                if let Some(parent) = target.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        warn!(
                            ?path,
                            entry = %row.relative_name.display(),
                            error = %e,
                            "failed to create directories for 7z entry, skipping"
                        );
                        return Ok(true);
                    }
                }

                match sevenz_rust::default_entry_extract_fn(entry, entry_reader, &target) {
                    Ok(_) => extracted.push(target),
                    Err(e) => {
                        warn!(
                            ?path,
                            entry = %row.relative_name.display(),
                            error = %e,
                            "failed to extract 7z entry, skipping"
                        );
                    }
                }
                Ok(true)
            })
            .map_err(|e| Error::Extraction {
                archive: path.to_path_buf(),
                reason: format!("failed to walk 7z entries: {}", e),
            })?;

        debug!(?path, extracted_count = extracted.len(), "7z extraction finished");
        Ok(extracted)
    }
}
