use crate::error::{Error, Result};
use crate::types::ArchiveEntry;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::shared::sanitize_entry_path;

/// Archive inspector for RAR files
pub struct RarInspector;

impl RarInspector {
    fn unsupported(path: &Path, e: unrar::error::UnrarError) -> Error {
        Error::UnsupportedArchive {
            path: path.to_path_buf(),
            reason: format!("failed to read RAR archive: {}", e),
        }
    }

    /// List all entries of a RAR archive
    pub fn entries(path: &Path) -> Result<Vec<ArchiveEntry>> {
        let listing = unrar::Archive::new(path)
            .open_for_listing()
            .map_err(|e| Self::unsupported(path, e))?;

        let mut rows = Vec::new();
        for header in listing {
            let header = header.map_err(|e| Self::unsupported(path, e))?;
            rows.push(ArchiveEntry {
                relative_name: header.filename.clone(),
                size: header.unpacked_size as u64,
                is_directory: header.is_directory(),
            });
        }

        debug!(?path, entries = rows.len(), "listed RAR archive");
        Ok(rows)
    }

    /// Extract entries matching `predicate` into `dest_dir`
    ///
    /// Entry data is read through the unrar cursor state machine and written
    /// by this crate, so one entry's write failure is logged and skipped
    /// without losing the archive cursor.
    pub fn extract_matching(
        path: &Path,
        dest_dir: &Path,
        predicate: &dyn Fn(&ArchiveEntry) -> bool,
    ) -> Result<Vec<PathBuf>> {
        let processor = unrar::Archive::new(path)
            .open_for_processing()
            .map_err(|e| Self::unsupported(path, e))?;
        std::fs::create_dir_all(dest_dir).map_err(Error::Io)?;

        let mut extracted = Vec::new();
        let mut at_header = processor;
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::unsupported(path, e)),
            };

            let header = at_file.entry();
            let row = ArchiveEntry {
                relative_name: header.filename.clone(),
                size: header.unpacked_size as u64,
                is_directory: header.is_directory(),
            };

            let sanitized = sanitize_entry_path(&row.relative_name);
            let wanted = !row.is_directory && predicate(&row) && !sanitized.as_os_str().is_empty();

            if !wanted {
                at_header = at_file.skip().map_err(|e| Error::Extraction {
                    archive: path.to_path_buf(),
                    reason: format!("failed to skip RAR entry: {}", e),
                })?;
                continue;
            }

            // read() keeps the cursor alive across our own write failures
            let (data, next) = at_file.read().map_err(|e| Error::Extraction {
                archive: path.to_path_buf(),
                reason: format!("failed to read RAR entry: {}", e),
            })?;
            at_header = next;

            let target = dest_dir.join(sanitized);
            if let Err(e) = Self::write_entry(&data, &target) {
                warn!(
                    ?path,
                    entry = %row.relative_name.display(),
                    error = %e,
                    "failed to extract RAR entry, skipping"
                );
                continue;
            }
            extracted.push(target);
        }

        debug!(?path, extracted_count = extracted.len(), "RAR extraction finished");
        Ok(extracted)
    }

    fn write_entry(data: &[u8], target: &Path) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, data)
    }
}
