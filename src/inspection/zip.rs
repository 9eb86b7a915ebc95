use crate::error::{Error, Result};
use crate::types::ArchiveEntry;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::shared::sanitize_entry_path;

/// Archive inspector for ZIP files
pub struct ZipInspector;

impl ZipInspector {
    fn open(path: &Path) -> Result<zip::ZipArchive<std::fs::File>> {
        let file = std::fs::File::open(path).map_err(Error::Io)?;
        zip::ZipArchive::new(file).map_err(|e| Error::UnsupportedArchive {
            path: path.to_path_buf(),
            reason: format!("failed to read ZIP archive: {}", e),
        })
    }

    /// List all entries of a ZIP archive
    pub fn entries(path: &Path) -> Result<Vec<ArchiveEntry>> {
        let mut archive = Self::open(path)?;

        let mut rows = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| Error::UnsupportedArchive {
                path: path.to_path_buf(),
                reason: format!("failed to read ZIP entry: {}", e),
            })?;

            rows.push(ArchiveEntry {
                relative_name: PathBuf::from(entry.name()),
                size: entry.size(),
                is_directory: entry.is_dir(),
            });
        }

        debug!(?path, entries = rows.len(), "listed ZIP archive");
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
        let mut archive = Self::open(path)?;
        std::fs::create_dir_all(dest_dir).map_err(Error::Io)?;

        let mut extracted = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| Error::UnsupportedArchive {
                path: path.to_path_buf(),
                reason: format!("failed to read ZIP entry: {}", e),
            })?;

            if entry.is_dir() {
                continue;
            }

            let row = ArchiveEntry {
                relative_name: PathBuf::from(entry.name()),
                size: entry.size(),
                is_directory: false,
            };
            if !predicate(&row) {
                continue;
            }

            let relative = match entry.enclosed_name() {
                Some(name) => name.to_path_buf(),
                None => {
                    let sanitized = sanitize_entry_path(&row.relative_name);
                    if sanitized.as_os_str().is_empty() {
                        warn!(?path, entry = %row.relative_name.display(), "skipping entry with unsafe path");
                        continue;
                    }
                    sanitized
                }
            };

            let target = dest_dir.join(relative);
            if let Err(e) = Self::write_entry(&mut entry, &target) {
                warn!(
                    ?path,
                    entry = %row.relative_name.display(),
                    error = %e,
                    "failed to extract ZIP entry, skipping"
                );
                continue;
            }
            extracted.push(target);
        }

        debug!(?path, extracted_count = extracted.len(), "ZIP extraction finished");
        Ok(extracted)
    }

    fn write_entry(entry: &mut zip::read::ZipFile, target: &Path) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = std::fs::File::create(target)?;
        std::io::copy(entry, &mut outfile)?;
        Ok(())
    }
}
