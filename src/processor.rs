//! Per-file processing
//!
//! Once the queue decides a file is ready, the processor classifies it by
//! extension, relocates or organizes it per policy, extracts relevant archive
//! entries, and emits the domain events downstream consumers subscribe to.
//!
//! Relocation policy: with `relocate` set, files move into a per-mod
//! subfolder under the central mod directory; otherwise a same-named
//! subfolder is created beside the original.

use crate::config::{ProcessingConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::inspection::ArchiveInspector;
use crate::storage::FileStorage;
use crate::types::{Event, FileKind, Outcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Classifies ready files and turns them into installable artifacts
pub struct FileProcessor {
    config: ProcessingConfig,
    delete_retry: RetryConfig,
    inspector: ArchiveInspector,
    storage: Arc<dyn FileStorage>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for FileProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FileProcessor {
    /// Create a processor
    ///
    /// `cancel` is the queue's shared shutdown signal, checked before
    /// long-running extraction starts.
    pub fn new(
        config: ProcessingConfig,
        delete_retry: RetryConfig,
        storage: Arc<dyn FileStorage>,
        event_tx: broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        let inspector = ArchiveInspector::new(config.mod_extensions.clone());
        Self {
            config,
            delete_retry,
            inspector,
            storage,
            event_tx,
            cancel,
        }
    }

    /// Classify a path by its extension
    pub fn classify(&self, path: &Path) -> FileKind {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return FileKind::Unsupported;
        };

        if self.config.mod_extensions.iter().any(|m| m.eq_ignore_ascii_case(ext)) {
            FileKind::ModFile
        } else if self
            .config
            .archive_extensions
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ext))
        {
            FileKind::Archive
        } else {
            FileKind::Unsupported
        }
    }

    /// Process one ready file
    ///
    /// Emits at most one event. Transient I/O errors bubble up so the queue
    /// keeps the file tracked; everything else resolves the file one way or
    /// another.
    pub async fn process(&self, path: &Path) -> Result<Outcome> {
        match self.classify(path) {
            FileKind::ModFile => self.process_mod_file(path).await,
            FileKind::Archive => self.process_archive(path).await,
            FileKind::Unsupported => {
                info!(path = %path.display(), "unsupported file type, dropping");
                Ok(Outcome::Unsupported)
            }
        }
    }

    /// Relocate a standalone mod file and announce it
    async fn process_mod_file(&self, path: &Path) -> Result<Outcome> {
        let file_name = file_name_of(path)?;
        let mod_name = stem_of(path)?;
        let dest_dir = self.destination_dir(path)?;

        self.storage.create_dir_all(&dest_dir).await?;
        let destination = dest_dir.join(&file_name);
        self.storage.copy(path, &destination).await?;

        info!(
            source = %path.display(),
            destination = %destination.display(),
            "mod file relocated"
        );
        self.emit(Event::FileMoved {
            file_name,
            destination: destination.clone(),
            mod_name,
        });

        // The destination copy is complete and announced; a stuck source
        // delete is surfaced but must not retract the event
        if let Err(e) = self.storage.delete_with_retry(path, &self.delete_retry).await {
            error!(path = %path.display(), error = %e, "could not remove moved mod file");
            return Err(e);
        }

        Ok(Outcome::Moved(destination))
    }

    /// Inspect an archive, relocate and extract it if anything qualifies
    async fn process_archive(&self, path: &Path) -> Result<Outcome> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let skip_pre_release = self.config.skip_pre_release;

        let relevant = {
            let inspector = self.inspector.clone();
            let archive = path.to_path_buf();
            spawn_blocking(move || inspector.contains_relevant_entry(&archive, skip_pre_release))
                .await
                .map_err(|e| Error::Extraction {
                    archive: path.to_path_buf(),
                    reason: format!("inspection task panicked: {}", e),
                })?
        };

        let relevant = match relevant {
            Ok(relevant) => relevant,
            Err(Error::UnsupportedArchive { path: archive, reason }) => {
                warn!(
                    archive = %archive.display(),
                    reason = %reason,
                    "archive did not open as a valid container"
                );
                if self.config.auto_delete {
                    self.storage.delete_with_retry(path, &self.delete_retry).await?;
                    info!(archive = %archive.display(), "deleted invalid archive");
                }
                return Ok(Outcome::Invalid);
            }
            Err(e) => return Err(e),
        };

        if !relevant {
            // Left untouched so the user can handle it manually
            info!(
                archive = %path.display(),
                "archive contains no relevant entries, leaving it in place"
            );
            return Ok(Outcome::Ignored);
        }

        let archive_name = file_name_of(path)?;
        let dest_dir = self.destination_dir(path)?;

        self.storage.create_dir_all(&dest_dir).await?;
        let relocated = dest_dir.join(&archive_name);
        self.storage.copy(path, &relocated).await?;
        self.storage.delete_with_retry(path, &self.delete_retry).await?;
        debug!(
            source = %path.display(),
            destination = %relocated.display(),
            "archive relocated"
        );

        let extracted_paths = {
            let inspector = self.inspector.clone();
            let archive = relocated.clone();
            let dest = dest_dir.clone();
            spawn_blocking(move || inspector.extract_relevant(&archive, &dest, skip_pre_release))
                .await
                .map_err(|e| Error::Extraction {
                    archive: relocated.clone(),
                    reason: format!("extraction task panicked: {}", e),
                })??
        };

        info!(
            archive = %relocated.display(),
            extracted_count = extracted_paths.len(),
            "archive entries extracted"
        );
        self.emit(Event::FilesExtracted {
            archive_name,
            extracted_paths: extracted_paths.clone(),
        });

        if self.config.auto_delete {
            if let Err(e) = self.storage.delete_with_retry(&relocated, &self.delete_retry).await {
                // Extraction already succeeded and was announced
                error!(archive = %relocated.display(), error = %e, "could not delete extracted archive");
                return Err(e);
            }
            debug!(archive = %relocated.display(), "deleted archive after extraction");
        }

        Ok(Outcome::Extracted(extracted_paths))
    }

    /// Directory a processed file ends up in
    ///
    /// `<mod_dir>/<stem>/` when relocating, `<parent>/<stem>/` when
    /// organizing in place.
    fn destination_dir(&self, path: &Path) -> Result<PathBuf> {
        let stem = stem_of(path)?;

        let base = if self.config.relocate {
            self.config.mod_dir.clone()
        } else {
            path.parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::MoveFailed {
                    source_path: path.to_path_buf(),
                    dest_path: PathBuf::new(),
                    reason: "file has no parent directory".to_string(),
                })?
        };

        Ok(base.join(stem))
    }

    /// Emit an event to all subscribers
    ///
    /// With no active subscribers the event is dropped; artifacts stay on
    /// disk, so a late subscriber can still discover them.
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::MoveFailed {
            source_path: path.to_path_buf(),
            dest_path: PathBuf::new(),
            reason: "file has no usable name".to_string(),
        })
}

fn stem_of(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::MoveFailed {
            source_path: path.to_path_buf(),
            dest_path: PathBuf::new(),
            reason: "file has no usable name".to_string(),
        })
}
