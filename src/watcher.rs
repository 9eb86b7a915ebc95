//! Directory watching
//!
//! One native watch per configured download directory, filtered to the
//! extensions the processor understands. Raw create/rename notifications are
//! bridged onto an unbounded channel; the ingestion loop is the only
//! consumer, so watch callbacks never touch disk or shared queue state.

use crate::error::{Error, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Raw notification forwarded from a watched directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file with an allowed extension appeared (created or moved in)
    Created(PathBuf),
    /// A file was renamed within a watched directory
    Renamed {
        /// Previous path
        from: PathBuf,
        /// New path
        to: PathBuf,
    },
}

/// Native watches over the configured download directories
///
/// Watches are non-recursive and fixed for the lifetime of the set; the owner
/// builds a new set when the configured directory list changes.
pub struct DirectoryWatchSet {
    // Held for its Drop: dropping the watcher releases the native handles
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl std::fmt::Debug for DirectoryWatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatchSet")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl DirectoryWatchSet {
    /// Watch `directories`, forwarding filtered events into `tx`
    ///
    /// A directory missing at setup is skipped with a warning and the rest
    /// are still watched.
    ///
    /// # Errors
    /// Returns an error only if the native watcher itself cannot be created.
    pub fn new(
        directories: &[PathBuf],
        allowed_extensions: Vec<String>,
        tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for forward in translate_event(event, &allowed_extensions) {
                        if tx.send(forward).is_err() {
                            debug!("watch event receiver dropped");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "filesystem watcher error");
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::Watch(e.to_string()))?;

        let mut watched = Vec::new();
        for dir in directories {
            if !dir.is_dir() {
                warn!(directory = %dir.display(), "watch directory missing, skipping");
                continue;
            }

            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    info!(directory = %dir.display(), "watching directory");
                    watched.push(dir.clone());
                }
                Err(e) => {
                    warn!(
                        directory = %dir.display(),
                        error = %e,
                        "could not watch directory, skipping"
                    );
                }
            }
        }

        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }

    /// Directories successfully watched
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Release all native watch handles
    pub fn stop(self) {
        drop(self);
        debug!("directory watches disposed");
    }
}

/// Map a raw notify event onto the forwarded shapes
///
/// Creations and moves-into-watch become [`WatchEvent::Created`]; completed
/// renames become [`WatchEvent::Renamed`]. Removals and content modifications
/// are ignored - disappearance is detected by the poll loop and in-progress
/// writes are handled by the readiness check.
fn translate_event(event: Event, allowed_extensions: &[String]) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .into_iter()
            .filter(|p| has_allowed_extension(p, allowed_extensions))
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) if has_allowed_extension(&to, allowed_extensions) => {
                    vec![WatchEvent::Renamed { from, to }]
                }
                _ => vec![],
            }
        }
        _ => vec![],
    }
}

/// Whether the path's extension is on the allow-list (case-insensitive)
pub(crate) fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
