//! Download-completion detection
//!
//! Deciding that a file has finished downloading without knowing which tool
//! produced it. The heuristic is deliberately tool-agnostic:
//! 1. Sibling partial-download markers (`<name>…*.part`) mean a download
//!    manager still owns the file.
//! 2. The size must be nonzero and stable across a short sampling window.
//! 3. An exclusive open must succeed - a writer still holding the file fails
//!    this probe.
//!
//! The common case (file fully written, nothing else in the directory) passes
//! in `size_samples - 1` sample intervals; a file still growing bails out on
//! the first changed sample.

use crate::config::ReadinessConfig;
use std::path::Path;
use tracing::{debug, trace};

/// Decides whether a path is a complete, unlocked file
#[derive(Clone, Debug)]
pub struct ReadinessDetector {
    config: ReadinessConfig,
}

impl ReadinessDetector {
    /// Create a detector with the given sampling parameters
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Whether `path` looks like a finished, unlocked download
    ///
    /// Never fails: any probe error (file vanished mid-check, permission
    /// problem) reads as "not ready" and the caller retries on a later tick.
    pub async fn is_ready(&self, path: &Path) -> bool {
        if Self::has_partial_marker(path) {
            trace!(path = %path.display(), "partial-download marker present");
            return false;
        }

        if !self.size_is_stable(path).await {
            return false;
        }

        if !Self::can_open_exclusively(path) {
            debug!(path = %path.display(), "file is still locked by another process");
            return false;
        }

        true
    }

    /// Check for sibling `<filename>…*.part` markers
    ///
    /// Browsers and download managers keep the payload in `name.ext.part` (or
    /// `name.ext.<random>.part`) beside the final name until completion.
    fn has_partial_marker(path: &Path) -> bool {
        let (Some(parent), Some(file_name)) =
            (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return false;
        };

        let Ok(entries) = std::fs::read_dir(parent) else {
            return false;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name != file_name && name.starts_with(file_name) && name.ends_with(".part") {
                return true;
            }
        }
        false
    }

    /// Sample the file size and require it stable and nonzero
    async fn size_is_stable(&self, path: &Path) -> bool {
        let mut previous: Option<u64> = None;

        for sample in 0..self.config.size_samples {
            let size = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    trace!(path = %path.display(), error = %e, "size sample failed");
                    return false;
                }
            };

            if size == 0 {
                trace!(path = %path.display(), "file is empty");
                return false;
            }

            if let Some(prev) = previous {
                if prev != size {
                    debug!(
                        path = %path.display(),
                        previous = prev,
                        current = size,
                        "file size still changing"
                    );
                    return false;
                }
            }
            previous = Some(size);

            // No delay needed after the final sample
            if sample + 1 < self.config.size_samples {
                tokio::time::sleep(self.config.sample_interval).await;
            }
        }

        true
    }

    /// Attempt an exclusive open (no shared read/write)
    fn can_open_exclusively(path: &Path) -> bool {
        match std::fs::OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file.try_lock().is_ok(),
            Err(_) => false,
        }
    }
}
