//! Pending-queue persistence
//!
//! One JSON file mapping absolute paths to first-seen timestamps. The store
//! is deliberately forgiving on load: a missing file is an empty queue and a
//! corrupt file is logged and discarded - state problems must never stop the
//! host from starting.

use crate::error::{Error, Result};
use crate::storage::FileStorage;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persists the pending-file queue across restarts
#[derive(Clone)]
pub struct QueueStateStore {
    path: PathBuf,
    storage: Arc<dyn FileStorage>,
}

impl std::fmt::Debug for QueueStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStateStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl QueueStateStore {
    /// Create a store backed by `path`
    pub fn new(path: PathBuf, storage: Arc<dyn FileStorage>) -> Self {
        Self { path, storage }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted mapping of tracked paths to first-seen timestamps
    ///
    /// A missing file loads as empty. A corrupt file logs a warning and loads
    /// as empty - it never fails startup.
    pub async fn load(&self) -> HashMap<PathBuf, DateTime<Utc>> {
        if !self.storage.exists(&self.path).await {
            debug!(path = %self.path.display(), "no persisted queue state");
            return HashMap::new();
        }

        let content = match self.storage.read_text(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "could not read queue state, starting empty"
                );
                return HashMap::new();
            }
        };

        match serde_json::from_str::<BTreeMap<PathBuf, DateTime<Utc>>>(&content) {
            Ok(map) => {
                debug!(
                    path = %self.path.display(),
                    entries = map.len(),
                    "loaded persisted queue state"
                );
                map.into_iter().collect()
            }
            Err(e) => {
                let corruption = Error::StateCorruption {
                    path: self.path.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %corruption, "discarding corrupt queue state");
                HashMap::new()
            }
        }
    }

    /// Persist the mapping, replacing the previous file
    ///
    /// Keys are written in sorted order so consecutive saves of the same
    /// queue produce identical files.
    pub async fn save(&self, entries: &HashMap<PathBuf, DateTime<Utc>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                self.storage.create_dir_all(parent).await?;
            }
        }

        let ordered: BTreeMap<&PathBuf, &DateTime<Utc>> = entries.iter().collect();
        let content = serde_json::to_string_pretty(&ordered)?;
        self.storage.write_text(&self.path, &content).await?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "persisted queue state"
        );
        Ok(())
    }
}
