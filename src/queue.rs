//! Tracked-path queue and background poll loop
//!
//! [`IngestionQueue`] owns the per-file state machine
//! (`Discovered → Retrying → Ready → Processed`, `Removed` whenever the path
//! disappears), the background loop that drives it, and the persisted state
//! that lets it survive restarts.
//!
//! One task owns the loop; each tick walks a snapshot of the tracked set
//! sequentially, so a slow archive delays the rest of that tick's batch but
//! never its correctness - unprocessed entries are simply revisited next
//! tick. Watch callbacks only push onto a channel consumed by the same task,
//! which keeps the race surface to the channel itself.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::processor::FileProcessor;
use crate::readiness::ReadinessDetector;
use crate::retry::IsRetryable;
use crate::state_store::QueueStateStore;
use crate::storage::{DiskStorage, FileStorage};
use crate::types::{Event, Outcome, PendingFile};
use crate::watcher::{DirectoryWatchSet, WatchEvent};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Retry counts up to this still log at debug with full detail
const DETAILED_RETRY_LOGS: u32 = 5;

/// After the detailed window, warn roughly once this many retries
/// (120 ticks at the default 500ms poll interval is about a minute)
const RETRY_WARN_EVERY: u32 = 120;

/// Watches download directories and turns finished downloads into artifacts
///
/// Cheap to clone; all state is shared behind `Arc`.
#[derive(Clone)]
pub struct IngestionQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    storage: Arc<dyn FileStorage>,
    processor: FileProcessor,
    readiness: ReadinessDetector,
    store: QueueStateStore,
    /// Tracked files by absolute path; the loop is the single logical owner
    /// of mutation, watch events reach it through the channel
    tracked: Mutex<HashMap<PathBuf, PendingFile>>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    watch_tx: mpsc::UnboundedSender<WatchEvent>,
    watch_rx: Mutex<Option<mpsc::UnboundedReceiver<WatchEvent>>>,
    watches: std::sync::Mutex<Option<DirectoryWatchSet>>,
    loop_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for IngestionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionQueue")
            .field("state_file", &self.inner.store.path())
            .finish_non_exhaustive()
    }
}

impl IngestionQueue {
    /// Create a queue backed by the local filesystem
    ///
    /// Loads the persisted pending queue, drops entries whose path no longer
    /// exists, and resumes the rest with their retry counters reset. The
    /// background loop does not run until [`Self::start`].
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_storage(config, Arc::new(DiskStorage)).await
    }

    /// Create a queue on a custom [`FileStorage`] implementation
    pub async fn with_storage(config: Config, storage: Arc<dyn FileStorage>) -> Result<Self> {
        let store = QueueStateStore::new(config.persistence.state_file.clone(), storage.clone());

        // Resume persisted entries whose file still exists
        let persisted = store.load().await;
        let mut tracked = HashMap::new();
        let mut dropped = 0usize;
        for (path, first_seen) in persisted {
            if storage.exists(&path).await {
                tracked.insert(path.clone(), PendingFile::resumed(path, first_seen));
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 || !tracked.is_empty() {
            info!(
                resumed = tracked.len(),
                dropped, "restored persisted queue state"
            );
        }

        let (event_tx, _) = broadcast::channel(1000);
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let processor = FileProcessor::new(
            config.processing.clone(),
            config.delete_retry.clone(),
            storage.clone(),
            event_tx.clone(),
            cancel.clone(),
        );
        let readiness = ReadinessDetector::new(config.readiness.clone());

        let queue = Self {
            inner: Arc::new(Inner {
                config,
                storage,
                processor,
                readiness,
                store,
                tracked: Mutex::new(tracked),
                event_tx,
                cancel,
                watch_tx,
                watch_rx: Mutex::new(Some(watch_rx)),
                watches: std::sync::Mutex::new(None),
                loop_task: Mutex::new(None),
            }),
        };

        // Persist the pruned set so dead paths do not reappear on a crash
        queue.inner.persist().await;

        Ok(queue)
    }

    /// Subscribe to [`Event`] broadcasts
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls more than 1000 events behind
    /// starts losing the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.event_tx.subscribe()
    }

    /// Start watching and spawn the background loop
    ///
    /// Calling `start` twice is a warning no-op.
    pub async fn start(&self) -> Result<()> {
        let Some(watch_rx) = self.inner.watch_rx.lock().await.take() else {
            warn!("ingestion queue already started");
            return Ok(());
        };

        let watches = DirectoryWatchSet::new(
            &self.inner.config.watch.directories,
            self.inner.config.processing.allowed_extensions(),
            self.inner.watch_tx.clone(),
        )?;
        if let Ok(mut slot) = self.inner.watches.lock() {
            *slot = Some(watches);
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            inner.run_loop(watch_rx).await;
        });
        *self.inner.loop_task.lock().await = Some(handle);

        info!(
            directories = self.inner.config.watch.directories.len(),
            "ingestion queue started"
        );
        Ok(())
    }

    /// Rebuild the watch set for a changed directory list
    ///
    /// The host calls this from its configuration-change notification. The
    /// tracked set is untouched: files from no-longer-watched directories
    /// finish processing or drop out when their path disappears.
    pub fn rewatch(&self, directories: &[PathBuf]) -> Result<()> {
        let watches = DirectoryWatchSet::new(
            directories,
            self.inner.config.processing.allowed_extensions(),
            self.inner.watch_tx.clone(),
        )?;

        let previous = match self.inner.watches.lock() {
            Ok(mut slot) => slot.replace(watches),
            Err(_) => return Err(Error::Watch("watch set lock poisoned".to_string())),
        };
        if let Some(previous) = previous {
            previous.stop();
        }

        info!(directories = directories.len(), "watch set rebuilt");
        Ok(())
    }

    /// Snapshot of the currently tracked files
    pub async fn pending(&self) -> Vec<PendingFile> {
        let tracked = self.inner.tracked.lock().await;
        let mut pending: Vec<PendingFile> = tracked.values().cloned().collect();
        pending.sort_by(|a, b| a.path.cmp(&b.path));
        pending
    }

    /// Stop the loop, flush state, dispose all watches
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down ingestion queue");
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.loop_task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "ingestion loop did not stop cleanly");
            }
        }

        // Final flush after the loop has stopped mutating
        self.inner.persist().await;

        let watches = match self.inner.watches.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(watches) = watches {
            watches.stop();
        }

        info!("ingestion queue stopped");
        Ok(())
    }
}

impl Inner {
    /// The background loop: watch events, poll ticks, autosave ticks
    async fn run_loop(self: Arc<Self>, mut watch_rx: mpsc::UnboundedReceiver<WatchEvent>) {
        let mut poll = tokio::time::interval(self.config.queue.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut autosave = tokio::time::interval(self.config.queue.autosave_interval);
        autosave.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("ingestion loop running");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(event) = watch_rx.recv() => self.handle_watch_event(event).await,
                _ = poll.tick() => self.process_tick().await,
                _ = autosave.tick() => self.persist().await,
            }
        }
        info!("ingestion loop stopped");
    }

    /// Track new arrivals and re-key renames
    async fn handle_watch_event(&self, event: WatchEvent) {
        match event {
            WatchEvent::Created(path) => {
                let mut tracked = self.tracked.lock().await;
                if tracked.contains_key(&path) {
                    // Duplicate watch events must not re-enqueue
                    trace!(path = %path.display(), "already tracked, ignoring watch event");
                    return;
                }
                info!(path = %path.display(), "tracking new file");
                tracked.insert(path.clone(), PendingFile::discovered(path));
                drop(tracked);
                self.persist().await;
            }
            WatchEvent::Renamed { from, to } => {
                let mut tracked = self.tracked.lock().await;
                match tracked.remove(&from) {
                    Some(entry) => {
                        debug!(
                            from = %from.display(),
                            to = %to.display(),
                            "re-keying renamed file"
                        );
                        // The rename usually marks the download completing,
                        // so the counter restarts its detailed-log window
                        tracked.insert(to.clone(), PendingFile::resumed(to, entry.first_seen));
                    }
                    None => {
                        if tracked.contains_key(&to) {
                            return;
                        }
                        info!(path = %to.display(), "tracking renamed-in file");
                        tracked.insert(to.clone(), PendingFile::discovered(to));
                    }
                }
                drop(tracked);
                self.persist().await;
            }
        }
    }

    /// One pass over the tracked snapshot
    async fn process_tick(&self) {
        let snapshot = {
            let tracked = self.tracked.lock().await;
            let mut entries: Vec<PendingFile> = tracked.values().cloned().collect();
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            entries
        };
        if snapshot.is_empty() {
            return;
        }

        let mut mutated = false;
        for pending in snapshot {
            if self.cancel.is_cancelled() {
                break;
            }

            if !self.storage.exists(&pending.path).await {
                info!(path = %pending.path.display(), "tracked file disappeared, dropping");
                self.tracked.lock().await.remove(&pending.path);
                mutated = true;
                continue;
            }

            if self.readiness.is_ready(&pending.path).await {
                // Ready: the counter served its purpose
                if let Some(entry) = self.tracked.lock().await.get_mut(&pending.path) {
                    entry.retry_count = 0;
                }
                if self.process_ready(&pending).await {
                    mutated = true;
                }
            } else {
                self.note_not_ready(&pending).await;
            }
        }

        if mutated {
            self.persist().await;
        }
    }

    /// Hand a ready file to the processor; returns whether the set changed
    async fn process_ready(&self, pending: &PendingFile) -> bool {
        info!(path = %pending.path.display(), "file ready, processing");

        match self.processor.process(&pending.path).await {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Moved(dest) => {
                        debug!(path = %pending.path.display(), destination = %dest.display(), "processed")
                    }
                    Outcome::Extracted(paths) => {
                        debug!(path = %pending.path.display(), extracted = paths.len(), "processed")
                    }
                    Outcome::Ignored | Outcome::Invalid | Outcome::Unsupported => {
                        debug!(path = %pending.path.display(), ?outcome, "resolved without artifacts")
                    }
                }
                self.tracked.lock().await.remove(&pending.path);
                true
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    path = %pending.path.display(),
                    error = %e,
                    "transient processing failure, will retry"
                );
                false
            }
            Err(e) => {
                error!(
                    path = %pending.path.display(),
                    error = %e,
                    attempts = pending.retry_count,
                    "processing failed permanently, dropping"
                );
                self.tracked.lock().await.remove(&pending.path);
                true
            }
        }
    }

    /// Bump the retry counter with decaying log verbosity
    ///
    /// There is deliberately no retry ceiling: a file is retried for as long
    /// as it exists, which accommodates arbitrarily slow transfers.
    async fn note_not_ready(&self, pending: &PendingFile) {
        let count = {
            let mut tracked = self.tracked.lock().await;
            match tracked.get_mut(&pending.path) {
                Some(entry) => {
                    entry.retry_count = entry.retry_count.saturating_add(1);
                    entry.retry_count
                }
                None => return,
            }
        };

        if count <= DETAILED_RETRY_LOGS {
            debug!(
                path = %pending.path.display(),
                attempt = count,
                first_seen = %pending.first_seen,
                "file not ready yet"
            );
        } else if count % RETRY_WARN_EVERY == 0 {
            warn!(
                path = %pending.path.display(),
                attempts = count,
                first_seen = %pending.first_seen,
                "file still not ready"
            );
        } else {
            trace!(path = %pending.path.display(), attempt = count, "file not ready yet");
        }
    }

    /// Best-effort persist of the tracked set
    async fn persist(&self) {
        let timestamps: HashMap<PathBuf, DateTime<Utc>> = {
            let tracked = self.tracked.lock().await;
            tracked
                .iter()
                .map(|(path, entry)| (path.clone(), entry.first_seen))
                .collect()
        };

        if let Err(e) = self.store.save(&timestamps).await {
            warn!(error = %e, "could not persist queue state");
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.watch.directories = vec![temp.path().join("downloads")];
        config.processing.mod_dir = temp.path().join("mods");
        config.persistence.state_file = temp.path().join("pending-files.json");
        config.queue.poll_interval = Duration::from_millis(50);
        config.queue.autosave_interval = Duration::from_secs(60);
        config.readiness.size_samples = 2;
        config.readiness.sample_interval = Duration::from_millis(10);
        config.delete_retry.initial_delay = Duration::from_millis(5);
        config.delete_retry.max_delay = Duration::from_millis(20);
        config
    }

    async fn queue_in(temp: &TempDir) -> IngestionQueue {
        std::fs::create_dir_all(temp.path().join("downloads")).unwrap();
        IngestionQueue::new(fast_config(temp)).await.unwrap()
    }

    #[tokio::test]
    async fn created_event_tracks_a_new_path() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let path = temp.path().join("downloads/mod.pmp");

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(path.clone()))
            .await;

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].path, path);
        assert_eq!(pending[0].retry_count, 0);
    }

    #[tokio::test]
    async fn duplicate_created_event_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let path = temp.path().join("downloads/mod.pmp");

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(path.clone()))
            .await;
        let first_seen = queue.pending().await[0].first_seen;

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(path.clone()))
            .await;

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1, "duplicate event must not re-enqueue");
        assert_eq!(pending[0].first_seen, first_seen);
    }

    #[tokio::test]
    async fn rename_rekeys_and_preserves_first_seen() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let from = temp.path().join("downloads/mod.pmp.crdownload.pmp");
        let to = temp.path().join("downloads/mod.pmp");

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(from.clone()))
            .await;
        let first_seen = queue.pending().await[0].first_seen;

        queue
            .inner
            .handle_watch_event(WatchEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            })
            .await;

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].path, to);
        assert_eq!(pending[0].first_seen, first_seen);
        assert_eq!(pending[0].retry_count, 0);
    }

    #[tokio::test]
    async fn rename_of_untracked_path_tracks_the_target() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let to = temp.path().join("downloads/mod.pmp");

        queue
            .inner
            .handle_watch_event(WatchEvent::Renamed {
                from: temp.path().join("downloads/unknown.tmp"),
                to: to.clone(),
            })
            .await;

        assert_eq!(queue.pending().await[0].path, to);
    }

    #[tokio::test]
    async fn tick_drops_entries_whose_path_disappeared() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(temp.path().join("downloads/gone.pmp")))
            .await;
        assert_eq!(queue.pending().await.len(), 1);

        queue.inner.process_tick().await;
        assert!(queue.pending().await.is_empty());
    }

    #[tokio::test]
    async fn tick_increments_retry_counter_while_not_ready() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let path = temp.path().join("downloads/empty.pmp");
        // Zero-size files never pass the readiness check
        std::fs::write(&path, b"").unwrap();

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(path.clone()))
            .await;
        queue.inner.process_tick().await;
        queue.inner.process_tick().await;

        let pending = queue.pending().await;
        assert_eq!(pending[0].retry_count, 2);
        assert!(path.exists(), "not-ready file must stay in place");
    }

    #[tokio::test]
    async fn tick_processes_a_ready_mod_file() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let path = temp.path().join("downloads/glamour.pmp");
        std::fs::write(&path, b"payload").unwrap();

        let mut events = queue.subscribe();
        queue
            .inner
            .handle_watch_event(WatchEvent::Created(path.clone()))
            .await;
        queue.inner.process_tick().await;

        assert!(queue.pending().await.is_empty(), "processed file is dropped");
        assert!(temp.path().join("mods/glamour/glamour.pmp").exists());
        assert!(!path.exists());

        match events.try_recv().unwrap() {
            Event::FileMoved { mod_name, .. } => assert_eq!(mod_name, "glamour"),
            other => panic!("expected FileMoved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn irrelevant_archive_is_dropped_but_left_on_disk() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        let path = temp.path().join("downloads/docs.zip");
        {
            use std::io::Write;
            let file = std::fs::File::create(&path).unwrap();
            let mut writer = ::zip::ZipWriter::new(file);
            writer
                .start_file("readme.txt", ::zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"docs only").unwrap();
            writer.finish().unwrap();
        }

        queue
            .inner
            .handle_watch_event(WatchEvent::Created(path.clone()))
            .await;
        queue.inner.process_tick().await;

        assert!(queue.pending().await.is_empty(), "ignored archive never retries");
        assert!(path.exists(), "ignored archive stays in place");
    }

    #[tokio::test]
    async fn state_survives_a_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("downloads/slow.pmp");

        let first_seen = {
            let queue = queue_in(&temp).await;
            std::fs::write(&path, b"").unwrap();
            queue
                .inner
                .handle_watch_event(WatchEvent::Created(path.clone()))
                .await;
            queue.inner.process_tick().await;
            let first_seen = queue.pending().await[0].first_seen;
            queue.shutdown().await.unwrap();
            first_seen
        };

        // Same state file, new process
        let queue = IngestionQueue::new(fast_config(&temp)).await.unwrap();
        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].path, path);
        assert_eq!(pending[0].first_seen, first_seen, "timestamp survives restart");
        assert_eq!(pending[0].retry_count, 0, "retry counter restarts");
    }

    #[tokio::test]
    async fn startup_prunes_vanished_paths() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("downloads/vanishing.pmp");

        {
            let queue = queue_in(&temp).await;
            std::fs::write(&path, b"").unwrap();
            queue
                .inner
                .handle_watch_event(WatchEvent::Created(path.clone()))
                .await;
            queue.shutdown().await.unwrap();
        }

        std::fs::remove_file(&path).unwrap();
        let queue = IngestionQueue::new(fast_config(&temp)).await.unwrap();
        assert!(queue.pending().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_flushes() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        queue.start().await.unwrap();

        queue.shutdown().await.unwrap();
        queue.shutdown().await.unwrap();

        assert!(temp.path().join("pending-files.json").exists());
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        queue.start().await.unwrap();
        queue.start().await.unwrap();
        queue.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn rewatch_replaces_the_watch_set() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp).await;
        queue.start().await.unwrap();

        let other = temp.path().join("other");
        std::fs::create_dir_all(&other).unwrap();
        queue.rewatch(std::slice::from_ref(&other)).unwrap();

        queue.shutdown().await.unwrap();
    }
}
