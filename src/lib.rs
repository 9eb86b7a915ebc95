//! # mod-ingest
//!
//! Backend library that watches download directories for game-mod files and
//! archives, decides when a download has settled, extracts or relocates
//! qualifying content, and notifies downstream consumers once artifacts are
//! ready.
//!
//! ## Design Philosophy
//!
//! mod-ingest is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Crash-tolerant** - The pending queue is persisted and reloaded, so a
//!   restart neither re-processes finished files nor loses in-flight ones
//! - **Patient** - A file is retried for as long as it exists; arbitrarily
//!   slow downloads are supported by design
//!
//! ## Quick Start
//!
//! ```no_run
//! use mod_ingest::{Config, IngestionQueue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.watch.directories = vec!["/home/user/Downloads".into()];
//!     config.processing.mod_dir = "/home/user/mods".into();
//!
//!     let queue = IngestionQueue::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = queue.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     queue.start().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive inspection and filtered extraction
pub mod inspection;
/// Per-file processing (classify, relocate, extract, notify)
pub mod processor;
/// Tracked-path queue and background poll loop
pub mod queue;
/// Download-completion detection
pub mod readiness;
/// Retry logic with exponential backoff
pub mod retry;
/// Pending-queue persistence
pub mod state_store;
/// File-storage abstraction
pub mod storage;
/// Core types and events
pub mod types;
/// Directory watching
pub mod watcher;

// Re-export commonly used types
pub use config::{Config, ProcessingConfig, ReadinessConfig, RetryConfig};
pub use error::{Error, Result};
pub use inspection::ArchiveInspector;
pub use processor::FileProcessor;
pub use queue::IngestionQueue;
pub use readiness::ReadinessDetector;
pub use state_store::QueueStateStore;
pub use storage::{DiskStorage, FileStorage};
pub use types::{ArchiveEntry, Event, FileKind, Outcome, PendingFile};
pub use watcher::{DirectoryWatchSet, WatchEvent};

/// Helper function to run the ingestion queue with graceful signal handling.
///
/// Waits for a termination signal and then calls the queue's `shutdown()`
/// method, flushing the persisted state and disposing all watches.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mod_ingest::{Config, IngestionQueue, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let queue = IngestionQueue::new(Config::default()).await?;
///     queue.start().await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(queue).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(queue: IngestionQueue) -> Result<()> {
    wait_for_signal().await;
    queue.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
