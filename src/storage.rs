//! File-storage abstraction
//!
//! The processor and state store go through [`FileStorage`] rather than
//! touching the filesystem directly, so hosts and tests can substitute their
//! own implementation. [`DiskStorage`] is the default implementation backed
//! by `tokio::fs`.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, add_jitter};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Filesystem operations consumed by the ingestion core
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Whether the path currently exists
    async fn exists(&self, path: &Path) -> bool;

    /// Copy `source` to `dest`, overwriting an existing file
    async fn copy(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Delete a file (a missing file is not an error)
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read a UTF-8 text file
    async fn read_text(&self, path: &Path) -> Result<String>;

    /// Write a UTF-8 text file, replacing existing content
    async fn write_text(&self, path: &Path, content: &str) -> Result<()>;

    /// Delete with a bounded retry budget for transiently locked files
    ///
    /// Retries transient failures with exponential backoff per `retry`.
    /// Exhausting the budget surfaces [`Error::DeleteFailed`]; permanent
    /// failures propagate unchanged.
    async fn delete_with_retry(&self, path: &Path, retry: &RetryConfig) -> Result<()> {
        let mut attempt: u32 = 0;
        let mut delay = retry.initial_delay;

        loop {
            match self.delete(path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    attempt += 1;
                    debug!(
                        path = %path.display(),
                        error = %e,
                        attempt,
                        max_attempts = retry.max_attempts,
                        "delete failed, retrying"
                    );

                    let jittered = if retry.jitter { add_jitter(delay) } else { delay };
                    tokio::time::sleep(jittered).await;

                    let next =
                        Duration::from_secs_f64(delay.as_secs_f64() * retry.backoff_multiplier);
                    delay = next.min(retry.max_delay);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        attempts = attempt + 1,
                        "delete retry budget exhausted"
                    );
                    return Err(Error::DeleteFailed {
                        path: path.to_path_buf(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Default [`FileStorage`] backed by the local filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskStorage;

#[async_trait]
impl FileStorage for DiskStorage {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn copy(&self, source: &Path, dest: &Path) -> Result<()> {
        tokio::fs::copy(source, dest).await.map_err(|e| Error::MoveFailed {
            source_path: source.to_path_buf(),
            dest_path: dest.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await.map_err(Error::Io)
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path).await.map_err(Error::Io)
    }

    async fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        tokio::fs::write(path, content).await.map_err(Error::Io)
    }
}
