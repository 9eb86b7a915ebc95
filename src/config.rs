//! Configuration types for mod-ingest
//!
//! All values are read-only to the core once the queue is constructed; the
//! host re-creates the queue (or calls
//! [`crate::queue::IngestionQueue::rewatch`]) when its own settings change.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory watching
    #[serde(default)]
    pub watch: WatchConfig,

    /// File classification and relocation policy
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Download-completion detection
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Poll loop timing
    #[serde(default)]
    pub queue: QueueConfig,

    /// Queue-state persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Bounded retry used for source deletes during moves
    #[serde(default)]
    pub delete_retry: RetryConfig,
}

/// Watched directory configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directories to watch for arriving mod files and archives
    ///
    /// A directory missing at startup is skipped with a warning; the rest are
    /// still watched.
    #[serde(default)]
    pub directories: Vec<PathBuf>,
}

/// File classification and relocation policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Central mod directory files are relocated into (default: "./mods")
    #[serde(default = "default_mod_dir")]
    pub mod_dir: PathBuf,

    /// Move processed files under [`Self::mod_dir`] (true, default) or
    /// organize them into a same-named subfolder beside the original (false)
    #[serde(default = "default_true")]
    pub relocate: bool,

    /// Delete archives after their matching entries have been extracted
    #[serde(default = "default_true")]
    pub auto_delete: bool,

    /// Ignore archive entries under a pre-release marker folder
    #[serde(default)]
    pub skip_pre_release: bool,

    /// Extensions recognized as standalone mod files (without dots)
    #[serde(default = "default_mod_extensions")]
    pub mod_extensions: Vec<String>,

    /// Extensions recognized as archives (without dots)
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mod_dir: default_mod_dir(),
            relocate: true,
            auto_delete: true,
            skip_pre_release: false,
            mod_extensions: default_mod_extensions(),
            archive_extensions: default_archive_extensions(),
        }
    }
}

impl ProcessingConfig {
    /// Combined allow-list used by the directory watchers
    pub fn allowed_extensions(&self) -> Vec<String> {
        let mut all = self.mod_extensions.clone();
        all.extend(self.archive_extensions.iter().cloned());
        all
    }
}

/// Download-completion detection configuration
///
/// The defaults take three size samples one second apart. Tests shrink the
/// interval so suites stay fast.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Number of size samples taken per readiness check (default: 3)
    #[serde(default = "default_size_samples")]
    pub size_samples: u32,

    /// Delay between consecutive size samples (default: 1s)
    #[serde(default = "default_sample_interval", with = "duration_serde")]
    pub sample_interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            size_samples: default_size_samples(),
            sample_interval: default_sample_interval(),
        }
    }
}

/// Poll loop timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Interval between poll ticks over the tracked set (default: 500ms)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Interval for the unconditional state autosave (default: 60s)
    #[serde(default = "default_autosave_interval", with = "duration_serde")]
    pub autosave_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            autosave_interval: default_autosave_interval(),
        }
    }
}

/// Queue-state persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the persisted pending-queue file (default: "./pending-files.json")
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

/// Retry configuration for bounded delete attempts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial try (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries (default: 200ms)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 5s)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

fn default_mod_dir() -> PathBuf {
    PathBuf::from("./mods")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("./pending-files.json")
}

fn default_mod_extensions() -> Vec<String> {
    vec!["pmp".to_string(), "ttmp".to_string(), "ttmp2".to_string()]
}

fn default_archive_extensions() -> Vec<String> {
    vec!["zip".to_string(), "7z".to_string(), "rar".to_string()]
}

fn default_size_samples() -> u32 {
    3
}

fn default_sample_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_autosave_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (integer milliseconds; the poll tick is
// sub-second so whole seconds would not round-trip)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
