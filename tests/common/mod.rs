//! Shared fixtures for integration tests

use mod_ingest::Config;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Build a config pointed at temp directories with test-friendly timing
pub fn fast_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.watch.directories = vec![temp.path().join("downloads")];
    config.processing.mod_dir = temp.path().join("mods");
    config.persistence.state_file = temp.path().join("pending-files.json");
    config.queue.poll_interval = Duration::from_millis(50);
    config.queue.autosave_interval = Duration::from_secs(60);
    config.readiness.size_samples = 2;
    config.readiness.sample_interval = Duration::from_millis(20);
    config.delete_retry.initial_delay = Duration::from_millis(5);
    config.delete_retry.max_delay = Duration::from_millis(20);
    config
}

/// Create the watched downloads directory and return its path
pub fn downloads_dir(temp: &TempDir) -> std::path::PathBuf {
    let dir = temp.path().join("downloads");
    std::fs::create_dir_all(&dir).expect("create downloads dir");
    dir
}

/// Build a ZIP archive at `path` with the given (name, content) files
pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create archive file");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();

    for (name, content) in files {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(content).expect("write entry");
    }
    writer.finish().expect("finish archive");
}

/// Poll `condition` until it holds or the timeout elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
