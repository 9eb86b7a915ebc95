use crate::types::ArchiveEntry;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Archive format detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    /// ZIP archive (.zip)
    Zip,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// RAR archive (.rar)
    Rar,
}

/// Detect archive format by file extension
///
/// Returns `None` for unrecognized extensions; the caller maps that to an
/// unsupported-archive error.
pub fn detect_archive_kind(path: &Path) -> Option<ArchiveKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "zip" => Some(ArchiveKind::Zip),
        "7z" => Some(ArchiveKind::SevenZip),
        "rar" => Some(ArchiveKind::Rar),
        _ => None,
    }
}

// Matches the reserved pre-release marker as a standalone token: "pre dt",
// "pre-dt", "pre_dt" or "predt", optionally bracketed, case-insensitive.
// "predated" or "spread tokens" must not match.
#[allow(clippy::expect_used)]
static PRE_RELEASE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])pre[ _\-]?dt(?:[^a-z0-9]|$)")
        .expect("pre-release marker pattern is valid")
});

/// Whether one path segment carries the pre-release marker
pub fn is_pre_release_segment(segment: &str) -> bool {
    PRE_RELEASE_MARKER.is_match(segment)
}

/// Whether any directory segment of an entry path carries the marker
pub fn has_pre_release_component(relative_name: &Path) -> bool {
    relative_name.components().any(|component| match component {
        Component::Normal(segment) => segment
            .to_str()
            .map(is_pre_release_segment)
            .unwrap_or(false),
        _ => false,
    })
}

/// Whether the entry is a mod file by extension
pub fn has_mod_extension(entry: &ArchiveEntry, mod_extensions: &[String]) -> bool {
    match entry.extension() {
        Some(ext) => mod_extensions.iter().any(|m| m.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Sanitize an archive entry path against traversal
///
/// Keeps only normal components, dropping `..`, roots and drive prefixes
/// (e.g. "../../../etc/passwd" collapses to "etc/passwd").
pub fn sanitize_entry_path(relative_name: &Path) -> PathBuf {
    relative_name
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
