use super::*;
use crate::types::ArchiveEntry;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn inspector() -> ArchiveInspector {
    ArchiveInspector::new(vec!["pmp".into(), "ttmp".into(), "ttmp2".into()])
}

/// Build a ZIP archive at `path` with the given (name, content) files
fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default();

    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

// =========================================================================
// Enumeration
// =========================================================================

#[test]
fn zip_entries_report_names_and_sizes() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("pack.zip");
    write_zip(&archive, &[("a.pmp", b"12345"), ("docs/readme.txt", b"hi")]);

    let entries = inspector().entries(&archive).unwrap();
    assert_eq!(entries.len(), 2);

    let a = entries
        .iter()
        .find(|e| e.relative_name == PathBuf::from("a.pmp"))
        .unwrap();
    assert_eq!(a.size, 5);
    assert!(!a.is_directory);

    assert!(
        entries
            .iter()
            .any(|e| e.relative_name == PathBuf::from("docs/readme.txt"))
    );
}

#[test]
fn sevenz_entries_round_trip_through_compression() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("nested")).unwrap();
    std::fs::write(src.join("skin.pmp"), b"payload").unwrap();
    std::fs::write(src.join("nested/readme.txt"), b"notes").unwrap();

    let archive = temp.path().join("pack.7z");
    sevenz_rust::compress_to_path(&src, &archive).unwrap();

    let entries = inspector().entries(&archive).unwrap();
    assert!(
        entries
            .iter()
            .any(|e| e.relative_name.to_string_lossy().ends_with("skin.pmp"))
    );
}

#[test]
fn unknown_extension_is_unsupported() {
    let err = inspector().entries(Path::new("/tmp/file.pmp")).unwrap_err();
    assert!(matches!(err, crate::error::Error::UnsupportedArchive { .. }));
}

#[test]
fn text_file_renamed_to_zip_is_unsupported() {
    let temp = TempDir::new().unwrap();
    let fake = temp.path().join("fake.zip");
    std::fs::write(&fake, "just plain text, not a container").unwrap();

    let err = inspector().entries(&fake).unwrap_err();
    match err {
        crate::error::Error::UnsupportedArchive { path, .. } => assert_eq!(path, fake),
        other => panic!("expected UnsupportedArchive, got {other:?}"),
    }
}

#[test]
fn garbage_rar_is_unsupported() {
    let temp = TempDir::new().unwrap();
    let fake = temp.path().join("fake.rar");
    std::fs::write(&fake, "not really a rar").unwrap();

    let err = inspector().entries(&fake).unwrap_err();
    assert!(matches!(err, crate::error::Error::UnsupportedArchive { .. }));
}

// =========================================================================
// Relevance under the pre-release policy
// =========================================================================

#[test]
fn relevance_requires_a_mod_extension() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("docs.zip");
    write_zip(&archive, &[("readme.txt", b"hi"), ("changelog.md", b"v1")]);

    assert!(!inspector().contains_relevant_entry(&archive, false).unwrap());
}

#[test]
fn pre_release_only_archive_is_irrelevant_when_skipping() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("old.zip");
    write_zip(&archive, &[("[Pre-DT]/c.pmp", b"old")]);

    let inspector = inspector();
    assert!(!inspector.contains_relevant_entry(&archive, true).unwrap());
    // Without the policy the same archive is relevant
    assert!(inspector.contains_relevant_entry(&archive, false).unwrap());
}

#[test]
fn mixed_archive_is_relevant_and_extracts_only_current_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("pack.zip");
    write_zip(
        &archive,
        &[
            ("a.pmp", b"current"),
            ("b.txt", b"notes"),
            ("[Pre-DT]/c.pmp", b"old"),
        ],
    );

    let inspector = inspector();
    assert!(inspector.contains_relevant_entry(&archive, true).unwrap());

    let dest = temp.path().join("out");
    let extracted = inspector.extract_relevant(&archive, &dest, true).unwrap();

    assert_eq!(extracted, vec![dest.join("a.pmp")]);
    assert!(dest.join("a.pmp").exists());
    assert!(!dest.join("b.txt").exists());
    assert!(!dest.join("[Pre-DT]").exists());
}

#[test]
fn directory_entries_are_never_relevant() {
    let entry = ArchiveEntry {
        relative_name: PathBuf::from("folder.pmp"),
        size: 0,
        is_directory: true,
    };
    assert!(!inspector().is_relevant(&entry, false));
}

// =========================================================================
// Filtered extraction
// =========================================================================

#[test]
fn extraction_preserves_relative_subpaths() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("deep.zip");
    write_zip(
        &archive,
        &[("outfits/summer/dress.pmp", b"aa"), ("outfits/readme.txt", b"bb")],
    );

    let dest = temp.path().join("out");
    let extracted = inspector().extract_relevant(&archive, &dest, false).unwrap();

    assert_eq!(extracted, vec![dest.join("outfits/summer/dress.pmp")]);
    assert!(dest.join("outfits/summer/dress.pmp").exists());
}

#[test]
fn extraction_with_custom_predicate_filters_by_size() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("pack.zip");
    write_zip(&archive, &[("big.pmp", b"0123456789"), ("small.pmp", b"01")]);

    let dest = temp.path().join("out");
    let extracted = inspector()
        .extract_matching(&archive, &dest, &|e| e.size > 5)
        .unwrap();

    assert_eq!(extracted, vec![dest.join("big.pmp")]);
}

#[test]
fn sevenz_extraction_filters_like_zip() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("skin.pmp"), b"payload").unwrap();
    std::fs::write(src.join("readme.txt"), b"notes").unwrap();

    let archive = temp.path().join("pack.7z");
    sevenz_rust::compress_to_path(&src, &archive).unwrap();

    let dest = temp.path().join("out");
    let extracted = inspector().extract_relevant(&archive, &dest, false).unwrap();

    assert_eq!(extracted.len(), 1);
    assert!(extracted[0].to_string_lossy().ends_with("skin.pmp"));
    let listing: Vec<_> = walkdir::WalkDir::new(&dest)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert_eq!(listing.len(), 1, "only the mod file should be on disk");
}

#[test]
fn traversal_entry_names_are_confined_to_dest() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("evil.zip");
    write_zip(&archive, &[("../escape.pmp", b"bad")]);

    let dest = temp.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    let extracted = inspector().extract_relevant(&archive, &dest, false).unwrap();

    assert!(!temp.path().join("escape.pmp").exists());
    for path in &extracted {
        assert!(path.starts_with(&dest), "{path:?} escaped the destination");
    }
}
