use fili::index::{copy_diff, diff_scans, DiffError, ScanBuilder, ScanOptions};
use fili::scanner::ExclusionRules;
use fili::storage::{SqliteStore, StoreError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn scan(store: &SqliteStore, root: &Path, name: &str, fast: bool) {
    ScanBuilder::new(store, ExclusionRules::none())
        .with_machine("test-host")
        .create_scan(
            root,
            &ScanOptions {
                name: Some(name.to_string()),
                fast,
                ..ScanOptions::default()
            },
        )
        .unwrap();
}

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_diff_classifies_files_across_roots() {
    let laptop = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(laptop.path(), "same.txt", b"unchanged");
    write(laptop.path(), "old/place.txt", b"relocated");
    write(laptop.path(), "only-here.txt", b"not backed up");
    write(backup.path(), "same.txt", b"unchanged");
    write(backup.path(), "new/place.txt", b"relocated");
    write(backup.path(), "extra.txt", b"only on backup");

    let store = SqliteStore::open_in_memory().unwrap();
    scan(&store, laptop.path(), "laptop", false);
    scan(&store, backup.path(), "backup", false);

    let diff = diff_scans(&store, "laptop", "backup").unwrap();
    let summary = diff.summary();
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.moved, 1);
    assert_eq!(summary.only_in_reference, 1);
    assert_eq!(summary.only_in_other, 1);
    assert!(diff.only_in_reference[0].path.ends_with("only-here.txt"));
    assert!(diff.moved[0].other.path.ends_with("new/place.txt"));
}

#[test]
fn test_fast_scans_pair_by_path_size_and_fastsum() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write(left.path(), "a.bin", b"abcdefgh");
    write(left.path(), "b.bin", b"abcdefgh");
    write(right.path(), "a.bin", b"abcdefgh");
    write(right.path(), "b.bin", b"zzzzzzzz");

    let store = SqliteStore::open_in_memory().unwrap();
    scan(&store, left.path(), "left", true);
    scan(&store, right.path(), "right", true);

    let diff = diff_scans(&store, "left", "right").unwrap();
    assert_eq!(diff.unchanged.len(), 1);
    assert!(diff.unchanged[0].reference.path.ends_with("a.bin"));
    assert_eq!(diff.only_in_reference.len(), 1);
    assert_eq!(diff.only_in_other.len(), 1);
}

#[test]
fn test_copy_diff_restores_missing_files() {
    let laptop = tempdir().unwrap();
    let backup = tempdir().unwrap();
    let restore = tempdir().unwrap();
    write(laptop.path(), "kept.txt", b"in both");
    write(laptop.path(), "docs/report.txt", b"only on laptop");
    write(backup.path(), "kept.txt", b"in both");

    let store = SqliteStore::open_in_memory().unwrap();
    scan(&store, laptop.path(), "laptop", false);
    scan(&store, backup.path(), "backup", false);

    let diff = diff_scans(&store, "laptop", "backup").unwrap();
    let destination = restore.path().join("missing");
    let report = copy_diff(&diff, &destination, None).unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        fs::read(destination.join("docs/report.txt")).unwrap(),
        b"only on laptop"
    );
    assert!(!destination.join("kept.txt").exists());
}

#[test]
fn test_copy_diff_counts_vanished_sources() {
    let laptop = tempdir().unwrap();
    let backup = tempdir().unwrap();
    let restore = tempdir().unwrap();
    write(laptop.path(), "gone.txt", b"deleted after the scan");
    write(laptop.path(), "here.txt", b"still here");

    let store = SqliteStore::open_in_memory().unwrap();
    scan(&store, laptop.path(), "laptop", false);
    scan(&store, backup.path(), "backup", false);
    fs::remove_file(laptop.path().join("gone.txt")).unwrap();

    let diff = diff_scans(&store, "laptop", "backup").unwrap();
    let report = copy_diff(&diff, restore.path(), None).unwrap();
    assert_eq!(report.copied, 1);
    assert_eq!(report.failed, 1);
}

#[test]
fn test_diff_unknown_scan() {
    let store = SqliteStore::open_in_memory().unwrap();
    let err = diff_scans(&store, "nope", "nada").unwrap_err();
    assert!(matches!(err, DiffError::Store(StoreError::ScanNotFound(ref n)) if n == "nope"));
}
