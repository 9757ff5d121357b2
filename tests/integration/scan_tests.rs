use filetime::FileTime;
use fili::index::{BuildError, ScanBuilder, ScanOptions};
use fili::scanner::ExclusionRules;
use fili::storage::{HashState, IndexStore, SqliteStore, StoreError};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

fn open_store(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("index.db")).unwrap()
}

fn builder(store: &SqliteStore) -> ScanBuilder<'_, SqliteStore> {
    ScanBuilder::new(store, ExclusionRules::none()).with_machine("test-host")
}

fn named(name: &str) -> ScanOptions {
    ScanOptions {
        name: Some(name.to_string()),
        ..ScanOptions::default()
    }
}

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_scan_empty_directory() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    let store = open_store(&db);

    let report = builder(&store).create_scan(tree.path(), &named("empty")).unwrap();

    assert_eq!(report.stats.indexed, 0);
    assert!(!report.stats.is_partial());
    assert!(store.files_for_scan(report.scan.id).unwrap().is_empty());
    assert_eq!(store.scan_names().unwrap(), vec!["empty"]);
}

#[test]
fn test_scan_records_every_file_in_walk_order() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "b.txt", b"bravo");
    write(tree.path(), "a.txt", b"alpha");
    write(tree.path(), "sub/c.txt", b"charlie");
    write(tree.path(), "sub/deeper/d.txt", b"delta");
    write(tree.path(), "z.txt", b"zulu");
    let store = open_store(&db);

    let options = ScanOptions {
        batch_size: 2,
        io_threads: 3,
        ..named("tree")
    };
    let report = builder(&store).create_scan(tree.path(), &options).unwrap();
    assert_eq!(report.stats.indexed, 5);
    assert_eq!(report.stats.bytes, 5 + 5 + 7 + 5 + 4);

    let files = store.files_for_scan(report.scan.id).unwrap();
    let relative: Vec<_> = files
        .iter()
        .map(|f| f.path.strip_prefix(tree.path()).unwrap().to_path_buf())
        .collect();
    let expected: Vec<_> = ["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt", "z.txt"]
        .iter()
        .map(std::path::PathBuf::from)
        .collect();
    assert_eq!(relative, expected);

    for pair in files.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
    assert!(files.iter().all(|f| f.path.is_absolute()));
    assert!(files.iter().all(|f| matches!(f.hash, HashState::Computed(_))));
}

#[test]
fn test_scan_captures_metadata_and_fingerprints() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "data.bin", b"0123456789abcdef");
    write(tree.path(), "empty", b"");
    let pinned = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_times(tree.path().join("data.bin"), pinned, pinned).unwrap();

    let store = open_store(&db);
    let report = builder(&store).create_scan(tree.path(), &named("meta")).unwrap();
    let files = store.files_for_scan(report.scan.id).unwrap();

    let data = files.iter().find(|f| f.path.ends_with("data.bin")).unwrap();
    assert_eq!(data.size, 16);
    assert_eq!(data.modified.timestamp(), 1_600_000_000);
    assert_eq!(data.accessed.timestamp(), 1_600_000_000);
    // bytes at 0, 2, 4, ... of "0123456789abcdef"
    assert_eq!(data.fastsum.as_deref(), Some("3032343638616365"));
    assert_eq!(data.sha1().map(str::len), Some(40));

    let empty = files.iter().find(|f| f.path.ends_with("empty")).unwrap();
    assert_eq!(empty.size, 0);
    assert_eq!(empty.fastsum, None);
    assert_eq!(empty.sha1(), Some(EMPTY_SHA1));
}

#[test]
fn test_fast_mode_skips_strong_hash() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "a.txt", b"some content");
    let store = open_store(&db);

    let options = ScanOptions {
        fast: true,
        ..named("fast")
    };
    let report = builder(&store).create_scan(tree.path(), &options).unwrap();
    let files = store.files_for_scan(report.scan.id).unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].hash, HashState::Skipped);
    assert!(files[0].fastsum.is_some());
    assert_eq!(report.stats.hash_failed, 0);
}

#[test]
fn test_duplicate_name_leaves_existing_scan_untouched() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "a.txt", b"a");
    let store = open_store(&db);

    let first = builder(&store).create_scan(tree.path(), &named("photos")).unwrap();
    write(tree.path(), "b.txt", b"b");

    let err = builder(&store)
        .create_scan(tree.path(), &named("photos"))
        .unwrap_err();
    assert!(matches!(err, BuildError::Store(StoreError::DuplicateName(ref n)) if n == "photos"));

    assert_eq!(store.list_scans().unwrap().len(), 1);
    assert_eq!(store.files_for_scan(first.scan.id).unwrap().len(), 1);
}

#[test]
fn test_excluded_prefix_never_produces_rows() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "keep/a.txt", b"a");
    write(tree.path(), "cache/b.txt", b"b");
    write(tree.path(), "cache/nested/c.txt", b"c");
    write(tree.path(), "cachedir/d.txt", b"d");
    let store = open_store(&db);

    let rules = ExclusionRules::new([tree.path().join("cache")]);
    let report = ScanBuilder::new(&store, rules)
        .with_machine("test-host")
        .create_scan(tree.path(), &named("filtered"))
        .unwrap();

    let files = store.files_for_scan(report.scan.id).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| !f.path.starts_with(tree.path().join("cache"))));
    assert!(files.iter().any(|f| f.path.ends_with("cachedir/d.txt")));
    assert_eq!(report.stats.excluded, 1);
}

#[test]
fn test_non_recursive_scan() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "top.txt", b"top");
    write(tree.path(), "sub/below.txt", b"below");
    let store = open_store(&db);

    let options = ScanOptions {
        recurse: false,
        ..named("flat")
    };
    let report = builder(&store).create_scan(tree.path(), &options).unwrap();
    let files = store.files_for_scan(report.scan.id).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("top.txt"));
}

#[test]
fn test_default_name_and_trailing_separator() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    fs::create_dir(tree.path().join("music")).unwrap();
    let store = open_store(&db);

    let with_slash = format!("{}/", tree.path().join("music").display());
    let report = builder(&store)
        .create_scan(Path::new(&with_slash), &ScanOptions::default())
        .unwrap();

    assert_eq!(report.scan.root, tree.path().join("music"));
    assert!(report.scan.name.starts_with("music-"));
    assert_eq!(report.scan.name.len(), "music-".len() + 12);
    assert_eq!(report.scan.machine, "test-host");
}

#[test]
fn test_root_must_be_directory() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "file", b"x");
    let store = open_store(&db);

    let err = builder(&store)
        .create_scan(&tree.path().join("file"), &named("bad"))
        .unwrap_err();
    assert!(matches!(err, BuildError::NotADirectory(_)));
    assert!(store.list_scans().unwrap().is_empty());
}

#[test]
fn test_update_replaces_rows_under_same_name() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "old.txt", b"old");
    let store = open_store(&db);

    builder(&store).create_scan(tree.path(), &named("docs")).unwrap();
    fs::remove_file(tree.path().join("old.txt")).unwrap();
    write(tree.path(), "new.txt", b"new");

    let report = builder(&store)
        .update_scan("docs", &ScanOptions::default())
        .unwrap();
    assert_eq!(report.scan.name, "docs");

    let files = store.files_for_scan(report.scan.id).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("new.txt"));
    assert_eq!(store.list_scans().unwrap().len(), 1);
}

#[test]
fn test_update_refuses_foreign_scan() {
    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    let store = open_store(&db);

    ScanBuilder::new(&store, ExclusionRules::none())
        .with_machine("nas")
        .create_scan(tree.path(), &named("remote"))
        .unwrap();

    let err = builder(&store)
        .update_scan("remote", &ScanOptions::default())
        .unwrap_err();
    assert!(matches!(err, BuildError::ForeignMachine { .. }));
    assert!(store.scan_by_name("remote").unwrap().is_some());

    let err = builder(&store)
        .update_scan("missing", &ScanOptions::default())
        .unwrap_err();
    assert!(matches!(err, BuildError::Store(StoreError::ScanNotFound(_))));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_recorded_as_failed() {
    use std::os::unix::fs::PermissionsExt;

    let db = tempdir().unwrap();
    let tree = tempdir().unwrap();
    write(tree.path(), "locked", b"secret");
    let locked = tree.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // running as root; permissions are not enforced
        return;
    }

    let store = open_store(&db);
    let report = builder(&store).create_scan(tree.path(), &named("locked")).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(report.stats.hash_failed, 1);
    assert!(report.stats.is_partial());
    let files = store.files_for_scan(report.scan.id).unwrap();
    assert_eq!(files[0].hash, HashState::Failed);
    assert_eq!(files[0].size, 6);
}
