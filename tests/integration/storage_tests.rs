use chrono::{TimeZone, Utc};
use fili::storage::{HashState, IndexStore, NewFile, NewScan, SqliteStore, StoreError};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn new_scan(name: &str, root: &str) -> NewScan {
    NewScan {
        name: name.to_string(),
        machine: "host".to_string(),
        root: PathBuf::from(root),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    }
}

fn file(path: &str, hash: Option<&str>, day: u32) -> NewFile {
    NewFile {
        path: PathBuf::from(path),
        size: 10,
        fastsum: Some("00".repeat(8)),
        hash: hash.map_or(HashState::Skipped, |h| HashState::Computed(h.to_string())),
        accessed: Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap(),
        modified: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    }
}

#[test]
fn test_index_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");

    {
        let store = SqliteStore::open(&db).unwrap();
        let scan = store.insert_scan(&new_scan("kept", "/data")).unwrap();
        store
            .insert_files(scan.id, &[file("/data/a", Some("h1"), 1)])
            .unwrap();
        store.close().unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    let scan = store.scan_by_name("kept").unwrap().unwrap();
    assert_eq!(scan.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap());
    let files = store.files_for_scan(scan.id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].sha1(), Some("h1"));
}

#[test]
fn test_delete_scan_cascades_to_its_files_only() {
    let store = SqliteStore::open_in_memory().unwrap();
    let doomed = store.insert_scan(&new_scan("doomed", "/a")).unwrap();
    let survivor = store.insert_scan(&new_scan("survivor", "/b")).unwrap();
    store
        .insert_files(doomed.id, &[file("/a/1", None, 1), file("/a/2", None, 1)])
        .unwrap();
    store
        .insert_files(survivor.id, &[file("/b/1", None, 1)])
        .unwrap();

    assert_eq!(store.delete_scan("doomed").unwrap(), 2);
    assert!(store.scan_by_name("doomed").unwrap().is_none());
    assert!(store.files_for_scan(doomed.id).unwrap().is_empty());
    assert_eq!(store.files_for_scan(survivor.id).unwrap().len(), 1);

    assert!(matches!(
        store.delete_scan("doomed"),
        Err(StoreError::ScanNotFound(_))
    ));
}

#[test]
fn test_list_scans_in_creation_order_with_counts() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = store.insert_scan(&new_scan("first", "/a")).unwrap();
    store.insert_scan(&new_scan("second", "/b")).unwrap();
    store
        .insert_files(first.id, &[file("/a/1", None, 1), file("/a/2", None, 1)])
        .unwrap();

    let scans = store.list_scans().unwrap();
    let listed: Vec<_> = scans
        .iter()
        .map(|s| (s.scan.name.as_str(), s.file_count))
        .collect();
    assert_eq!(listed, vec![("first", 2), ("second", 0)]);
}

#[test]
fn test_search_recent_and_unindex() {
    let store = SqliteStore::open_in_memory().unwrap();
    let scan = store.insert_scan(&new_scan("s", "/home")).unwrap();
    store
        .insert_files(
            scan.id,
            &[
                file("/home/photos/cat.jpg", Some("h1"), 3),
                file("/home/photos/dog.jpg", Some("h2"), 9),
                file("/home/photos2/bird.jpg", None, 5),
                file("/home/docs/cat.txt", None, 1),
            ],
        )
        .unwrap();

    let found: Vec<_> = store
        .search_paths(b"cat")
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(
        found,
        vec![
            PathBuf::from("/home/photos/cat.jpg"),
            PathBuf::from("/home/docs/cat.txt")
        ]
    );

    let recent: Vec<_> = store
        .recent_files(2)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(
        recent,
        vec![
            PathBuf::from("/home/photos/dog.jpg"),
            PathBuf::from("/home/photos2/bird.jpg")
        ]
    );

    assert_eq!(store.unindex(Path::new("/home/photos"), false).unwrap(), 2);
    assert_eq!(store.files_for_scan(scan.id).unwrap().len(), 2);
    assert_eq!(store.unindex(Path::new("/home/docs"), true).unwrap(), 0);
    assert_eq!(store.unindex(Path::new("/home/docs/cat.txt"), true).unwrap(), 1);
}

#[test]
fn test_stats_totals() {
    let store = SqliteStore::open_in_memory().unwrap();
    let scan = store.insert_scan(&new_scan("s", "/x")).unwrap();
    store
        .insert_files(scan.id, &[file("/x/a", Some("h"), 1), file("/x/b", None, 1)])
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.scans, 1);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.total_bytes, 20);
    assert_eq!(stats.hashed_files, 1);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_paths_round_trip() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let store = SqliteStore::open_in_memory().unwrap();
    let scan = store.insert_scan(&new_scan("bytes", "/raw")).unwrap();
    let odd = Path::new("/raw").join(OsStr::from_bytes(b"caf\xe9.txt"));
    let mut row = file("/unused", None, 1);
    row.path = odd.clone();
    store.insert_files(scan.id, &[row]).unwrap();

    let files = store.files_for_scan(scan.id).unwrap();
    assert_eq!(files[0].path, odd);
    assert_eq!(store.search_paths(b"caf\xe9").unwrap().len(), 1);
}
