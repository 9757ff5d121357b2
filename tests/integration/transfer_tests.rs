use chrono::{DateTime, TimeZone, Timelike, Utc};
use fili::actions::DeleteConfig;
use fili::duplicates::{find_duplicate_groups, DuplicateResolver};
use fili::index::{export_scan, import_scan, IndexDocument, ScanBuilder, ScanOptions, TransferError};
use fili::scanner::ExclusionRules;
use fili::storage::{FileRecord, HashState, IndexStore, NewFile, NewScan, SqliteStore, StoreError};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap()
}

fn seed(store: &SqliteStore) -> (fili::storage::Scan, Vec<FileRecord>) {
    let scan = store
        .insert_scan(&NewScan {
            name: "laptop-photos".to_string(),
            machine: "laptop".to_string(),
            root: PathBuf::from("/home/me/photos"),
            created_at: Utc.with_ymd_and_hms(2015, 5, 31, 18, 6, 54).unwrap()
                + chrono::Duration::milliseconds(250),
        })
        .unwrap();
    let at = |s| Utc.with_ymd_and_hms(2015, 5, 1, 12, 0, s).unwrap();
    store
        .insert_files(
            scan.id,
            &[
                NewFile {
                    path: PathBuf::from("/home/me/photos/b.jpg"),
                    size: 2048,
                    fastsum: Some("0102030405060708".to_string()),
                    hash: HashState::Computed("a9993e364706816aba3e25717850c26c9cd0d89d".to_string()),
                    accessed: at(1) + chrono::Duration::microseconds(999),
                    modified: at(2),
                },
                NewFile {
                    path: PathBuf::from("/home/me/photos/a.jpg"),
                    size: 0,
                    fastsum: None,
                    hash: HashState::Skipped,
                    accessed: at(3),
                    modified: at(4),
                },
                NewFile {
                    path: PathBuf::from("/home/me/photos/locked.raw"),
                    size: 77,
                    fastsum: None,
                    hash: HashState::Failed,
                    accessed: at(5),
                    modified: at(6),
                },
            ],
        )
        .unwrap();
    let files = store.files_for_scan(scan.id).unwrap();
    (scan, files)
}

#[test]
fn test_round_trip_between_databases() {
    let dir = tempdir().unwrap();
    let source = SqliteStore::open(&dir.path().join("laptop.db")).unwrap();
    let target = SqliteStore::open(&dir.path().join("nas.db")).unwrap();
    let (scan, files) = seed(&source);

    let document_path = dir.path().join("export.json");
    export_scan(&source, "laptop-photos")
        .unwrap()
        .save(&document_path)
        .unwrap();
    let imported = import_scan(&target, &IndexDocument::load(&document_path).unwrap()).unwrap();

    assert_eq!(imported.name, scan.name);
    assert_eq!(imported.machine, scan.machine);
    assert_eq!(imported.root, scan.root);
    assert_eq!(imported.created_at, whole_seconds(scan.created_at));

    let copied = target.files_for_scan(imported.id).unwrap();
    assert_eq!(copied.len(), files.len());
    for (original, copy) in files.iter().zip(&copied) {
        assert_eq!(copy.path, original.path);
        assert_eq!(copy.size, original.size);
        assert_eq!(copy.fastsum, original.fastsum);
        assert_eq!(copy.hash, original.hash);
        assert_eq!(copy.accessed, whole_seconds(original.accessed));
        assert_eq!(copy.modified, whole_seconds(original.modified));
    }
}

#[test]
fn test_document_field_names_are_stable() {
    let store = SqliteStore::open_in_memory().unwrap();
    seed(&store);
    let document = export_scan(&store, "laptop-photos").unwrap();

    let mut buffer = Vec::new();
    document.write_to(&mut buffer).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

    assert_eq!(json["name"], "laptop-photos");
    assert_eq!(json["machine_name"], "laptop");
    assert_eq!(json["root_directory"], "/home/me/photos");
    assert_eq!(json["created_at"], "2015-05-31T18:06:54.250Z");

    let files = json["files"].as_array().unwrap();
    assert_eq!(files[0]["path"], "/home/me/photos/b.jpg");
    assert_eq!(files[0]["sha1"], "a9993e364706816aba3e25717850c26c9cd0d89d");
    assert!(files[0].get("hash_failed").is_none());
    assert!(files[1]["sha1"].is_null());
    assert!(files[1]["fastsum"].is_null());
    assert_eq!(files[2]["hash_failed"], true);
}

#[test]
fn test_import_of_existing_name_is_rejected() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (scan, files) = seed(&store);
    let document = export_scan(&store, "laptop-photos").unwrap();

    let err = import_scan(&store, &document).unwrap_err();
    assert!(matches!(err, TransferError::Store(StoreError::DuplicateName(_))));
    assert_eq!(store.list_scans().unwrap().len(), 1);
    assert_eq!(store.files_for_scan(scan.id).unwrap(), files);
}

#[test]
fn test_malformed_documents_leave_nothing_behind() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::open_in_memory().unwrap();

    let missing_field = dir.path().join("missing.json");
    fs::write(
        &missing_field,
        r#"{"name": "x", "machine_name": "m", "created_at": "2015-05-31T18:06:54", "files": []}"#,
    )
    .unwrap();
    assert!(matches!(
        IndexDocument::load(&missing_field),
        Err(TransferError::Json(_))
    ));

    let bad_timestamp: IndexDocument = serde_json::from_str(
        r#"{"name": "x", "machine_name": "m", "root_directory": "/r",
            "created_at": "2015-05-31T18:06:54",
            "files": [
              {"path": "/r/a", "size": 1, "sha1": null, "fastsum": null,
               "accessed": "2015-05-31T18:06:54", "modified": "2015-05-31T18:06:54"},
              {"path": "/r/b", "size": 1, "sha1": null, "fastsum": null,
               "accessed": "yesterday", "modified": "2015-05-31T18:06:54"}
            ]}"#,
    )
    .unwrap();
    assert!(matches!(
        import_scan(&store, &bad_timestamp),
        Err(TransferError::Invalid(_))
    ));
    assert!(store.list_scans().unwrap().is_empty());
    assert_eq!(store.stats().unwrap().files, 0);

    assert!(matches!(
        IndexDocument::load(&dir.path().join("absent.json")),
        Err(TransferError::Read { .. })
    ));
}

#[test]
fn test_scanned_tree_round_trips() {
    let dir = tempdir().unwrap();
    let tree = tempdir().unwrap();
    fs::write(tree.path().join("one.txt"), b"one").unwrap();
    fs::create_dir(tree.path().join("sub")).unwrap();
    fs::write(tree.path().join("sub/two.txt"), b"two").unwrap();

    let source = SqliteStore::open(&dir.path().join("a.db")).unwrap();
    let report = ScanBuilder::new(&source, ExclusionRules::none())
        .with_machine("here")
        .create_scan(
            tree.path(),
            &ScanOptions {
                name: Some("tree".to_string()),
                ..ScanOptions::default()
            },
        )
        .unwrap();

    let target = SqliteStore::open_in_memory().unwrap();
    let imported = import_scan(&target, &export_scan(&source, "tree").unwrap()).unwrap();

    let before = source.files_for_scan(report.scan.id).unwrap();
    let after = target.files_for_scan(imported.id).unwrap();
    let strip = |files: &[FileRecord]| -> Vec<_> {
        files
            .iter()
            .map(|f| (f.path.clone(), f.size, f.sha1().map(str::to_string), f.fastsum.clone()))
            .collect()
    };
    assert_eq!(strip(&before), strip(&after));
}

/// Document shaped like those written by older fili versions, where a fast
/// scan stores the text `"null"` and a failed hash stores `false`.
fn legacy_document(root: &std::path::Path, files: &[(&str, u64, serde_json::Value)]) -> IndexDocument {
    let files: Vec<_> = files
        .iter()
        .map(|(name, size, sha1)| {
            serde_json::json!({
                "path": root.join(name).to_string_lossy(),
                "size": size,
                "sha1": sha1,
                "fastsum": null,
                "accessed": "2015-05-31 18:06:54.123",
                "modified": "2015-05-31 18:06:54.123"
            })
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "name": "legacy",
        "machine_name": "old-host",
        "root_directory": root.to_string_lossy(),
        "created_at": "2015-05-31 18:06:54.123",
        "files": files
    }))
    .unwrap()
}

#[test]
fn test_legacy_fast_scan_never_groups_or_deletes() {
    let tree = tempdir().unwrap();
    fs::write(tree.path().join("a.txt"), b"0123456789").unwrap();
    fs::write(tree.path().join("b.txt"), b"a unique 25-byte payload!").unwrap();
    let doc = legacy_document(
        tree.path(),
        &[
            ("a.txt", 10, serde_json::json!("null")),
            ("b.txt", 25, serde_json::json!("null")),
        ],
    );

    let store = SqliteStore::open_in_memory().unwrap();
    let scan = import_scan(&store, &doc).unwrap();
    let files = store.files_for_scan(scan.id).unwrap();
    assert!(files.iter().all(|f| f.hash == HashState::Skipped && f.sha1().is_none()));
    assert_eq!(find_duplicate_groups(&store, None).unwrap().count(), 0);

    let report = DuplicateResolver::new(&store)
        .with_machine("old-host")
        .delete_duplicates(&DeleteConfig::permanent())
        .unwrap();
    assert_eq!(report.groups, 0);
    assert_eq!(report.deleted, 0);
    assert!(tree.path().join("a.txt").exists());
    assert!(tree.path().join("b.txt").exists());
}

#[test]
fn test_legacy_failed_hash_imports_as_failed() {
    let tree = tempdir().unwrap();
    let doc = legacy_document(
        tree.path(),
        &[
            ("a.txt", 10, serde_json::json!(false)),
            ("b.txt", 10, serde_json::json!("False")),
        ],
    );

    let store = SqliteStore::open_in_memory().unwrap();
    let scan = import_scan(&store, &doc).unwrap();
    let files = store.files_for_scan(scan.id).unwrap();
    assert!(files.iter().all(|f| f.hash == HashState::Failed));
    assert_eq!(find_duplicate_groups(&store, None).unwrap().count(), 0);

    let exported = serde_json::to_value(export_scan(&store, "legacy").unwrap()).unwrap();
    assert!(exported["files"][0]["sha1"].is_null());
    assert_eq!(exported["files"][0]["hash_failed"], true);
}

#[test]
fn test_unrecognised_hash_rejects_whole_document() {
    let tree = tempdir().unwrap();
    let doc = legacy_document(
        tree.path(),
        &[
            ("a.txt", 10, serde_json::json!("a9993e364706816aba3e25717850c26c9cd0d89d")),
            ("b.txt", 10, serde_json::json!("not-a-digest")),
        ],
    );

    let store = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(
        import_scan(&store, &doc),
        Err(TransferError::Invalid(_))
    ));
    assert!(store.list_scans().unwrap().is_empty());
    assert_eq!(store.stats().unwrap().files, 0);
}
