//! Persistence collaborator for scans and file rows.
//!
//! The core never embeds SQL. It talks to an [`IndexStore`], a typed
//! repository over two relations: `scans` (one header per traversal) and
//! `files` (rows owned by exactly one scan, deleted with it).
//!
//! [`SqliteStore`] is the production implementation. It is opened with an
//! explicit database path and closed when dropped (or via
//! [`SqliteStore::close`]).
//!
//! # Example
//!
//! ```no_run
//! use fili::storage::{IndexStore, SqliteStore};
//! use std::path::Path;
//!
//! let store = SqliteStore::open(Path::new("/tmp/fili.db")).unwrap();
//! for name in store.scan_names().unwrap() {
//!     println!("{name}");
//! }
//! ```

pub mod models;
pub mod sqlite;

use std::path::Path;

pub use models::{FileRecord, HashState, IndexStats, NewFile, NewScan, Scan, ScanSummary};
pub use sqlite::SqliteStore;

/// Errors reported by the storage collaborator.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A scan with this name already exists; nothing was inserted.
    #[error("A scan named '{0}' already exists")]
    DuplicateName(String),

    /// No scan has this name.
    #[error("No scan named '{0}'")]
    ScanNotFound(String),

    /// A file size does not fit the store's integer column.
    #[error("File size {0} exceeds the storable range")]
    SizeOutOfRange(u64),

    /// A stored row could not be decoded.
    #[error("Corrupt {table} row {id}: {reason}")]
    Corrupt {
        /// Relation holding the row
        table: &'static str,
        /// Row identifier
        id: i64,
        /// What was wrong with it
        reason: String,
    },

    /// The database itself failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Typed operations over the persistent index.
///
/// Every method is its own unit of work: it commits before returning, and
/// nothing spans several calls. Row-returning methods order by insertion
/// unless noted otherwise.
pub trait IndexStore {
    /// Insert a scan header.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateName`] if the name is taken.
    fn insert_scan(&self, scan: &NewScan) -> Result<Scan, StoreError>;

    /// Insert a batch of file rows under `scan_id`, all or nothing.
    fn insert_files(&self, scan_id: i64, files: &[NewFile]) -> Result<(), StoreError>;

    /// Insert a header and all of its files in one transaction.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateName`] if the name is taken. On any error no
    /// row is left behind.
    fn insert_scan_with_files(&self, scan: &NewScan, files: &[NewFile])
        -> Result<Scan, StoreError>;

    /// Delete a scan and, by cascade, all of its files.
    ///
    /// Returns the number of file rows removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::ScanNotFound`] if no scan has this name.
    fn delete_scan(&self, name: &str) -> Result<usize, StoreError>;

    fn scan_by_name(&self, name: &str) -> Result<Option<Scan>, StoreError>;

    fn scan_by_id(&self, id: i64) -> Result<Option<Scan>, StoreError>;

    /// All scans in creation order, each with its file count.
    fn list_scans(&self) -> Result<Vec<ScanSummary>, StoreError>;

    /// Names of all scans in creation order.
    fn scan_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .list_scans()?
            .into_iter()
            .map(|summary| summary.scan.name)
            .collect())
    }

    fn files_for_scan(&self, scan_id: i64) -> Result<Vec<FileRecord>, StoreError>;

    /// Rows whose computed strong hash equals `hash`, optionally within one
    /// scan.
    fn files_by_hash(&self, hash: &str, scan_id: Option<i64>)
        -> Result<Vec<FileRecord>, StoreError>;

    /// Computed hashes shared by two or more rows, ordered by the first row
    /// carrying each hash.
    fn duplicate_hashes(&self, scan_id: Option<i64>) -> Result<Vec<String>, StoreError>;

    /// Remove one file row. Returns whether a row existed.
    fn delete_file(&self, id: i64) -> Result<bool, StoreError>;

    /// Rows whose raw path bytes contain `needle`.
    fn search_paths(&self, needle: &[u8]) -> Result<Vec<FileRecord>, StoreError>;

    /// Most recently accessed rows, newest first.
    fn recent_files(&self, limit: usize) -> Result<Vec<FileRecord>, StoreError>;

    /// Remove rows at `prefix` or below it (only exactly at it when
    /// `strict`). Returns the number of rows removed.
    fn unindex(&self, prefix: &Path, strict: bool) -> Result<usize, StoreError>;

    fn stats(&self) -> Result<IndexStats, StoreError>;
}
