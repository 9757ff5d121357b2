//! SQLite-backed [`IndexStore`].

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params, Row};

use super::{
    FileRecord, HashState, IndexStats, IndexStore, NewFile, NewScan, Scan, ScanSummary,
    StoreError,
};
use crate::scanner::path_utils::{path_from_bytes, path_to_bytes};

const FILE_COLUMNS: &str =
    "id, scan_id, path, size, fastsum, sha1, hash_status, accessed, modified";

const SCAN_COLUMNS: &str = "id, name, machine, root, created_at";

/// Index stored in a single SQLite database file.
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure_pragmas()?;
        store.init_schema()?;
        log::debug!("Opened index database {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if SQLite cannot allocate it.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.configure_pragmas()?;
        store.init_schema()?;
        Ok(store)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if outstanding work cannot be
    /// flushed.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))
    }

    fn configure_pragmas(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn query_files<P: Params>(&self, sql: &str, params: P) -> Result<Vec<FileRecord>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let raw = stmt
            .query_map(params, RawFile::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawFile::into_record).collect()
    }

    fn query_scan<P: Params>(&self, sql: &str, params: P) -> Result<Option<Scan>, StoreError> {
        self.conn
            .query_row(sql, params, RawScan::from_row)
            .optional()?
            .map(RawScan::into_scan)
            .transpose()
    }

    fn name_taken(&self, name: &str) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM scans WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_scan_row(conn: &Connection, scan: &NewScan) -> Result<Scan, StoreError> {
        let root = path_to_bytes(&scan.root);
        let result = conn.execute(
            "INSERT INTO scans (name, machine, root, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                scan.name,
                scan.machine,
                &*root,
                format_timestamp(&scan.created_at)
            ],
        );
        match result {
            Ok(_) => Ok(Scan {
                id: conn.last_insert_rowid(),
                name: scan.name.clone(),
                machine: scan.machine.clone(),
                root: scan.root.clone(),
                created_at: scan.created_at,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateName(scan.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn insert_file_rows(
        conn: &Connection,
        scan_id: i64,
        files: &[NewFile],
    ) -> Result<(), StoreError> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO files (scan_id, path, size, fastsum, sha1, hash_status, accessed, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for file in files {
            let size = i64::try_from(file.size).map_err(|_| StoreError::SizeOutOfRange(file.size))?;
            let path = path_to_bytes(&file.path);
            stmt.execute(params![
                scan_id,
                &*path,
                size,
                file.fastsum,
                file.hash.digest(),
                file.hash.status(),
                format_timestamp(&file.accessed),
                format_timestamp(&file.modified),
            ])?;
        }
        Ok(())
    }
}

impl IndexStore for SqliteStore {
    fn insert_scan(&self, scan: &NewScan) -> Result<Scan, StoreError> {
        if self.name_taken(&scan.name)? {
            return Err(StoreError::DuplicateName(scan.name.clone()));
        }
        let inserted = Self::insert_scan_row(&self.conn, scan)?;
        log::debug!("Inserted scan '{}' (id {})", inserted.name, inserted.id);
        Ok(inserted)
    }

    fn insert_files(&self, scan_id: i64, files: &[NewFile]) -> Result<(), StoreError> {
        if files.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        Self::insert_file_rows(&tx, scan_id, files)?;
        tx.commit()?;
        log::trace!("Committed {} file rows for scan {}", files.len(), scan_id);
        Ok(())
    }

    fn insert_scan_with_files(
        &self,
        scan: &NewScan,
        files: &[NewFile],
    ) -> Result<Scan, StoreError> {
        if self.name_taken(&scan.name)? {
            return Err(StoreError::DuplicateName(scan.name.clone()));
        }
        let tx = self.conn.unchecked_transaction()?;
        let inserted = Self::insert_scan_row(&tx, scan)?;
        Self::insert_file_rows(&tx, inserted.id, files)?;
        tx.commit()?;
        log::debug!(
            "Inserted scan '{}' with {} files in one transaction",
            inserted.name,
            files.len()
        );
        Ok(inserted)
    }

    fn delete_scan(&self, name: &str) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let file_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM files WHERE scan_id = (SELECT id FROM scans WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        let removed = tx.execute("DELETE FROM scans WHERE name = ?1", [name])?;
        if removed == 0 {
            return Err(StoreError::ScanNotFound(name.to_string()));
        }
        tx.commit()?;
        Ok(usize::try_from(file_count).unwrap_or_default())
    }

    fn scan_by_name(&self, name: &str) -> Result<Option<Scan>, StoreError> {
        self.query_scan(
            &format!("SELECT {SCAN_COLUMNS} FROM scans WHERE name = ?1"),
            [name],
        )
    }

    fn scan_by_id(&self, id: i64) -> Result<Option<Scan>, StoreError> {
        self.query_scan(&format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = ?1"), [id])
    }

    fn list_scans(&self) -> Result<Vec<ScanSummary>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.id, s.name, s.machine, s.root, s.created_at, COUNT(f.id)
             FROM scans s LEFT JOIN files f ON f.scan_id = s.id
             GROUP BY s.id ORDER BY s.id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((RawScan::from_row(row)?, row.get::<_, i64>(5)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(raw, count)| {
                Ok(ScanSummary {
                    scan: raw.into_scan()?,
                    file_count: u64::try_from(count).unwrap_or_default(),
                })
            })
            .collect()
    }

    fn files_for_scan(&self, scan_id: i64) -> Result<Vec<FileRecord>, StoreError> {
        self.query_files(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE scan_id = ?1 ORDER BY id"),
            [scan_id],
        )
    }

    fn files_by_hash(
        &self,
        hash: &str,
        scan_id: Option<i64>,
    ) -> Result<Vec<FileRecord>, StoreError> {
        self.query_files(
            &format!(
                "SELECT {FILE_COLUMNS} FROM files
                 WHERE sha1 = ?1 AND hash_status = 'computed' AND (?2 IS NULL OR scan_id = ?2)
                 ORDER BY id"
            ),
            params![hash, scan_id],
        )
    }

    fn duplicate_hashes(&self, scan_id: Option<i64>) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT sha1 FROM files
             WHERE hash_status = 'computed' AND sha1 IS NOT NULL AND (?1 IS NULL OR scan_id = ?1)
             GROUP BY sha1 HAVING COUNT(*) > 1
             ORDER BY MIN(id)",
        )?;
        let hashes = stmt
            .query_map([scan_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(hashes)
    }

    fn delete_file(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.conn.execute("DELETE FROM files WHERE id = ?1", [id])? > 0)
    }

    fn search_paths(&self, needle: &[u8]) -> Result<Vec<FileRecord>, StoreError> {
        self.query_files(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE instr(path, ?1) > 0 ORDER BY id"),
            [needle],
        )
    }

    fn recent_files(&self, limit: usize) -> Result<Vec<FileRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_files(
            &format!("SELECT {FILE_COLUMNS} FROM files ORDER BY accessed DESC, id DESC LIMIT ?1"),
            [limit],
        )
    }

    fn unindex(&self, prefix: &Path, strict: bool) -> Result<usize, StoreError> {
        let exact = path_to_bytes(prefix);
        let removed = if strict {
            self.conn
                .execute("DELETE FROM files WHERE path = ?1", [&*exact])?
        } else {
            let mut below = exact.to_vec();
            let separator = std::path::MAIN_SEPARATOR as u8;
            if below.last() != Some(&separator) {
                below.push(separator);
            }
            self.conn.execute(
                "DELETE FROM files WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
                params![&*exact, below],
            )?
        };
        Ok(removed)
    }

    fn stats(&self) -> Result<IndexStats, StoreError> {
        let (scans, files, total_bytes, hashed_files): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT (SELECT COUNT(*) FROM scans), COUNT(*), COALESCE(SUM(size), 0),
                        COUNT(CASE WHEN hash_status = 'computed' THEN 1 END)
                 FROM files",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        Ok(IndexStats {
            scans: u64::try_from(scans).unwrap_or_default(),
            files: u64::try_from(files).unwrap_or_default(),
            total_bytes: u64::try_from(total_bytes).unwrap_or_default(),
            hashed_files: u64::try_from(hashed_files).unwrap_or_default(),
        })
    }
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(
    table: &'static str,
    id: i64,
    column: &str,
    value: &str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            id,
            reason: format!("bad {column} timestamp '{value}': {e}"),
        })
}

struct RawScan {
    id: i64,
    name: String,
    machine: String,
    root: Vec<u8>,
    created_at: String,
}

impl RawScan {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            machine: row.get(2)?,
            root: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_scan(self) -> Result<Scan, StoreError> {
        let created_at = parse_timestamp("scans", self.id, "created_at", &self.created_at)?;
        Ok(Scan {
            id: self.id,
            name: self.name,
            machine: self.machine,
            root: path_from_bytes(self.root),
            created_at,
        })
    }
}

struct RawFile {
    id: i64,
    scan_id: i64,
    path: Vec<u8>,
    size: i64,
    fastsum: Option<String>,
    sha1: Option<String>,
    hash_status: String,
    accessed: String,
    modified: String,
}

impl RawFile {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scan_id: row.get(1)?,
            path: row.get(2)?,
            size: row.get(3)?,
            fastsum: row.get(4)?,
            sha1: row.get(5)?,
            hash_status: row.get(6)?,
            accessed: row.get(7)?,
            modified: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<FileRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            table: "files",
            id: self.id,
            reason,
        };
        let size = u64::try_from(self.size).map_err(|_| corrupt(format!("negative size {}", self.size)))?;
        let hash = HashState::from_parts(&self.hash_status, self.sha1.clone()).ok_or_else(|| {
            corrupt(format!("inconsistent hash status '{}'", self.hash_status))
        })?;
        let accessed = parse_timestamp("files", self.id, "accessed", &self.accessed)?;
        let modified = parse_timestamp("files", self.id, "modified", &self.modified)?;
        Ok(FileRecord {
            id: self.id,
            scan_id: self.scan_id,
            path: path_from_bytes(self.path),
            size,
            fastsum: self.fastsum,
            hash,
            accessed,
            modified,
        })
    }
}
