//! Index interchange documents.
//!
//! A scan is exported as one JSON document holding its header and every
//! file row in insertion order:
//!
//! ```json
//! {
//!   "name": "photos-202401020304",
//!   "machine_name": "laptop",
//!   "root_directory": "/home/me/photos",
//!   "created_at": "2024-01-02T03:04:05.123456Z",
//!   "files": [
//!     { "path": "/home/me/photos/a.jpg", "size": 1234, "sha1": "…",
//!       "fastsum": "ffd8ffe000104a46", "accessed": "…", "modified": "…" }
//!   ]
//! }
//! ```
//!
//! Timestamps are RFC 3339. On import the fractional seconds are discarded
//! before parsing, and zone-less timestamps are read as UTC. A file whose
//! hash failed carries `"hash_failed": true`; the key is omitted otherwise.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::{FileRecord, HashState, IndexStore, NewFile, NewScan, Scan, StoreError};

/// Errors from exporting or importing an index document.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not JSON, or a required field is missing or mistyped.
    #[error("Malformed index document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed index document: {0}")]
    Invalid(String),

    #[error("Path is not valid UTF-8 and cannot be exported: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One exported file row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub path: String,
    pub size: u64,
    #[serde(default, deserialize_with = "legacy_sha1")]
    pub sha1: Option<String>,
    pub fastsum: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hash_failed: bool,
    pub accessed: String,
    pub modified: String,
}

/// Exported scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub name: String,
    pub machine_name: String,
    pub root_directory: String,
    pub created_at: String,
    pub files: Vec<DocumentFile>,
}

impl IndexDocument {
    /// Build the document for one scan and its rows.
    ///
    /// # Errors
    ///
    /// [`TransferError::NonUtf8Path`] if the root or any path cannot be
    /// represented as a JSON string.
    pub fn from_scan(scan: &Scan, files: &[FileRecord]) -> Result<Self, TransferError> {
        let files = files
            .iter()
            .map(|record| {
                Ok(DocumentFile {
                    path: utf8_path(&record.path)?,
                    size: record.size,
                    sha1: record.sha1().map(str::to_string),
                    fastsum: record.fastsum.clone(),
                    hash_failed: record.hash == HashState::Failed,
                    accessed: format_timestamp(&record.accessed),
                    modified: format_timestamp(&record.modified),
                })
            })
            .collect::<Result<Vec<_>, TransferError>>()?;

        Ok(Self {
            name: scan.name.clone(),
            machine_name: scan.machine.clone(),
            root_directory: utf8_path(&scan.root)?,
            created_at: format_timestamp(&scan.created_at),
            files,
        })
    }

    /// Decode into insertable rows, validating every field first.
    ///
    /// # Errors
    ///
    /// [`TransferError::Invalid`] for a bad timestamp, a `sha1` that is
    /// neither a digest nor a known placeholder, a digest marked failed, or
    /// a path listed twice.
    pub fn to_rows(&self) -> Result<(NewScan, Vec<NewFile>), TransferError> {
        if self.name.trim().is_empty() {
            return Err(TransferError::Invalid("empty scan name".to_string()));
        }
        let scan = NewScan {
            name: self.name.clone(),
            machine: self.machine_name.clone(),
            root: PathBuf::from(&self.root_directory),
            created_at: parse_timestamp(&self.created_at)?,
        };

        let mut seen = HashSet::with_capacity(self.files.len());
        let mut files = Vec::with_capacity(self.files.len());
        for file in &self.files {
            if !seen.insert(file.path.as_str()) {
                return Err(TransferError::Invalid(format!(
                    "path listed twice: {}",
                    file.path
                )));
            }
            let hash = decode_hash(&file.path, file.sha1.as_deref(), file.hash_failed)?;
            files.push(NewFile {
                path: PathBuf::from(&file.path),
                size: file.size,
                fastsum: file.fastsum.clone(),
                hash,
                accessed: parse_timestamp(&file.accessed)?,
                modified: parse_timestamp(&file.modified)?,
            });
        }
        Ok((scan, files))
    }

    /// Write the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// [`TransferError::Write`] on I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), TransferError> {
        let write_err = |source| TransferError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(write_err)
    }

    /// Serialize to any writer.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Json`] if writing fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TransferError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a document from a JSON file.
    ///
    /// # Errors
    ///
    /// [`TransferError::Read`] if the file cannot be opened,
    /// [`TransferError::Json`] if it is not a valid document.
    pub fn load(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path).map_err(|source| TransferError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Placeholders written by older fili versions instead of a digest.
const NOT_COMPUTED_MARKERS: &[&str] = &["", "null", "None"];
const FAILED_MARKERS: &[&str] = &["false", "False"];

/// Older documents carry a failed hash as JSON `false`.
fn legacy_sha1<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Flag(bool),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Text(text)) => Ok(Some(text)),
        Some(Raw::Flag(false)) => Ok(Some("false".to_string())),
        Some(Raw::Flag(true)) => Err(D::Error::custom("sha1 cannot be `true`")),
    }
}

fn is_sha1_hex(digest: &str) -> bool {
    digest.len() == 40 && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Hash state of one document row.
///
/// Only a 40-digit lowercase hex digest becomes a computed hash, so
/// placeholders never group unrelated files as duplicates.
fn decode_hash(path: &str, sha1: Option<&str>, hash_failed: bool) -> Result<HashState, TransferError> {
    let not_computed = if hash_failed {
        HashState::Failed
    } else {
        HashState::Skipped
    };
    match sha1 {
        None => Ok(not_computed),
        Some(marker) if NOT_COMPUTED_MARKERS.contains(&marker) => Ok(not_computed),
        Some(marker) if FAILED_MARKERS.contains(&marker) => Ok(HashState::Failed),
        Some(digest) if is_sha1_hex(digest) => {
            if hash_failed {
                Err(TransferError::Invalid(format!(
                    "{path} has a hash but is marked hash_failed"
                )))
            } else {
                Ok(HashState::Computed(digest.to_string()))
            }
        }
        Some(other) => Err(TransferError::Invalid(format!(
            "{path}: sha1 {other:?} is not a 40-digit lowercase hex digest"
        ))),
    }
}

/// Export the named scan.
///
/// # Errors
///
/// [`StoreError::ScanNotFound`] (wrapped) if no scan has that name, or
/// [`TransferError::NonUtf8Path`].
pub fn export_scan<S: IndexStore + ?Sized>(store: &S, name: &str) -> Result<IndexDocument, TransferError> {
    let scan = store
        .scan_by_name(name)?
        .ok_or_else(|| StoreError::ScanNotFound(name.to_string()))?;
    let files = store.files_for_scan(scan.id)?;
    log::debug!("Exporting '{}' with {} files", scan.name, files.len());
    IndexDocument::from_scan(&scan, &files)
}

/// Import a document as a new scan.
///
/// The whole document is validated before anything is written, and the
/// header and rows are then inserted in one transaction.
///
/// # Errors
///
/// [`StoreError::DuplicateName`] (wrapped) if the name exists, or any
/// validation error from [`IndexDocument::to_rows`].
pub fn import_scan<S: IndexStore + ?Sized>(store: &S, document: &IndexDocument) -> Result<Scan, TransferError> {
    let (scan, files) = document.to_rows()?;
    let inserted = store.insert_scan_with_files(&scan, &files)?;
    log::info!(
        "Imported '{}' from {} with {} files",
        inserted.name,
        inserted.machine,
        files.len()
    );
    Ok(inserted)
}

fn utf8_path(path: &Path) -> Result<String, TransferError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| TransferError::NonUtf8Path(path.to_path_buf()))
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 timestamp, ignoring any fractional seconds.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TransferError> {
    let trimmed = strip_fraction(value.trim());
    if let Ok(at) = DateTime::parse_from_rfc3339(&trimmed) {
        return Ok(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TransferError::Invalid(format!("bad timestamp '{value}'")))
}

/// Drop a `.digits` run following the seconds field.
fn strip_fraction(value: &str) -> String {
    match value.find('.') {
        Some(dot) => {
            let rest = &value[dot + 1..];
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            format!("{}{}", &value[..dot], &rest[digits..])
        }
        None => value.to_string(),
    }
}
