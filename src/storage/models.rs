//! Entity shapes persisted by an [`IndexStore`](super::IndexStore).

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A persisted traversal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Store-assigned identifier
    pub id: i64,
    /// Unique human-readable name
    pub name: String,
    /// Hostname of the machine that took the scan
    pub machine: String,
    /// Absolute root that was traversed
    pub root: PathBuf,
    /// Scan start time
    pub created_at: DateTime<Utc>,
}

/// Header fields for a scan that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub name: String,
    pub machine: String,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the strong-hash step for one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashState {
    /// Lowercase hex digest of the full content
    Computed(String),
    /// Not computed because the scan ran in fast mode
    Skipped,
    /// Reading the file failed part way
    Failed,
}

impl HashState {
    /// Status tag stored next to the digest.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Computed(_) => "computed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// The digest, if one was computed.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Computed(digest) => Some(digest),
            Self::Skipped | Self::Failed => None,
        }
    }

    /// Rebuild from a stored status tag and digest column.
    ///
    /// Returns `None` for an unknown tag or a `computed` row without digest.
    #[must_use]
    pub fn from_parts(status: &str, digest: Option<String>) -> Option<Self> {
        match (status, digest) {
            ("computed", Some(digest)) => Some(Self::Computed(digest)),
            ("skipped", _) => Some(Self::Skipped),
            ("failed", _) => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A file row ready to be inserted under some scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub path: PathBuf,
    pub size: u64,
    pub fastsum: Option<String>,
    pub hash: HashState,
    pub accessed: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A persisted file row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Store-assigned identifier, increasing in insertion order
    pub id: i64,
    /// Owning scan
    pub scan_id: i64,
    pub path: PathBuf,
    pub size: u64,
    pub fastsum: Option<String>,
    pub hash: HashState,
    pub accessed: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl FileRecord {
    /// Strong hash, if computed.
    #[must_use]
    pub fn sha1(&self) -> Option<&str> {
        self.hash.digest()
    }
}

/// A scan together with the number of files it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub scan: Scan,
    pub file_count: u64,
}

/// Aggregate counters over the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    /// Number of scans
    pub scans: u64,
    /// Number of file rows across all scans
    pub files: u64,
    /// Sum of file sizes
    pub total_bytes: u64,
    /// Rows with a computed strong hash
    pub hashed_files: u64,
}
