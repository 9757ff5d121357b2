//! JSON output for `dupes list` and `index diff`.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     { "hash": "da39a3ee...", "size": 1024, "files": ["/keep/me", "/delete/me"] }
//!   ],
//!   "summary": {
//!     "groups": 1,
//!     "files": 2,
//!     "wasted_bytes": 1024,
//!     "exit_code": 0,
//!     "exit_code_name": "FI000"
//!   }
//! }
//! ```
//!
//! The first file of each group is the one deletion keeps.

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{DuplicateGroup, GroupSummary};
use crate::error::ExitCode;
use crate::index::{DiffSummary, FilePair, ScanDiff};
use crate::storage::FileRecord;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// SHA-1 as lowercase hex (40 characters)
    pub hash: String,
    /// Size of one copy in bytes
    pub size: u64,
    /// Member paths, keeper first
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    #[must_use]
    pub fn from_group(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.hash.clone(),
            size: group.size(),
            files: group.files.iter().map(display_path).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonGroupSummary {
    pub groups: usize,
    pub files: usize,
    pub wasted_bytes: u64,
    pub exit_code: i32,
    /// Machine-readable exit code name (e.g., "FI002")
    pub exit_code_name: String,
}

/// Complete `dupes list` document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicates {
    pub duplicates: Vec<JsonDuplicateGroup>,
    pub summary: JsonGroupSummary,
}

impl JsonDuplicates {
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], summary: &GroupSummary, exit_code: ExitCode) -> Self {
        Self {
            duplicates: groups.iter().map(JsonDuplicateGroup::from_group).collect(),
            summary: JsonGroupSummary {
                groups: summary.groups,
                files: summary.files,
                wasted_bytes: summary.wasted_bytes,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// A paired file in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonPair {
    pub reference: String,
    pub other: String,
}

impl JsonPair {
    fn from_pair(pair: &FilePair) -> Self {
        Self {
            reference: display_path(&pair.reference),
            other: display_path(&pair.other),
        }
    }
}

/// Complete `index diff` document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDiff {
    pub reference: String,
    pub other: String,
    pub unchanged: Vec<JsonPair>,
    pub moved: Vec<JsonPair>,
    pub only_in_reference: Vec<String>,
    pub only_in_other: Vec<String>,
    pub summary: DiffSummary,
}

impl JsonDiff {
    #[must_use]
    pub fn new(diff: &ScanDiff) -> Self {
        Self {
            reference: diff.reference.name.clone(),
            other: diff.other.name.clone(),
            unchanged: diff.unchanged.iter().map(JsonPair::from_pair).collect(),
            moved: diff.moved.iter().map(JsonPair::from_pair).collect(),
            only_in_reference: diff.only_in_reference.iter().map(display_path).collect(),
            only_in_other: diff.only_in_other.iter().map(display_path).collect(),
            summary: diff.summary(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// Write any serializable value followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn display_path(file: &FileRecord) -> String {
    file.path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
