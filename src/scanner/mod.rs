//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Sorted directory walking using walkdir
//! - The constant-time sampled fingerprint ("fastsum")
//! - Streaming SHA-1 content hashing
//! - Path-prefix exclusion rules for pseudo filesystems and caches
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal yielding candidate file paths
//! - [`exclude`]: Ordered prefix rules evaluated by the caller
//! - [`fastsum`]: Sampled-byte heuristic fingerprint
//! - [`hasher`]: SHA-1 file hashing (streaming)
//! - [`path_utils`]: Root normalization and relativization
//!
//! # Example
//!
//! ```no_run
//! use fili::scanner::{ExclusionRules, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let rules = ExclusionRules::new(vec!["/proc".to_string()]);
//! let walker = Walker::new(Path::new("/"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) if !rules.is_excluded(&path) => println!("{}", path.display()),
//!         Ok(_) => {}
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod exclude;
pub mod fastsum;
pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

pub use exclude::ExclusionRules;
pub use fastsum::{fastsum, DEFAULT_FASTSUM_LENGTH};
pub use hasher::{sha1_file, Hasher, CHUNK_SIZE};
pub use walker::Walker;

/// Metadata captured for a file at scan time.
///
/// Timestamps are copied from the filesystem once and never re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last access time
    pub accessed: DateTime<Utc>,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl FileInfo {
    /// Stat `path` and capture its size and timestamps.
    ///
    /// Platforms that do not report an access time fall back to the
    /// modification time; a missing modification time becomes the epoch.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] if the file vanished or cannot be accessed.
    pub fn capture(path: &Path) -> Result<Self, ScanError> {
        let metadata = std::fs::metadata(path).map_err(|e| ScanError::from_io(path, e))?;
        Ok(Self::from_metadata(path.to_path_buf(), &metadata))
    }

    /// Build from already-fetched metadata.
    #[must_use]
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let accessed = metadata.accessed().unwrap_or(modified);
        Self {
            path,
            size: metadata.len(),
            accessed: DateTime::<Utc>::from(accessed),
            modified: DateTime::<Utc>::from(modified),
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Descend into subdirectories. When false only the root's direct
    /// children are yielded.
    pub recurse: bool,

    /// Follow symbolic links during traversal.
    /// Cycles are detected by walkdir and the looping subtree is dropped.
    pub follow_symlinks: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            recurse: true,
            follow_symlinks: false,
        }
    }
}

impl WalkerConfig {
    /// Single-level configuration (direct children of the root only).
    #[must_use]
    pub fn single_level() -> Self {
        Self {
            recurse: false,
            ..Self::default()
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A symbolic link points back into one of its ancestors.
    #[error("Symlink loop at {0}")]
    SymlinkLoop(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error raised for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::SymlinkLoop(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The sample length must be at least one byte.
    #[error("Invalid fastsum length: {0}")]
    InvalidLength(usize),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
