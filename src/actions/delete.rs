//! File deletion using the trash crate.
//!
//! Duplicates are moved to the system trash unless permanent deletion is
//! requested. Before anything is removed the caller checks the file against
//! its index row with [`FileSnapshot`].
//!
//! ```no_run
//! use fili::actions::delete::{delete_file, DeleteConfig};
//! use std::path::Path;
//!
//! match delete_file(Path::new("/path/to/duplicate.txt"), &DeleteConfig::trash()) {
//!     Ok(result) => println!("Removed {} ({} bytes)", result.path.display(), result.size),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file on disk no longer matches its index row.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    #[error("permanent delete failed for {path}: {source}")]
    PermanentDeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Modified(p) => p,
            Self::TrashFailed { path, .. }
            | Self::PermanentDeleteFailed { path, .. }
            | Self::Io { path, .. } => path,
        }
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

/// How duplicates are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Use permanent deletion instead of trash.
    pub permanent: bool,
    /// Report what would be deleted without touching the filesystem or the
    /// index.
    pub dry_run: bool,
}

impl DeleteConfig {
    /// Create config for trash deletion.
    #[must_use]
    pub fn trash() -> Self {
        Self::default()
    }

    /// Create config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            permanent: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// On-disk state of a file, compared against its index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub path: PathBuf,
    pub size: u64,
    /// Last modification time, if the platform reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl FileSnapshot {
    /// Stat the file now.
    ///
    /// # Errors
    ///
    /// `NotFound` if the file is gone, `PermissionDenied` or `Io` otherwise.
    pub fn capture(path: &Path) -> Result<Self, DeleteError> {
        let metadata = fs::metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Check the file still has the size and modification time recorded at
    /// scan time.
    ///
    /// Times are compared to the second, since imported rows carry no
    /// fractional seconds.
    ///
    /// # Errors
    ///
    /// [`DeleteError::Modified`] when either differs.
    pub fn verify(&self, size: u64, modified: &DateTime<Utc>) -> Result<(), DeleteError> {
        if self.size != size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                size,
                self.size
            );
            return Err(DeleteError::Modified(self.path.clone()));
        }
        if let Some(current) = self.modified {
            if current.timestamp() != modified.timestamp() {
                log::warn!(
                    "File modified since scan: {} (mtime changed from {} to {})",
                    self.path.display(),
                    modified,
                    current
                );
                return Err(DeleteError::Modified(self.path.clone()));
            }
        }
        Ok(())
    }
}

/// Move a file to the system trash.
///
/// # Errors
///
/// `NotFound`, `PermissionDenied` or `TrashFailed`.
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = FileSnapshot::capture(path)?.size;

    trash::delete(path).map_err(|e| DeleteError::TrashFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: false,
    })
}

/// Permanently delete a file. This cannot be undone.
///
/// # Errors
///
/// `NotFound`, `PermissionDenied` or `PermanentDeleteFailed`.
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = FileSnapshot::capture(path)?.size;

    fs::remove_file(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DeleteError::NotFound(path.to_path_buf()),
        _ => DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            source,
        },
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: true,
    })
}

/// Delete one file the way `config` asks.
///
/// `dry_run` is the caller's business; this always deletes.
///
/// # Errors
///
/// See [`delete_to_trash`] and [`permanent_delete`].
pub fn delete_file(path: &Path, config: &DeleteConfig) -> Result<DeleteResult, DeleteError> {
    if config.permanent {
        permanent_delete(path)
    } else {
        delete_to_trash(path)
    }
}
