//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! [`Walker`] yields the absolute paths of regular files under a root, in a
//! deterministic order (entries sorted by file name at every level). Each
//! call to [`Walker::walk`] performs a fresh traversal; nothing is
//! checkpointed.
//!
//! # Error handling
//!
//! Unreadable directories and symlink loops are reported as [`ScanError`]
//! items and their subtree is dropped. Iteration always continues with the
//! next sibling.
//!
//! # Example
//!
//! ```no_run
//! use fili::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::{ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// Once the flag is `true` the iterator ends at the next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root this walker traverses.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding file paths.
    ///
    /// Directories, sockets, FIFOs and device nodes are not yielded.
    /// Symlinks are skipped unless `follow_symlinks` is set, in which case
    /// the link target's type decides.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        self.walk_filtered(|_| true)
    }

    /// Walk the tree, consulting `keep` for every entry before it is
    /// yielded or descended into.
    ///
    /// When `keep` returns `false` for a directory its whole subtree is
    /// pruned. The walker attaches no meaning to the predicate; callers use
    /// it to apply their exclusion rules without visiting excluded trees.
    pub fn walk_filtered<'a, P>(
        &'a self,
        mut keep: P,
    ) -> impl Iterator<Item = Result<PathBuf, ScanError>> + 'a
    where
        P: FnMut(&Path) -> bool + 'a,
    {
        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .min_depth(1);
        if !self.config.recurse {
            walk_dir = walk_dir.max_depth(1);
        }

        walk_dir
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || keep(entry.path()))
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }
                    if !file_type.is_file() {
                        log::trace!("Skipping special file: {}", entry.path().display());
                        return None;
                    }
                    Some(Ok(entry.into_path()))
                }
                Err(e) => Some(Err(self.convert_error(e))),
            })
    }

    fn convert_error(&self, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if error.loop_ancestor().is_some() {
            log::warn!("Skipping symlink loop: {}", path.display());
            return ScanError::SymlinkLoop(path);
        }

        match error.into_io_error() {
            Some(io_error) => {
                let scan_error = ScanError::from_io(&path, io_error);
                match scan_error {
                    ScanError::NotFound(_) => {
                        log::debug!("Vanished during walk: {}", path.display());
                    }
                    _ => log::warn!("Skipping {}: {}", path.display(), scan_error),
                }
                scan_error
            }
            None => ScanError::Io {
                path,
                source: std::io::Error::other("directory walk failed"),
            },
        }
    }
}
