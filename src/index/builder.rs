//! Scan builder: walks a root and persists one row per surviving file.
//!
//! # Lifecycle
//!
//! A scan is *pending* until its header row is inserted, *running* while
//! file batches are committed, and *complete* when the walk is exhausted.
//! Completion is not persisted. A crash or Ctrl+C leaves the header with the
//! batches committed so far.
//!
//! # Ordering
//!
//! Paths are read from the walker in sorted order and grouped into batches.
//! Each batch is fingerprinted on a bounded rayon pool and collected back in
//! walk order, so file row ids follow the walk regardless of which worker
//! finished first.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::progress::ProgressCallback;
use crate::scanner::path_utils::{default_scan_name, normalize_root};
use crate::scanner::{
    fastsum, ExclusionRules, FileInfo, Hasher, Walker, WalkerConfig, DEFAULT_FASTSUM_LENGTH,
};
use crate::storage::{HashState, IndexStore, NewFile, NewScan, Scan, StoreError};

use super::local_machine_name;

/// Options for one scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Scan name; derived from the root and the current minute when `None`.
    pub name: Option<String>,
    /// Skip the strong hash, keeping only the fastsum.
    pub fast: bool,
    /// Descend into subdirectories.
    pub recurse: bool,
    /// Walk through symbolic links; cycles are skipped.
    pub follow_symlinks: bool,
    /// Bytes sampled by the fastsum.
    pub fastsum_length: usize,
    /// Fingerprinting worker threads.
    pub io_threads: usize,
    /// Files per committed batch.
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            name: None,
            fast: false,
            recurse: true,
            follow_symlinks: false,
            fastsum_length: DEFAULT_FASTSUM_LENGTH,
            io_threads: 4,
            batch_size: 256,
        }
    }
}

/// Per-run counters. Every path the walker produced lands in exactly one of
/// `indexed`, `excluded` or `skipped`; `hash_failed` is a subset of
/// `indexed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Rows inserted
    pub indexed: u64,
    /// Entries matching an exclusion rule (a pruned directory counts once)
    pub excluded: u64,
    /// Walk or stat failures
    pub skipped: u64,
    /// Rows recorded with a failed fingerprint
    pub hash_failed: u64,
    /// Sum of indexed file sizes
    pub bytes: u64,
    /// The run stopped early on a shutdown request
    pub interrupted: bool,
}

impl ScanStats {
    /// Whether anything was skipped or failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.skipped > 0 || self.hash_failed > 0
    }
}

/// Result of a finished (or interrupted) run.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan: Scan,
    pub stats: ScanStats,
}

/// Errors that abort a scan run.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("Scan root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Cannot resolve scan root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rescans only make sense on the machine that owns the paths.
    #[error("Scan '{name}' was taken on '{machine}', not on this machine ('{local}')")]
    ForeignMachine {
        name: String,
        machine: String,
        local: String,
    },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

enum Fingerprint {
    Indexed { file: NewFile, failed: bool },
    Skipped,
}

/// Drives the walker and fingerprinting into an [`IndexStore`].
pub struct ScanBuilder<'a, S: IndexStore + ?Sized> {
    store: &'a S,
    rules: ExclusionRules,
    machine: String,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<'a, S: IndexStore + ?Sized> ScanBuilder<'a, S> {
    /// Builder recording scans under the local hostname.
    #[must_use]
    pub fn new(store: &'a S, rules: ExclusionRules) -> Self {
        Self {
            store,
            rules,
            machine: local_machine_name(),
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Record scans under `machine` instead of the local hostname.
    #[must_use]
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Create a new scan of `root` and index every surviving file.
    ///
    /// # Errors
    ///
    /// - [`BuildError::NotADirectory`] / [`BuildError::Root`] for a bad root
    /// - [`StoreError::DuplicateName`] (wrapped) if the name is taken; the
    ///   existing scan is untouched
    /// - any storage failure while committing a batch
    ///
    /// Per-file failures are counted in [`ScanStats`], never returned.
    pub fn create_scan(&self, root: &Path, options: &ScanOptions) -> Result<ScanReport, BuildError> {
        let root = resolve_root(root)?;
        let created_at = Local::now();
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| default_scan_name(&root, &created_at));

        let scan = self.store.insert_scan(&NewScan {
            name,
            machine: self.machine.clone(),
            root,
            created_at: created_at.with_timezone(&Utc),
        })?;
        log::info!("Indexing {} as '{}'", scan.root.display(), scan.name);

        let stats = self.populate(&scan, options)?;
        log::info!(
            "Scan '{}': {} indexed, {} excluded, {} skipped, {} fingerprint failures{}",
            scan.name,
            stats.indexed,
            stats.excluded,
            stats.skipped,
            stats.hash_failed,
            if stats.interrupted { " (interrupted)" } else { "" }
        );
        Ok(ScanReport { scan, stats })
    }

    /// Rescan an existing scan's root, replacing its rows under the same
    /// name.
    ///
    /// The old scan is deleted only after the root has been checked, but
    /// the replacement is not atomic: a failure afterwards leaves the new,
    /// incomplete scan.
    ///
    /// # Errors
    ///
    /// [`StoreError::ScanNotFound`] (wrapped), [`BuildError::ForeignMachine`]
    /// when the scan belongs to another host, plus everything
    /// [`create_scan`](Self::create_scan) reports.
    pub fn update_scan(&self, name: &str, options: &ScanOptions) -> Result<ScanReport, BuildError> {
        let existing = self
            .store
            .scan_by_name(name)?
            .ok_or_else(|| StoreError::ScanNotFound(name.to_string()))?;

        if existing.machine != self.machine {
            return Err(BuildError::ForeignMachine {
                name: existing.name,
                machine: existing.machine,
                local: self.machine.clone(),
            });
        }
        let root = resolve_root(&existing.root)?;

        let removed = self.store.delete_scan(name)?;
        log::debug!("Removed {} rows of '{}' before rescanning", removed, name);

        let options = ScanOptions {
            name: Some(existing.name),
            ..options.clone()
        };
        self.create_scan(&root, &options)
    }

    fn populate(&self, scan: &Scan, options: &ScanOptions) -> Result<ScanStats, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.io_threads.max(1))
            .build()?;
        let hasher = Hasher::new();
        let batch_size = options.batch_size.max(1);

        let mut walker = Walker::new(
            &scan.root,
            WalkerConfig {
                recurse: options.recurse,
                follow_symlinks: options.follow_symlinks,
            },
        );
        if let Some(flag) = &self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        if let Some(progress) = &self.progress {
            progress.on_phase_start("indexing", 0);
        }

        let mut stats = ScanStats::default();
        let excluded = Cell::new(0u64);
        let mut batch: Vec<PathBuf> = Vec::with_capacity(batch_size);

        let entries = walker.walk_filtered(|path| match self.rules.matching_rule(path) {
            Some(rule) => {
                log::trace!("Excluded {} (rule {})", path.display(), rule.display());
                excluded.set(excluded.get() + 1);
                false
            }
            None => true,
        });

        for entry in entries {
            match entry {
                Ok(path) => batch.push(path),
                Err(_) => stats.skipped += 1,
            }
            if batch.len() >= batch_size {
                if self.is_shutdown_requested() {
                    break;
                }
                self.flush(&pool, &hasher, scan, options, &mut batch, &mut stats)?;
            }
        }

        if self.is_shutdown_requested() {
            stats.interrupted = true;
            if !batch.is_empty() {
                log::info!(
                    "Interrupted: {} walked files in the open batch were not indexed",
                    batch.len()
                );
            }
        } else {
            self.flush(&pool, &hasher, scan, options, &mut batch, &mut stats)?;
        }
        stats.excluded = excluded.get();

        if let Some(progress) = &self.progress {
            progress.on_phase_end("indexing");
        }
        Ok(stats)
    }

    /// Fingerprint and commit one batch, in walk order.
    fn flush(
        &self,
        pool: &rayon::ThreadPool,
        hasher: &Hasher,
        scan: &Scan,
        options: &ScanOptions,
        batch: &mut Vec<PathBuf>,
        stats: &mut ScanStats,
    ) -> Result<(), BuildError> {
        if batch.is_empty() {
            return Ok(());
        }

        let results: Vec<Fingerprint> = pool.install(|| {
            batch
                .par_iter()
                .map(|path| fingerprint(path, hasher, options))
                .collect()
        });

        let mut files = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Fingerprint::Indexed { file, failed } => {
                    stats.indexed += 1;
                    stats.bytes += file.size;
                    if failed {
                        stats.hash_failed += 1;
                    }
                    if let Some(progress) = &self.progress {
                        progress.on_progress(stats.indexed as usize, &file.path.to_string_lossy());
                        progress.on_item_completed(file.size);
                    }
                    files.push(file);
                }
                Fingerprint::Skipped => stats.skipped += 1,
            }
        }

        self.store.insert_files(scan.id, &files)?;
        log::debug!("Committed batch of {} files to '{}'", files.len(), scan.name);
        batch.clear();
        Ok(())
    }
}

/// Stat and fingerprint one file.
///
/// A stat failure skips the file. A fingerprint failure still records the
/// file, with no fastsum and a failed hash state.
fn fingerprint(path: &Path, hasher: &Hasher, options: &ScanOptions) -> Fingerprint {
    let info = match FileInfo::capture(path) {
        Ok(info) => info,
        Err(e) => {
            log::warn!("Skipping {}: {}", path.display(), e);
            return Fingerprint::Skipped;
        }
    };

    let (fastsum, hash) = match fastsum(path, options.fastsum_length) {
        Ok(sum) if options.fast => (sum, HashState::Skipped),
        Ok(sum) => match hasher.full_hash(path) {
            Ok(digest) => (sum, HashState::Computed(digest)),
            Err(e) => {
                log::warn!("Hash failed for {}: {}", path.display(), e);
                (sum, HashState::Failed)
            }
        },
        Err(e) => {
            log::warn!("Fastsum failed for {}: {}", path.display(), e);
            (None, HashState::Failed)
        }
    };
    log::trace!("Fingerprinted {}", path.display());

    let failed = hash == HashState::Failed;
    Fingerprint::Indexed {
        file: NewFile {
            path: info.path,
            size: info.size,
            fastsum,
            hash,
            accessed: info.accessed,
            modified: info.modified,
        },
        failed,
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf, BuildError> {
    let normalized = normalize_root(root).map_err(|source| BuildError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    if !normalized.is_dir() {
        return Err(BuildError::NotADirectory(normalized));
    }
    Ok(normalized)
}
