//! Duplicate grouping and the keep-first deletion policy.
//!
//! # Grouping
//!
//! Only computed strong hashes group files. Fastsums never decide
//! duplication, and rows whose hash was skipped or failed never appear in a
//! group. Groups are produced lazily, ordered by the first row carrying each
//! hash, and each group's members are in insertion order.
//!
//! # Deletion
//!
//! The first member of each group is kept. For every other member:
//!
//! - rows recorded on another machine are left alone
//! - a row naming the same file as a kept copy (same path recorded by two
//!   scans, or a path resolving to the same location) is left alone
//! - a file whose size or modification time no longer matches its row is
//!   left alone as modified
//! - a file already gone from disk has its row retracted
//! - otherwise the file is deleted and, on success, its row is retracted
//!
//! A kept copy that is gone from disk has its row retracted and the next
//! member takes its place. A group is skipped entirely when its kept copy
//! belongs to another machine or has changed since the scan. Filesystem
//! failures are logged and counted; processing always continues with the
//! next member. Storage failures abort.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::actions::delete::{delete_file, DeleteConfig, DeleteError, FileSnapshot};
use crate::index::local_machine_name;
use crate::progress::ProgressCallback;
use crate::storage::{FileRecord, IndexStore, StoreError};

use super::DuplicateGroup;

/// Lazy sequence of duplicate groups.
///
/// Each group is read from the store when requested, so rows retracted
/// while iterating are not returned by later groups.
pub struct DuplicateGroups<'a, S: IndexStore + ?Sized> {
    store: &'a S,
    scan_id: Option<i64>,
    hashes: std::vec::IntoIter<String>,
}

impl<S: IndexStore + ?Sized> Iterator for DuplicateGroups<'_, S> {
    type Item = Result<DuplicateGroup, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let hash = self.hashes.next()?;
            match self.store.files_by_hash(&hash, self.scan_id) {
                Ok(files) if files.len() > 1 => return Some(Ok(DuplicateGroup::new(hash, files))),
                Ok(_) => log::trace!("Hash {} no longer duplicated", hash),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Start a lazy walk over duplicate groups, optionally within one scan.
///
/// # Errors
///
/// Returns [`StoreError`] if the candidate hashes cannot be listed.
pub fn find_duplicate_groups<S: IndexStore + ?Sized>(
    store: &S,
    scan_id: Option<i64>,
) -> Result<DuplicateGroups<'_, S>, StoreError> {
    let hashes = store.duplicate_hashes(scan_id)?;
    log::debug!("{} hashes shared by two or more rows", hashes.len());
    Ok(DuplicateGroups {
        store,
        scan_id,
        hashes: hashes.into_iter(),
    })
}

/// Counters of a deletion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    /// Groups examined
    pub groups: usize,
    /// Groups skipped because their keeper could not be verified
    pub groups_skipped: usize,
    /// Files removed from disk (row retracted)
    pub deleted: usize,
    /// Files that would be removed (dry run)
    pub would_delete: usize,
    /// Rows retracted because the file was already gone
    pub missing: usize,
    /// Files left alone because they changed since the scan
    pub modified: usize,
    /// Rows left alone because they belong to another machine
    pub foreign: usize,
    /// Rows naming the same file as a kept copy
    pub aliases: usize,
    /// Filesystem failures
    pub failed: usize,
    /// Bytes freed (or that would be freed in a dry run)
    pub bytes_freed: u64,
    /// Failed paths with their error
    pub failures: Vec<(PathBuf, String)>,
}

impl ResolveReport {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

/// Applies the keep-first policy to the groups of an [`IndexStore`].
pub struct DuplicateResolver<'a, S: IndexStore + ?Sized> {
    store: &'a S,
    scan_id: Option<i64>,
    machine: String,
    progress: Option<Arc<dyn ProgressCallback>>,
    machine_cache: HashMap<i64, String>,
}

impl<'a, S: IndexStore + ?Sized> DuplicateResolver<'a, S> {
    /// Resolver over the whole index, acting as the local host.
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            scan_id: None,
            machine: local_machine_name(),
            progress: None,
            machine_cache: HashMap::new(),
        }
    }

    /// Restrict grouping to one scan.
    #[must_use]
    pub fn for_scan(mut self, scan_id: Option<i64>) -> Self {
        self.scan_id = scan_id;
        self
    }

    #[must_use]
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The groups this resolver would act on.
    ///
    /// # Errors
    ///
    /// See [`find_duplicate_groups`].
    pub fn groups(&self) -> Result<DuplicateGroups<'a, S>, StoreError> {
        find_duplicate_groups(self.store, self.scan_id)
    }

    /// Delete every redundant copy.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned; filesystem failures are counted
    /// in the report.
    pub fn delete_duplicates(&mut self, config: &DeleteConfig) -> Result<ResolveReport, StoreError> {
        let mut report = ResolveReport::default();
        if let Some(progress) = &self.progress {
            progress.on_phase_start("deleting", 0);
        }

        let mut processed = 0usize;
        for group in self.groups()? {
            let group = group?;
            report.groups += 1;
            self.resolve_group(&group, config, &mut report, &mut processed)?;
        }

        if let Some(progress) = &self.progress {
            progress.on_phase_end("deleting");
        }
        log::info!(
            "Duplicates: {} groups, {} deleted, {} missing, {} modified, {} foreign, {} failed",
            report.groups,
            if config.dry_run { report.would_delete } else { report.deleted },
            report.missing,
            report.modified,
            report.foreign,
            report.failed
        );
        Ok(report)
    }

    fn resolve_group(
        &mut self,
        group: &DuplicateGroup,
        config: &DeleteConfig,
        report: &mut ResolveReport,
        processed: &mut usize,
    ) -> Result<(), StoreError> {
        let mut members = group.files.iter();
        let keeper = loop {
            let Some(candidate) = members.next() else {
                log::debug!("Group {}: every copy is gone from disk", group.hash);
                return Ok(());
            };
            if !self.is_local(candidate)? {
                log::info!(
                    "Skipping group {}: kept copy {} is on another machine",
                    group.hash,
                    candidate.path.display()
                );
                report.groups_skipped += 1;
                return Ok(());
            }
            match FileSnapshot::capture(&candidate.path)
                .and_then(|s| s.verify(candidate.size, &candidate.modified))
            {
                Ok(()) => break candidate,
                // the next copy in insertion order becomes the kept one
                Err(DeleteError::NotFound(_)) => self.retract_missing(candidate, config, report)?,
                Err(e) => {
                    log::warn!(
                        "Skipping group {}: kept copy cannot be verified ({})",
                        group.hash,
                        e
                    );
                    report.groups_skipped += 1;
                    return Ok(());
                }
            }
        };

        let mut kept: HashSet<PathBuf> = HashSet::new();
        kept.insert(identity(&keeper.path));

        for member in members {
            *processed += 1;
            if let Some(progress) = &self.progress {
                progress.on_progress(*processed, &member.path.to_string_lossy());
            }

            if !self.is_local(member)? {
                log::debug!("Not touching {}: recorded on another machine", member.path.display());
                report.foreign += 1;
                continue;
            }
            if kept.contains(&member.path) || kept.contains(&identity(&member.path)) {
                log::debug!("Not touching {}: same file as a kept copy", member.path.display());
                report.aliases += 1;
                continue;
            }

            match FileSnapshot::capture(&member.path).and_then(|s| s.verify(member.size, &member.modified)) {
                Ok(()) => {}
                Err(DeleteError::NotFound(_)) => {
                    self.retract_missing(member, config, report)?;
                    continue;
                }
                Err(DeleteError::Modified(_)) => {
                    report.modified += 1;
                    kept.insert(identity(&member.path));
                    continue;
                }
                Err(e) => {
                    record_failure(report, &member.path, &e);
                    kept.insert(identity(&member.path));
                    continue;
                }
            }

            if config.dry_run {
                log::info!("Would delete {} (duplicate of {})", member.path.display(), keeper.path.display());
                report.would_delete += 1;
                report.bytes_freed += member.size;
                continue;
            }

            match delete_file(&member.path, config) {
                Ok(result) => {
                    self.store.delete_file(member.id)?;
                    report.deleted += 1;
                    report.bytes_freed += result.size;
                    if let Some(progress) = &self.progress {
                        progress.on_item_completed(result.size);
                    }
                }
                Err(DeleteError::NotFound(_)) => self.retract_missing(member, config, report)?,
                Err(e) => {
                    record_failure(report, &member.path, &e);
                    kept.insert(identity(&member.path));
                }
            }
        }
        Ok(())
    }

    fn retract_missing(
        &self,
        member: &FileRecord,
        config: &DeleteConfig,
        report: &mut ResolveReport,
    ) -> Result<(), StoreError> {
        log::info!("Already gone: {}", member.path.display());
        if !config.dry_run {
            self.store.delete_file(member.id)?;
        }
        report.missing += 1;
        Ok(())
    }

    fn is_local(&mut self, record: &FileRecord) -> Result<bool, StoreError> {
        if let Some(machine) = self.machine_cache.get(&record.scan_id) {
            return Ok(*machine == self.machine);
        }
        let machine = self
            .store
            .scan_by_id(record.scan_id)?
            .map(|scan| scan.machine)
            .unwrap_or_default();
        let local = machine == self.machine;
        self.machine_cache.insert(record.scan_id, machine);
        Ok(local)
    }
}

fn record_failure(report: &mut ResolveReport, path: &Path, error: &DeleteError) {
    log::warn!("Failed to delete {}: {}", path.display(), error);
    report.failed += 1;
    report.failures.push((path.to_path_buf(), error.to_string()));
}

/// Canonical location of a path, or the path itself if it cannot be
/// resolved.
fn identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
