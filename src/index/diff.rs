//! Comparing two scans of possibly different machines.
//!
//! Files are paired in two passes over the reference scan, in row order:
//!
//! 1. When the reference file has a strong hash, it pairs with an unpaired
//!    file of the other scan carrying the same hash, preferring one at the
//!    same root-relative path.
//! 2. Otherwise it pairs with the unpaired file at the same root-relative
//!    path if size and fastsum agree and the two do not both carry
//!    (necessarily different) strong hashes.
//!
//! A pair at the same relative path is *unchanged*, any other pair *moved*.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::progress::ProgressCallback;
use crate::scanner::path_utils::relativize;
use crate::storage::{FileRecord, IndexStore, Scan, StoreError};

/// Errors that stop a diff or a diff copy.
#[derive(thiserror::Error, Debug)]
pub enum DiffError {
    #[error("Cannot create copy destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A reference file paired with its counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub reference: FileRecord,
    pub other: FileRecord,
}

/// Classified comparison of two scans.
#[derive(Debug, Clone)]
pub struct ScanDiff {
    pub reference: Scan,
    pub other: Scan,
    pub unchanged: Vec<FilePair>,
    pub moved: Vec<FilePair>,
    pub only_in_reference: Vec<FileRecord>,
    pub only_in_other: Vec<FileRecord>,
}

/// Counts per class, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub moved: usize,
    pub only_in_reference: usize,
    pub only_in_other: usize,
}

impl ScanDiff {
    /// Compare `other` against `reference`.
    #[must_use]
    pub fn compute(
        reference: Scan,
        reference_files: Vec<FileRecord>,
        other: Scan,
        other_files: Vec<FileRecord>,
    ) -> Self {
        let other_rel: Vec<PathBuf> = other_files
            .iter()
            .map(|f| relativize(&f.path, &other.root).to_path_buf())
            .collect();

        let mut by_hash: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_path: HashMap<&Path, usize> = HashMap::with_capacity(other_files.len());
        for (idx, file) in other_files.iter().enumerate() {
            if let Some(digest) = file.sha1() {
                by_hash.entry(digest).or_default().push(idx);
            }
            by_path.entry(other_rel[idx].as_path()).or_insert(idx);
        }

        let mut paired = vec![false; other_files.len()];
        let mut matches: Vec<(usize, Option<usize>)> = Vec::with_capacity(reference_files.len());

        for (r_idx, file) in reference_files.iter().enumerate() {
            let rel = relativize(&file.path, &reference.root);

            let by_digest = file.sha1().and_then(|digest| {
                let candidates = by_hash.get(digest)?;
                candidates
                    .iter()
                    .copied()
                    .filter(|&idx| !paired[idx])
                    .find(|&idx| other_rel[idx] == rel)
                    .or_else(|| candidates.iter().copied().find(|&idx| !paired[idx]))
            });

            let found = by_digest.or_else(|| {
                let idx = *by_path.get(rel)?;
                let candidate = &other_files[idx];
                let both_hashed = file.sha1().is_some() && candidate.sha1().is_some();
                (!paired[idx]
                    && !both_hashed
                    && candidate.size == file.size
                    && candidate.fastsum == file.fastsum)
                    .then_some(idx)
            });

            if let Some(idx) = found {
                paired[idx] = true;
            }
            matches.push((r_idx, found));
        }

        let mut other_slots: Vec<Option<FileRecord>> = other_files.into_iter().map(Some).collect();
        let mut unchanged = Vec::new();
        let mut moved = Vec::new();
        let mut only_in_reference = Vec::new();

        for ((_, found), file) in matches.into_iter().zip(reference_files) {
            match found.and_then(|idx| other_slots[idx].take().map(|o| (idx, o))) {
                Some((idx, counterpart)) => {
                    let same_place = other_rel[idx] == relativize(&file.path, &reference.root);
                    let pair = FilePair {
                        reference: file,
                        other: counterpart,
                    };
                    if same_place {
                        unchanged.push(pair);
                    } else {
                        moved.push(pair);
                    }
                }
                None => only_in_reference.push(file),
            }
        }
        let only_in_other = other_slots.into_iter().flatten().collect();

        Self {
            reference,
            other,
            unchanged,
            moved,
            only_in_reference,
            only_in_other,
        }
    }

    #[must_use]
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            unchanged: self.unchanged.len(),
            moved: self.moved.len(),
            only_in_reference: self.only_in_reference.len(),
            only_in_other: self.only_in_other.len(),
        }
    }
}

/// Load both scans and compare them.
///
/// # Errors
///
/// [`StoreError::ScanNotFound`] (wrapped) if either name is unknown.
pub fn diff_scans<S: IndexStore + ?Sized>(
    store: &S,
    reference: &str,
    other: &str,
) -> Result<ScanDiff, DiffError> {
    let load = |name: &str| -> Result<(Scan, Vec<FileRecord>), DiffError> {
        let scan = store
            .scan_by_name(name)?
            .ok_or_else(|| StoreError::ScanNotFound(name.to_string()))?;
        let files = store.files_for_scan(scan.id)?;
        Ok((scan, files))
    };
    let (reference, reference_files) = load(reference)?;
    let (other, other_files) = load(other)?;
    Ok(ScanDiff::compute(reference, reference_files, other, other_files))
}

/// Outcome of [`copy_diff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    pub copied: usize,
    pub failed: usize,
}

/// Copy every reference-only file into `destination`, keeping its path
/// relative to the reference root.
///
/// Individual copy failures are logged and counted.
///
/// # Errors
///
/// [`DiffError::Destination`] if `destination` itself cannot be created.
pub fn copy_diff(
    diff: &ScanDiff,
    destination: &Path,
    progress: Option<&dyn ProgressCallback>,
) -> Result<CopyReport, DiffError> {
    fs::create_dir_all(destination).map_err(|source| DiffError::Destination {
        path: destination.to_path_buf(),
        source,
    })?;

    if let Some(progress) = progress {
        progress.on_phase_start("copying", diff.only_in_reference.len());
    }

    let mut report = CopyReport::default();
    for (idx, file) in diff.only_in_reference.iter().enumerate() {
        let target = destination.join(contained(relativize(&file.path, &diff.reference.root)));
        if let Some(progress) = progress {
            progress.on_progress(idx + 1, &file.path.to_string_lossy());
        }

        let result = match target.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| fs::copy(&file.path, &target));

        match result {
            Ok(bytes) => {
                log::debug!("Copied {} -> {}", file.path.display(), target.display());
                report.copied += 1;
                if let Some(progress) = progress {
                    progress.on_item_completed(bytes);
                }
            }
            Err(e) => {
                log::warn!("Failed to copy {}: {}", file.path.display(), e);
                report.failed += 1;
            }
        }
    }

    if let Some(progress) = progress {
        progress.on_phase_end("copying");
    }
    Ok(report)
}

/// Keep only normal components so the target stays inside the destination.
fn contained(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
