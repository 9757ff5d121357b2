//! Operations on whole scans: building, exporting and importing, comparing.

pub mod builder;
pub mod diff;
pub mod transfer;

pub use builder::{BuildError, ScanBuilder, ScanOptions, ScanReport, ScanStats};
pub use diff::{copy_diff, diff_scans, CopyReport, DiffError, DiffSummary, FilePair, ScanDiff};
pub use transfer::{export_scan, import_scan, DocumentFile, IndexDocument, TransferError};

/// Hostname recorded on new scans and compared before destructive actions.
#[must_use]
pub fn local_machine_name() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            log::warn!("Cannot determine hostname: {}", e);
            "unknown".to_string()
        }
    }
}
