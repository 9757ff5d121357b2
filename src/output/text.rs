//! Human-readable output.
//!
//! Colors are applied with yansi and disappear when the binary calls
//! `yansi::disable()` (`--no-color`, `NO_COLOR`).

use std::io::{self, Write};

use bytesize::ByteSize;
use chrono::SecondsFormat;
use yansi::Paint;

use crate::duplicates::{DuplicateGroup, GroupSummary, ResolveReport};
use crate::index::{CopyReport, ScanDiff, ScanReport};
use crate::storage::{FileRecord, IndexStats, ScanSummary};

/// Writes command results as text lines.
pub struct TextOutput<W: Write> {
    writer: W,
}

impl<W: Write> TextOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// `index list`: names only, or one detailed line per scan.
    pub fn scans(&mut self, scans: &[ScanSummary], long: bool) -> io::Result<()> {
        for summary in scans {
            let scan = &summary.scan;
            if long {
                writeln!(
                    self.writer,
                    "{}\t{}\t{}\t{}\t{} files",
                    scan.name.bold(),
                    scan.machine,
                    scan.root.display(),
                    scan.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    summary.file_count
                )?;
            } else {
                writeln!(self.writer, "{}", scan.name)?;
            }
        }
        Ok(())
    }

    pub fn scan_report(&mut self, report: &ScanReport) -> io::Result<()> {
        let stats = &report.stats;
        writeln!(
            self.writer,
            "{} {}: {} files ({}), {} excluded, {} skipped, {} fingerprint failures",
            if stats.interrupted {
                "Interrupted".yellow().bold()
            } else {
                "Indexed".green().bold()
            },
            report.scan.name,
            stats.indexed,
            ByteSize(stats.bytes),
            stats.excluded,
            stats.skipped,
            stats.hash_failed
        )
    }

    /// `dupes list`: keeper first, redundant copies indented below it.
    pub fn groups(&mut self, groups: &[DuplicateGroup], summary: &GroupSummary) -> io::Result<()> {
        for group in groups {
            writeln!(
                self.writer,
                "{} ({} x {})",
                group.hash.dim(),
                group.len(),
                ByteSize(group.size())
            )?;
            if let Some(keeper) = group.keeper() {
                writeln!(self.writer, "  {} {}", "keep".green(), keeper.path.display())?;
            }
            for file in group.redundant() {
                writeln!(self.writer, "  {} {}", "dupe".red(), file.path.display())?;
            }
        }
        writeln!(
            self.writer,
            "{} groups, {} files, {} reclaimable",
            summary.groups,
            summary.files,
            ByteSize(summary.wasted_bytes).bold()
        )
    }

    pub fn resolve_report(&mut self, report: &ResolveReport, dry_run: bool) -> io::Result<()> {
        let (verb, count) = if dry_run {
            ("Would delete", report.would_delete)
        } else {
            ("Deleted", report.deleted)
        };
        writeln!(
            self.writer,
            "{} {} files ({}) from {} groups",
            verb.bold(),
            count,
            ByteSize(report.bytes_freed),
            report.groups
        )?;
        let notes = [
            ("groups skipped", report.groups_skipped),
            ("already missing", report.missing),
            ("modified since scan", report.modified),
            ("on another machine", report.foreign),
            ("same file as kept copy", report.aliases),
        ];
        for (label, value) in notes.iter().filter(|(_, v)| *v > 0) {
            writeln!(self.writer, "  {value} {label}")?;
        }
        for (path, error) in &report.failures {
            writeln!(self.writer, "  {} {}: {}", "failed".red(), path.display(), error)?;
        }
        Ok(())
    }

    /// `search` and `recent`.
    pub fn files(&mut self, files: &[FileRecord]) -> io::Result<()> {
        for file in files {
            writeln!(
                self.writer,
                "{}\t{}\t{}",
                file.accessed.to_rfc3339_opts(SecondsFormat::Secs, true),
                ByteSize(file.size),
                file.path.display()
            )?;
        }
        Ok(())
    }

    pub fn diff(&mut self, diff: &ScanDiff) -> io::Result<()> {
        for pair in &diff.moved {
            writeln!(
                self.writer,
                "{} {} -> {}",
                "moved".yellow(),
                pair.reference.path.display(),
                pair.other.path.display()
            )?;
        }
        for file in &diff.only_in_reference {
            writeln!(self.writer, "{} {}", "-".red(), file.path.display())?;
        }
        for file in &diff.only_in_other {
            writeln!(self.writer, "{} {}", "+".green(), file.path.display())?;
        }
        let summary = diff.summary();
        writeln!(
            self.writer,
            "{} unchanged, {} moved, {} only in '{}', {} only in '{}'",
            summary.unchanged,
            summary.moved,
            summary.only_in_reference,
            diff.reference.name,
            summary.only_in_other,
            diff.other.name
        )
    }

    pub fn copy_report(&mut self, report: &CopyReport) -> io::Result<()> {
        writeln!(
            self.writer,
            "Copied {} files, {} failed",
            report.copied, report.failed
        )
    }

    pub fn stats(&mut self, stats: &IndexStats) -> io::Result<()> {
        writeln!(self.writer, "Scans:         {}", stats.scans)?;
        writeln!(self.writer, "Files:         {}", stats.files)?;
        writeln!(self.writer, "Total size:    {}", ByteSize(stats.total_bytes))?;
        writeln!(self.writer, "Hashed files:  {}", stats.hashed_files)
    }
}
